//! studysync - offline study sync.
//!
//! Carries a batch of spaced-repetition items from a desktop study database
//! to a device that studies offline, and merges the device's learning
//! results back.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Study items and learning state
//! - [`host`] - The host study database contract consumed by the engine
//! - [`storage`] - SQLite implementation of the host database
//! - [`sync`] - Export/import orchestration, selection, skew correction
//! - [`backend`] - Device container formats
//! - [`assets`] - Media discovery, naming and staging
//! - [`render`] - Macro expansion and render hooks
//! - [`config`] - Database path and actor resolution
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod render;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
