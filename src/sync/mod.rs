//! Device sync operations.
//!
//! - **Export**: reconcile ids, select a study batch, render it and hand it
//!   to a device backend, then stage referenced media
//! - **Import**: read studied records back, correct for clock skew and merge
//!   them into the host database in one transaction
//!
//! # Architecture
//!
//! A sync pass is one [`SyncSession`]: the sync path, progress reporting,
//! cooperative cancellation and the media gathered while rendering. The
//! orchestrators ([`Exporter`], [`Importer`]) drive a
//! [`DeviceBackend`](crate::backend::DeviceBackend) through it.
//!
//! Learning states cross the device boundary as fixed-width
//! [`StatsRecord`]s.
//!
//! # Example
//!
//! ```ignore
//! use ssync::backend::BackendRegistry;
//! use ssync::render::Renderer;
//! use ssync::sync::{ExportOptions, Exporter, Importer, SyncSession};
//!
//! let registry = BackendRegistry::with_defaults();
//! let backend = registry.get("htmlcsv")?;
//! let renderer = Renderer::from_store(&storage)?;
//!
//! let mut session = SyncSession::new("/media/device/study");
//! Exporter::new(&mut storage, backend, &renderer).export(&mut session, &ExportOptions::new(7))?;
//!
//! // ... study on the device ...
//!
//! let mut session = SyncSession::new("/media/device/study");
//! let stats = Importer::new(&mut storage, backend).import(&mut session)?;
//! ```

pub mod codec;
pub mod export;
pub mod file;
pub mod import;
pub mod reconcile;
pub mod select;
pub mod session;
pub mod skew;
pub mod types;

pub use codec::{DecodeError, StatsRecord, decode, encode};
pub use export::{ExportOptions, Exporter};
pub use import::Importer;
pub use reconcile::{Rename, eliminate_duplicate_ids};
pub use select::{Selection, SelectionParams, items_for_days};
pub use session::{CancelFlag, SyncSession};
pub use skew::{SkewCorrection, adjust_start_time};
pub use types::{ExportEntry, ExportStats, ImportStats, ImportedRecord, SyncError, SyncResult};
