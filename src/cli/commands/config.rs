//! Host settings and render macro commands.

use crate::cli::ConfigCommands;
use crate::error::{Error, Result};
use crate::host::{HostStore, SETTING_EXTRA_FACTOR, SETTING_GRADE_0_ITEMS, SETTING_UPLOAD_LOGS};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::open_storage;

#[derive(Serialize)]
struct SettingOutput<'a> {
    name: &'a str,
    value: &'a str,
}

/// Execute config commands.
pub fn execute(command: &ConfigCommands, db_path: Option<&PathBuf>, actor: Option<&str>, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Get { name } => get(name.as_deref(), db_path, json),
        ConfigCommands::Set { name, value } => set(name, value, db_path, actor, json),
        ConfigCommands::Macro { name, expansion } => define_macro(name, expansion, db_path, actor, json),
        ConfigCommands::Start => start(db_path, json),
    }
}

fn get(name: Option<&str>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path, None)?;

    let Some(name) = name else {
        let settings = storage.list_settings()?;
        if json {
            let map: BTreeMap<_, _> = settings.into_iter().collect();
            println!("{}", serde_json::to_string(&map)?);
        } else {
            for (name, value) in &settings {
                println!("{name} = {value}");
            }
        }
        return Ok(());
    };

    let value = storage
        .setting(name)?
        .ok_or_else(|| Error::Config(format!("unknown setting: {name}")))?;

    if json {
        println!("{}", serde_json::to_string(&SettingOutput { name, value: &value })?);
    } else {
        println!("{value}");
    }
    Ok(())
}

fn set(name: &str, value: &str, db_path: Option<&PathBuf>, actor: Option<&str>, json: bool) -> Result<()> {
    validate_setting(name, value)?;

    let mut storage = open_storage(db_path, actor)?;
    storage.set_setting(name, value)?;

    if json {
        println!("{}", serde_json::to_string(&SettingOutput { name, value })?);
    } else {
        println!("Set {name} = {value}");
    }
    Ok(())
}

/// Reject values the sync engine would fail to read back.
fn validate_setting(name: &str, value: &str) -> Result<()> {
    let invalid = |expected: &str| Error::InvalidArgument(format!("{name} must be {expected}, got '{value}'"));
    match name {
        SETTING_GRADE_0_ITEMS => {
            value.trim().parse::<u32>().map_err(|_| invalid("a non-negative integer"))?;
        }
        SETTING_UPLOAD_LOGS => {
            if !matches!(value.trim(), "0" | "1") {
                return Err(invalid("0 or 1"));
            }
        }
        SETTING_EXTRA_FACTOR => {
            let factor: f64 = value.trim().parse().map_err(|_| invalid("a number"))?;
            if !factor.is_finite() || factor < 0.0 {
                return Err(invalid("a non-negative number"));
            }
        }
        _ => {}
    }
    Ok(())
}

fn define_macro(name: &str, expansion: &str, db_path: Option<&PathBuf>, actor: Option<&str>, json: bool) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("macro name must not be empty".to_string()));
    }

    let mut storage = open_storage(db_path, actor)?;
    storage.set_macro(name, expansion)?;

    if json {
        println!("{}", serde_json::json!({ "macro": name, "expansion": expansion }));
    } else {
        println!("Macro {name} -> {expansion}");
    }
    Ok(())
}

fn start(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path, None)?;
    let start = storage.time_of_start()?;

    if json {
        println!("{}", serde_json::to_string(&start)?);
    } else {
        let shown = chrono::DateTime::from_timestamp(start.time, 0)
            .map_or_else(|| start.time.to_string(), |t| t.to_rfc3339());
        println!("Time of start: {shown}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_known_settings() {
        assert!(validate_setting(SETTING_GRADE_0_ITEMS, "20").is_ok());
        assert!(validate_setting(SETTING_GRADE_0_ITEMS, "-1").is_err());
        assert!(validate_setting(SETTING_UPLOAD_LOGS, "2").is_err());
        assert!(validate_setting(SETTING_EXTRA_FACTOR, "1.5").is_ok());
        assert!(validate_setting(SETTING_EXTRA_FACTOR, "-0.5").is_err());
        assert!(validate_setting(SETTING_EXTRA_FACTOR, "NaN").is_err());
    }

    #[test]
    fn test_unknown_settings_pass_through() {
        assert!(validate_setting("theme", "dark").is_ok());
    }
}
