//! Status command implementation.

use crate::error::Result;
use crate::host::{HostStore, SETTING_EXTRA_FACTOR, SETTING_GRADE_0_ITEMS};
use crate::storage::SqliteStorage;
use crate::storage::events::EventType;
use crate::sync::select::Bucket;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::open_storage;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    time_of_start: i64,
    item_count: usize,
    buckets: BTreeMap<&'static str, usize>,
    grade_0_items_at_once: i64,
    extra_factor: f64,
    device_log_lines: usize,
    recent_events: Vec<EventSummary>,
}

#[derive(Serialize)]
struct EventSummary {
    event_type: &'static str,
    entity_id: String,
    actor: String,
    created_at: i64,
}

const RECENT_EVENTS: u32 = 5;

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the database is not initialized or cannot be read.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(db_path, None)?;
    let output = collect(&storage)?;

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let start = chrono::DateTime::from_timestamp(output.time_of_start, 0)
        .map_or_else(|| output.time_of_start.to_string(), |t| t.format("%Y-%m-%d").to_string());

    println!("Study Status");
    println!("============");
    println!();
    println!("Started:  {start}");
    println!("Items:    {}", output.item_count);
    for (bucket, count) in &output.buckets {
        println!("  {bucket:<14} {count}");
    }
    println!();
    println!("Export budget: {} new item(s) x {}", output.grade_0_items_at_once, output.extra_factor);
    if output.device_log_lines > 0 {
        println!("Device log:    {} line(s) imported", output.device_log_lines);
    }

    if !output.recent_events.is_empty() {
        println!();
        println!("Recent activity:");
        for e in &output.recent_events {
            println!("  {:<20} {} ({})", e.event_type, e.entity_id, e.actor);
        }
    }

    Ok(())
}

fn collect(storage: &SqliteStorage) -> Result<StatusOutput> {
    let items = storage.items()?;

    let mut buckets: BTreeMap<&'static str, usize> = Bucket::ALL.iter().map(|b| (b.label(), 0)).collect();
    let mut learned = 0;
    for item in &items {
        match Bucket::of(item) {
            Some(bucket) => *buckets.entry(bucket.label()).or_default() += 1,
            None => learned += 1,
        }
    }
    buckets.insert("learned", learned);

    let recent_events = storage
        .recent_events(RECENT_EVENTS)?
        .into_iter()
        .map(|e| EventSummary {
            event_type: e.event_type.as_str(),
            entity_id: e.entity_id,
            actor: e.actor,
            created_at: e.created_at,
        })
        .collect();

    Ok(StatusOutput {
        time_of_start: storage.time_of_start()?.time,
        item_count: items.len(),
        buckets,
        grade_0_items_at_once: storage.setting_int(SETTING_GRADE_0_ITEMS)?,
        extra_factor: storage.setting_f64_or(SETTING_EXTRA_FACTOR, 1.0)?,
        device_log_lines: storage.count_events(EventType::DeviceLog)?,
        recent_events,
    })
}
