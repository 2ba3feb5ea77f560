//! Audit event storage and retrieval.
//!
//! Events track every mutation the sync engine makes to the study database:
//! id renames, imported statistics and start-time corrections. Lines of a
//! device's review log are kept here too, one `device_log` event per line.

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ItemCreated,
    ItemRenamed,
    StatsImported,
    StartTimeAdjusted,
    SettingChanged,
    MacroChanged,
    DeviceLog,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ItemCreated => "item_created",
            Self::ItemRenamed => "item_renamed",
            Self::StatsImported => "stats_imported",
            Self::StartTimeAdjusted => "start_time_adjusted",
            Self::SettingChanged => "setting_changed",
            Self::MacroChanged => "macro_changed",
            Self::DeviceLog => "device_log",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "item_created" => Ok(Self::ItemCreated),
            "item_renamed" => Ok(Self::ItemRenamed),
            "stats_imported" => Ok(Self::StatsImported),
            "start_time_adjusted" => Ok(Self::StartTimeAdjusted),
            "setting_changed" => Ok(Self::SettingChanged),
            "macro_changed" => Ok(Self::MacroChanged),
            "device_log" => Ok(Self::DeviceLog),
            _ => Err(format!("Unknown event type: {s}")),
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the most recent events, newest first.
///
/// Rows with an unrecognized event type are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent_events(conn: &Connection, limit: u32) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM events
         ORDER BY created_at DESC, id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        let event_type: String = row.get(3)?;
        Ok((
            event_type,
            Event {
                id: row.get(0)?,
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
                event_type: EventType::ItemCreated,
                actor: row.get(4)?,
                old_value: row.get(5)?,
                new_value: row.get(6)?,
                comment: row.get(7)?,
                created_at: row.get(8)?,
            },
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (kind, mut event) = row?;
        if let Ok(event_type) = kind.parse() {
            event.event_type = event_type;
            events.push(event);
        }
    }
    Ok(events)
}

/// Count events of one type.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_events(conn: &Connection, event_type: EventType) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE event_type = ?1",
        [event_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// New values of every event of one type, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn event_values(conn: &Connection, event_type: EventType) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(new_value, '') FROM events WHERE event_type = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([event_type.as_str()], |row| row.get::<_, String>(0))?;
    rows.collect()
}
