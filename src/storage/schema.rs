//! Database schema definitions.
//!
//! This module contains the complete SQLite schema for the study database.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the study database.
///
/// Note: repetition times and the time of start are Unix seconds; audit
/// timestamps are Unix milliseconds.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Core Tables
-- ====================

-- Study items. `id` is not UNIQUE: imported decks can carry colliding ids
-- until the reconciler renames them.
CREATE TABLE IF NOT EXISTS items (
    item_key INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT '<default>',
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    grade INTEGER NOT NULL DEFAULT 0 CHECK (grade BETWEEN 0 AND 5),
    easiness REAL NOT NULL DEFAULT 2.5,
    acq_reps INTEGER NOT NULL DEFAULT 0,
    ret_reps INTEGER NOT NULL DEFAULT 0,
    lapses INTEGER NOT NULL DEFAULT 0,
    acq_reps_since_lapse INTEGER NOT NULL DEFAULT 0,
    ret_reps_since_lapse INTEGER NOT NULL DEFAULT 0,
    last_rep INTEGER NOT NULL DEFAULT 0,
    next_rep INTEGER NOT NULL DEFAULT 0,
    unseen INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_id ON items(id);
CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);

-- Named host settings (per-session budget, log upload toggle, ...)
CREATE TABLE IF NOT EXISTS settings (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Render macros: literal substitutions applied to question/answer text
CREATE TABLE IF NOT EXISTS macros (
    name TEXT PRIMARY KEY,
    expansion TEXT NOT NULL
);

-- Process-wide scheduler state (time of study start)
CREATE TABLE IF NOT EXISTS host_state (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);
";

/// Default host settings, inserted once.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("grade_0_items_at_once", "10"),
    ("upload_logs", "1"),
    ("extra_factor", "1.00"),
];

/// Apply the schema to a database connection.
///
/// Sets pragmas, creates tables, seeds default settings and the time of
/// start. Safe to call on every open.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    let now = chrono::Utc::now();
    for (name, value) in DEFAULT_SETTINGS {
        conn.execute(
            "INSERT OR IGNORE INTO settings (name, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, value, now.timestamp_millis()],
        )?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO host_state (key, value) VALUES ('time_of_start', ?1)",
        [now.timestamp()],
    )?;

    // Record schema version
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![format!("v{CURRENT_SCHEMA_VERSION}"), now.timestamp_millis()],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in ["items", "settings", "macros", "host_state", "events"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        apply_schema(&conn).expect("First apply failed");
        let start: i64 = conn
            .query_row("SELECT value FROM host_state WHERE key = 'time_of_start'", [], |row| row.get(0))
            .unwrap();

        apply_schema(&conn).expect("Second apply failed");
        let again: i64 = conn
            .query_row("SELECT value FROM host_state WHERE key = 'time_of_start'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(start, again);
    }

    #[test]
    fn test_default_settings_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let budget: String = conn
            .query_row(
                "SELECT value FROM settings WHERE name = 'grade_0_items_at_once'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(budget, "10");
    }

    #[test]
    fn test_grade_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let ok = conn.execute(
            "INSERT INTO items (id, question, answer, grade, created_at, updated_at)
             VALUES ('a', 'q', 'a', 5, 0, 0)",
            [],
        );
        assert!(ok.is_ok());

        let bad = conn.execute(
            "INSERT INTO items (id, question, answer, grade, created_at, updated_at)
             VALUES ('b', 'q', 'a', 6, 0, 0)",
            [],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_duplicate_ids_allowed_until_reconciled() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        for _ in 0..2 {
            conn.execute(
                "INSERT INTO items (id, question, answer, created_at, updated_at)
                 VALUES ('card', 'q', 'a', 0, 0)",
                [],
            )
            .unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM items WHERE id = 'card'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
