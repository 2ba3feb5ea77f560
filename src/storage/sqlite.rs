//! SQLite storage implementation.
//!
//! This module provides the host study database using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::{Error, Result};
use crate::host::{HostStore, StartRewrite};
use crate::model::{LearningState, StudyItem, TimeOfStart};
use crate::storage::events::{Event, EventType, count_events, event_values, insert_event, recent_events};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::time::Duration;

const ITEM_COLUMNS: &str = "item_key, id, category, question, answer, grade, easiness, acq_reps, \
     ret_reps, lapses, acq_reps_since_lapse, ret_reps_since_lapse, last_rep, next_rep, unseen";

/// Default actor recorded in audit events.
pub const DEFAULT_ACTOR: &str = "ssync";

/// SQLite-based study database.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    actor: String,
}

/// Context for a mutation operation, tracking side effects.
///
/// Passed to mutation closures to record audit events that are written
/// in the same transaction.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(&self.op_name));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

/// Fields for a new study item.
#[derive(Debug, Clone)]
pub struct NewItem<'a> {
    pub id: &'a str,
    pub category: &'a str,
    pub question: &'a str,
    pub answer: &'a str,
    pub state: LearningState,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: DEFAULT_ACTOR.to_string(),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: DEFAULT_ACTOR.to_string(),
        })
    }

    /// Set the actor recorded in audit events.
    #[must_use]
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with transaction and audit events.
    ///
    /// The closure runs inside an IMMEDIATE transaction; its events are
    /// written before commit. Any error rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, &self.actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ===============
    // Item Operations
    // ===============

    /// Insert a study item.
    ///
    /// Ids are not checked for uniqueness here; see [`Self::id_exists`].
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_item(&mut self, item: &NewItem<'_>) -> Result<StudyItem> {
        let now = chrono::Utc::now().timestamp_millis();
        let key = self.mutate("create_item", |tx, ctx| {
            let s = &item.state;
            tx.execute(
                "INSERT INTO items (id, category, question, answer, grade, easiness, acq_reps,
                    ret_reps, lapses, acq_reps_since_lapse, ret_reps_since_lapse, last_rep,
                    next_rep, unseen, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                rusqlite::params![
                    item.id,
                    item.category,
                    item.question,
                    item.answer,
                    s.grade,
                    s.easiness,
                    s.acq_reps,
                    s.ret_reps,
                    s.lapses,
                    s.acq_reps_since_lapse,
                    s.ret_reps_since_lapse,
                    s.last_rep,
                    s.next_rep,
                    s.unseen,
                    now,
                ],
            )?;
            ctx.record_event("item", item.id, EventType::ItemCreated);
            Ok(tx.last_insert_rowid())
        })?;

        Ok(StudyItem {
            key,
            id: item.id.to_string(),
            category: item.category.to_string(),
            question: item.question.to_string(),
            answer: item.answer.to_string(),
            state: item.state.clone(),
        })
    }

    /// Whether any item carries this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn id_exists(&self, id: &str) -> Result<bool> {
        Ok(self.conn.prepare("SELECT 1 FROM items WHERE id = ?1")?.exists([id])?)
    }

    /// List items in database order, optionally filtered by category.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_items(&self, category: Option<&str>, limit: Option<u32>) -> Result<Vec<StudyItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE (?1 IS NULL OR category = ?1)
             ORDER BY item_key ASC
             LIMIT ?2"
        );
        let limit = limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![category, limit], map_item_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Get the first item (by key) carrying `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_item(&self, id: &str) -> Result<Option<StudyItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1 ORDER BY item_key LIMIT 1");
        self.conn
            .query_row(&sql, [id], map_item_row)
            .optional()
            .map_err(Error::from)
    }

    /// Count all items.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_items(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Set the scheduler's time of start.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_time_of_start(&mut self, start: TimeOfStart) -> Result<()> {
        self.mutate("set_time_of_start", |tx, ctx| {
            let old = read_time_of_start(tx)?;
            write_time_of_start(tx, start)?;
            ctx.record_change(
                "host",
                "time_of_start",
                EventType::StartTimeAdjusted,
                Some(old.time.to_string()),
                Some(start.time.to_string()),
            );
            Ok(())
        })
    }

    // ==================
    // Settings & Macros
    // ==================

    /// Set a named setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn set_setting(&mut self, name: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("set_setting", |tx, ctx| {
            let old: Option<String> = tx
                .query_row("SELECT value FROM settings WHERE name = ?1", [name], |row| row.get(0))
                .optional()?;
            tx.execute(
                "INSERT INTO settings (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![name, value, now],
            )?;
            ctx.record_change("setting", name, EventType::SettingChanged, old, Some(value.to_string()));
            Ok(())
        })
    }

    /// All settings, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM settings ORDER BY name")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Define or replace a render macro.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn set_macro(&mut self, name: &str, expansion: &str) -> Result<()> {
        self.mutate("set_macro", |tx, ctx| {
            tx.execute(
                "INSERT INTO macros (name, expansion) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET expansion = excluded.expansion",
                [name, expansion],
            )?;
            ctx.record_change("macro", name, EventType::MacroChanged, None, Some(expansion.to_string()));
            Ok(())
        })
    }

    /// Most recent audit events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_events(&self, limit: u32) -> Result<Vec<Event>> {
        recent_events(&self.conn, limit).map_err(Error::from)
    }

    /// Number of audit events of one type.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_events(&self, event_type: EventType) -> Result<usize> {
        count_events(&self.conn, event_type).map_err(Error::from)
    }

    /// Stored device review log lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn device_log(&self) -> Result<Vec<String>> {
        event_values(&self.conn, EventType::DeviceLog).map_err(Error::from)
    }
}

impl HostStore for SqliteStorage {
    fn items(&self) -> Result<Vec<StudyItem>> {
        self.list_items(None, None)
    }

    fn item_by_id(&self, id: &str) -> Result<Option<StudyItem>> {
        self.get_item(id)
    }

    fn rename_item(&mut self, key: i64, new_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("rename_item", |tx, ctx| {
            let old: String = tx
                .query_row("SELECT id FROM items WHERE item_key = ?1", [key], |row| row.get(0))
                .optional()?
                .ok_or_else(|| Error::ItemNotFound { id: format!("#{key}") })?;
            tx.execute(
                "UPDATE items SET id = ?1, updated_at = ?2 WHERE item_key = ?3",
                rusqlite::params![new_id, now, key],
            )?;
            ctx.record_change("item", new_id, EventType::ItemRenamed, Some(old), Some(new_id.to_string()));
            Ok(())
        })
    }

    fn time_of_start(&self) -> Result<TimeOfStart> {
        read_time_of_start(&self.conn).map_err(Error::from)
    }

    fn setting(&self, name: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM settings WHERE name = ?1", [name], |row| row.get(0))
            .optional()
            .map_err(Error::from)
    }

    fn macros(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, expansion FROM macros ORDER BY name")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn rewrite_start(&mut self, rewrite: &StartRewrite) -> Result<()> {
        self.mutate("rewrite_start", |tx, ctx| apply_start_rewrite(tx, ctx, rewrite))
    }

    fn merge_learning_states(
        &mut self,
        rewrite: Option<&StartRewrite>,
        updates: &[(i64, LearningState)],
    ) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("merge_learning_states", |tx, ctx| {
            if let Some(rewrite) = rewrite {
                apply_start_rewrite(tx, ctx, rewrite)?;
            }

            let mut stmt = tx.prepare(
                "UPDATE items SET grade = ?1, easiness = ?2, acq_reps = ?3, ret_reps = ?4,
                    lapses = ?5, acq_reps_since_lapse = ?6, ret_reps_since_lapse = ?7,
                    last_rep = ?8, next_rep = ?9, unseen = ?10, updated_at = ?11
                 WHERE item_key = ?12",
            )?;
            let mut merged = 0;
            for (key, s) in updates {
                merged += stmt.execute(rusqlite::params![
                    s.grade,
                    s.easiness,
                    s.acq_reps,
                    s.ret_reps,
                    s.lapses,
                    s.acq_reps_since_lapse,
                    s.ret_reps_since_lapse,
                    s.last_rep,
                    s.next_rep,
                    s.unseen,
                    now,
                    key,
                ])?;
            }
            ctx.record_change(
                "host",
                "items",
                EventType::StatsImported,
                None,
                Some(merged.to_string()),
            );
            Ok(merged)
        })
    }

    fn append_device_log(&mut self, lines: &[String]) -> Result<usize> {
        self.mutate("append_device_log", |_tx, ctx| {
            for line in lines {
                ctx.record_change("device", "log", EventType::DeviceLog, None, Some(line.clone()));
            }
            Ok(lines.len())
        })
    }
}

fn apply_start_rewrite(
    tx: &Transaction,
    ctx: &mut MutationContext,
    rewrite: &StartRewrite,
) -> Result<()> {
    let old = read_time_of_start(tx)?;
    write_time_of_start(tx, rewrite.new_start)?;
    tx.execute(
        "UPDATE items SET last_rep = last_rep + ?1, next_rep = next_rep + ?1",
        [rewrite.shift_seconds],
    )?;
    ctx.record_change(
        "host",
        "time_of_start",
        EventType::StartTimeAdjusted,
        Some(old.time.to_string()),
        Some(format!("{} (+{}s)", rewrite.new_start.time, rewrite.shift_seconds)),
    );
    Ok(())
}

fn read_time_of_start(conn: &Connection) -> rusqlite::Result<TimeOfStart> {
    conn.query_row(
        "SELECT value FROM host_state WHERE key = 'time_of_start'",
        [],
        |row| row.get(0),
    )
    .map(TimeOfStart::new)
}

fn write_time_of_start(conn: &Connection, start: TimeOfStart) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO host_state (key, value) VALUES ('time_of_start', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [start.time],
    )?;
    Ok(())
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<StudyItem> {
    Ok(StudyItem {
        key: row.get(0)?,
        id: row.get(1)?,
        category: row.get(2)?,
        question: row.get(3)?,
        answer: row.get(4)?,
        state: LearningState {
            grade: row.get(5)?,
            easiness: row.get(6)?,
            acq_reps: row.get(7)?,
            ret_reps: row.get(8)?,
            lapses: row.get(9)?,
            acq_reps_since_lapse: row.get(10)?,
            ret_reps_since_lapse: row.get(11)?,
            last_rep: row.get(12)?,
            next_rep: row.get(13)?,
            unseen: row.get(14)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add(storage: &mut SqliteStorage, id: &str) -> StudyItem {
        storage
            .create_item(&NewItem {
                id,
                category: "vocab",
                question: "q",
                answer: "a",
                state: LearningState::default(),
            })
            .unwrap()
    }

    #[test]
    fn test_open_file_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("study.db");
        {
            let mut storage = SqliteStorage::open(&db_path).unwrap();
            add(&mut storage, "card");
        }
        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.count_items().unwrap(), 1);
    }

    #[test]
    fn test_create_and_get_item() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let state = LearningState {
            grade: 3,
            easiness: 2.36,
            acq_reps: 4,
            lapses: 1,
            last_rep: 1_700_000_000,
            next_rep: 1_700_600_000,
            unseen: false,
            ..LearningState::default()
        };
        storage
            .create_item(&NewItem {
                id: "fr-42",
                category: "French",
                question: "chien",
                answer: "dog",
                state: state.clone(),
            })
            .unwrap();

        let item = storage.get_item("fr-42").unwrap().unwrap();
        assert_eq!(item.category, "French");
        assert_eq!(item.state, state);
        assert!(storage.id_exists("fr-42").unwrap());
        assert!(storage.get_item("missing").unwrap().is_none());
    }

    #[test]
    fn test_rename_item_records_event() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let item = add(&mut storage, "card");

        storage.rename_item(item.key, "card1").unwrap();

        assert!(storage.get_item("card").unwrap().is_none());
        assert_eq!(storage.get_item("card1").unwrap().unwrap().key, item.key);
        assert_eq!(storage.count_events(EventType::ItemRenamed).unwrap(), 1);
    }

    #[test]
    fn test_rename_missing_key_fails() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let result = storage.rename_item(999, "x");
        assert!(matches!(result, Err(Error::ItemNotFound { .. })));
    }

    #[test]
    fn test_setting_int() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.setting_int("grade_0_items_at_once").unwrap(), 10);

        storage.set_setting("grade_0_items_at_once", "25").unwrap();
        assert_eq!(storage.setting_int("grade_0_items_at_once").unwrap(), 25);

        storage.set_setting("grade_0_items_at_once", "lots").unwrap();
        assert!(matches!(
            storage.setting_int("grade_0_items_at_once"),
            Err(Error::Config(_))
        ));
        assert!(matches!(storage.setting_int("nope"), Err(Error::Config(_))));
    }

    #[test]
    fn test_merge_learning_states_with_rewrite() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.set_time_of_start(TimeOfStart::new(10_000)).unwrap();
        let a = add(&mut storage, "a");
        let b = add(&mut storage, "b");

        let new_state = LearningState {
            grade: 4,
            last_rep: 500,
            next_rep: 900,
            unseen: false,
            ..LearningState::default()
        };
        let rewrite = StartRewrite {
            new_start: TimeOfStart::new(5_000),
            shift_seconds: 100,
        };
        let merged = storage
            .merge_learning_states(Some(&rewrite), &[(a.key, new_state.clone())])
            .unwrap();

        assert_eq!(merged, 1);
        assert_eq!(storage.time_of_start().unwrap(), TimeOfStart::new(5_000));
        // Merged state is written after the shift, so it lands as given.
        assert_eq!(storage.get_item("a").unwrap().unwrap().state, new_state);
        let b = storage.get_item(&b.id).unwrap().unwrap();
        assert_eq!((b.state.last_rep, b.state.next_rep), (100, 100));
    }

    #[test]
    fn test_macros_sorted() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.set_macro("sig", "&sigma;").unwrap();
        storage.set_macro("alpha", "&alpha;").unwrap();
        let macros = storage.macros().unwrap();
        assert_eq!(macros[0].0, "alpha");
        assert_eq!(macros.len(), 2);
    }

    #[test]
    fn test_append_device_log_keeps_line_order() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let lines = vec!["rep a 4".to_string(), String::new(), "rep b 1".to_string()];

        assert_eq!(storage.append_device_log(&lines).unwrap(), 3);
        storage.append_device_log(&["rep c 5".to_string()]).unwrap();

        assert_eq!(storage.device_log().unwrap(), vec!["rep a 4", "", "rep b 1", "rep c 5"]);
        assert_eq!(storage.count_events(EventType::DeviceLog).unwrap(), 4);
    }
}
