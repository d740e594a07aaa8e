//! Single-table persistence for confirmed records.
//!
//! Records are keyed by MRN and ordered by encounter date; the full record
//! rides along as a JSON blob so schema drift in model output never breaks
//! the table. Concurrent writes for the same MRN interleave without
//! isolation — last write wins.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::pipeline::extraction::StructuredRecord;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record serialization failed: {0}")]
    Serialization(String),
}

/// SQLite-backed record store.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY,
                mrn TEXT,
                date TEXT,
                full_json TEXT
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist a reviewed record verbatim.
    pub fn save(&self, record: &StructuredRecord) -> Result<(), StoreError> {
        let mrn = record.mrn().unwrap_or("UNKNOWN");
        let date = record.encounter.date.as_deref().unwrap_or("UNKNOWN");
        let full_json = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO records (mrn, date, full_json) VALUES (?1, ?2, ?3)",
            params![mrn, date, full_json],
        )?;
        tracing::debug!(mrn, date, "record saved");
        Ok(())
    }

    /// The most recent stored visit for a patient, by encounter date
    /// descending. `None` when the patient has no history.
    pub fn latest_for_mrn(&self, mrn: &str) -> Result<Option<StructuredRecord>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let full_json: Option<String> = conn
            .query_row(
                "SELECT full_json FROM records WHERE mrn = ?1 ORDER BY date DESC LIMIT 1",
                params![mrn],
                |row| row.get(0),
            )
            .optional()?;

        match full_json {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }
}
