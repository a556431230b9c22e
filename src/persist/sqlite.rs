//! SQLite-backed append-only snapshot store.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{
    core::state::{SNAPSHOT_FORMAT_VERSION, StateSnapshot},
    types::Timestamp,
};

use super::{PersistError, PersistResult, SnapshotStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_at TEXT,
    payload BLOB NOT NULL
);
";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u16,
    snapshot: StateSnapshot,
}

/// SQLite implementation of [`crate::persist::SnapshotStore`]. Every save
/// appends a row; loading reads the newest one.
pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    /// Opens or creates a store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Scratch store for tests and one-off sessions; nothing hits disk.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Number of snapshots kept.
    pub fn snapshot_count(&self) -> PersistResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Export time of the newest snapshot, taken from the state's clock.
    /// `None` when the store is empty or the snapshot carried no date.
    pub fn latest_saved_at(&self) -> PersistResult<Option<Timestamp>> {
        let saved_at: Option<Option<Timestamp>> = self
            .conn
            .query_row(
                "SELECT saved_at FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(saved_at.flatten())
    }

    /// Deletes all but the newest `keep` snapshots.
    pub fn prune(&mut self, keep: usize) -> PersistResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM snapshots WHERE id NOT IN (SELECT id FROM snapshots ORDER BY id DESC LIMIT ?1)",
            params![keep as i64],
        )?;
        Ok(removed)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self) -> PersistResult<Option<StateSnapshot>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let env: SnapshotEnvelope = serde_json::from_slice(&payload)?;
        if env.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistError::UnsupportedFormat(env.format_version));
        }
        Ok(Some(env.snapshot))
    }

    fn save(&mut self, snapshot: &StateSnapshot) -> PersistResult<()> {
        let env = SnapshotEnvelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot: snapshot.clone(),
        };
        let payload = serde_json::to_vec(&env)?;
        self.conn.execute(
            "INSERT INTO snapshots(saved_at, payload) VALUES (?1, ?2)",
            params![snapshot.export_date, payload],
        )?;
        log::debug!("saved snapshot ({} bytes)", payload.len());
        Ok(())
    }
}
