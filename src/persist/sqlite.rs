//! SQLite-backed key/value storage.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use super::{PersistError, PersistResult, StorageDriver};
use crate::types::now_ms;

/// SQLite implementation of [`crate::persist::StorageDriver`].
///
/// Each key is one row; a write is a single upsert statement, so a value is always
/// replaced as a whole.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates a database at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> PersistResult<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| PersistError::Lock)?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Checkpoints the WAL into the main database file.
    pub fn flush(&self) -> PersistResult<()> {
        let conn = self.conn.lock().map_err(|_| PersistError::Lock)?;
        conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

impl StorageDriver for SqliteStorage {
    fn read(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().map_err(|_| PersistError::Lock)?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> PersistResult<()> {
        let conn = self.conn.lock().map_err(|_| PersistError::Lock)?;
        conn.execute(
            "INSERT INTO kv(key, updated_ms, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET updated_ms = excluded.updated_ms, value = excluded.value",
            params![key, now_ms(), bytes],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> PersistResult<()> {
        let conn = self.conn.lock().map_err(|_| PersistError::Lock)?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
