//! Durable key/value storage and the snapshot store built on it.

/// One-file-per-key storage with atomic replace.
pub mod fs;
/// Process-memory storage.
pub mod memory;
/// SQLite key/value storage.
pub mod sqlite;
/// Snapshot load/save over a [`StorageDriver`].
pub mod store;

use std::{path::Path, sync::Arc};

use crate::config::{EngineConfig, StorageBackend};

pub use self::{fs::FileStorage, memory::MemoryStorage, sqlite::SqliteStorage};

/// SQLite database file name inside the storage directory.
pub const SQLITE_FILE_NAME: &str = "barsync.db";

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// SQLite error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Encoding or decoding failure.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// No writable location could be resolved.
    #[error("no writable storage location")]
    StorageUnavailable,
    /// Document parsed as JSON but is not a snapshot this build understands.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
    /// A lock guarding a connection was poisoned.
    #[error("storage lock poisoned")]
    Lock,
}

/// Result alias for storage operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Durable key/value storage.
///
/// Every `write` replaces the whole value at once; readers never see a partial value.
pub trait StorageDriver: Send + Sync {
    /// Value at `key`, or `None` when absent.
    fn read(&self, key: &str) -> PersistResult<Option<Vec<u8>>>;

    /// Replaces the value at `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> PersistResult<()>;

    /// Removes `key`; removing an absent key is not an error.
    fn delete(&self, key: &str) -> PersistResult<()>;

    /// False for drivers that lose everything when the process exits.
    fn is_durable(&self) -> bool {
        true
    }
}

/// Resolves the configured backend.
///
/// Candidate directories are tried in order. When none is usable the engine runs
/// memory-only and a single warning is logged here; callers never see the failure.
pub fn open_storage(config: &EngineConfig) -> Arc<dyn StorageDriver> {
    let open: fn(&Path) -> PersistResult<Arc<dyn StorageDriver>> = match config.storage {
        StorageBackend::Memory => return Arc::new(MemoryStorage::new()),
        StorageBackend::File => open_file,
        StorageBackend::Sqlite => open_sqlite,
    };

    for dir in config.storage_dirs() {
        match open(&dir) {
            Ok(storage) => {
                tracing::debug!(dir = %dir.display(), backend = ?config.storage, "storage resolved");
                return storage;
            }
            Err(err) => {
                tracing::debug!(dir = %dir.display(), %err, "storage location rejected");
            }
        }
    }

    tracing::warn!(
        error = %PersistError::StorageUnavailable,
        "falling back to memory-only storage; changes will not survive a restart"
    );
    Arc::new(MemoryStorage::new())
}

fn open_file(dir: &Path) -> PersistResult<Arc<dyn StorageDriver>> {
    Ok(Arc::new(FileStorage::open(dir)?))
}

fn open_sqlite(dir: &Path) -> PersistResult<Arc<dyn StorageDriver>> {
    std::fs::create_dir_all(dir)?;
    Ok(Arc::new(SqliteStorage::open(dir.join(SQLITE_FILE_NAME))?))
}
