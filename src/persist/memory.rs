use std::sync::Mutex;

use hashbrown::HashMap;

use super::{PersistError, PersistResult, StorageDriver};

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageDriver for MemoryStorage {
    fn read(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|_| PersistError::Lock)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> PersistResult<()> {
        let mut entries = self.entries.lock().map_err(|_| PersistError::Lock)?;
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> PersistResult<()> {
        let mut entries = self.entries.lock().map_err(|_| PersistError::Lock)?;
        entries.remove(key);
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
