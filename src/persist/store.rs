use std::sync::Arc;

use crate::{
    core::{baseline::Baseline, state::InventoryState},
    snapshot::{build_snapshot, restore_state, Preferences, Snapshot},
    types::TimestampMs,
};

use super::{PersistError, PersistResult, StorageDriver};

/// Where a loaded state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Nothing persisted; pure baseline.
    Fresh,
    /// Replayed from a stored snapshot of this version.
    Snapshot(u32),
    /// A document existed but could not be used; pure baseline.
    Fallback,
}

/// Result of [`SnapshotStore::load`].
#[derive(Debug, Clone)]
pub struct LoadedInventory {
    /// Reconstructed live state.
    pub state: InventoryState,
    /// Restored preferences, defaults where absent.
    pub preferences: Preferences,
    /// Mutation timestamp carried by the document.
    pub updated_at: Option<TimestampMs>,
    /// Origin of the state.
    pub source: LoadSource,
}

impl LoadedInventory {
    fn baseline(baseline: &Baseline, source: LoadSource) -> Self {
        Self {
            state: baseline.to_state(),
            preferences: Preferences {
                app_locale: baseline.locale(),
                ..Preferences::default()
            },
            updated_at: None,
            source,
        }
    }
}

/// Reads and writes the snapshot document under one key.
#[derive(Clone)]
pub struct SnapshotStore {
    storage: Arc<dyn StorageDriver>,
    key: String,
}

impl SnapshotStore {
    /// Store over `storage` at `key`.
    pub fn new(storage: Arc<dyn StorageDriver>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Underlying driver.
    pub fn storage(&self) -> &Arc<dyn StorageDriver> {
        &self.storage
    }

    /// Document key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parses the stored document. A blank document counts as absent.
    pub fn read_snapshot(&self) -> PersistResult<Option<Snapshot>> {
        let Some(bytes) = self.storage.read(&self.key)? else {
            return Ok(None);
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Snapshot::from_slice(&bytes)
            .map(Some)
            .map_err(|err| PersistError::MalformedSnapshot(err.to_string()))
    }

    /// Reconstructs state from baseline plus the stored document.
    ///
    /// Never fails: an absent, unreadable or malformed document yields the baseline with
    /// `imported = false` and default preferences.
    pub fn load(&self, baseline: &Baseline) -> LoadedInventory {
        match self.read_snapshot() {
            Ok(None) => {
                tracing::debug!(key = %self.key, "no stored snapshot; using baseline");
                LoadedInventory::baseline(baseline, LoadSource::Fresh)
            }
            Ok(Some(snapshot)) => {
                tracing::debug!(key = %self.key, version = snapshot.version(), "snapshot loaded");
                LoadedInventory {
                    state: restore_state(&snapshot, baseline),
                    preferences: snapshot.preferences().to_preferences(),
                    updated_at: snapshot.updated_at(),
                    source: LoadSource::Snapshot(snapshot.version()),
                }
            }
            Err(err) => {
                tracing::warn!(key = %self.key, %err, "unable to load snapshot; using baseline");
                LoadedInventory::baseline(baseline, LoadSource::Fallback)
            }
        }
    }

    /// Builds a full-scan snapshot and writes it as one document.
    ///
    /// Write failures are returned; the in-memory state stays valid either way.
    pub fn save(
        &self,
        state: &InventoryState,
        baseline: &Baseline,
        preferences: &Preferences,
        updated_at: Option<TimestampMs>,
    ) -> PersistResult<Snapshot> {
        let snapshot = build_snapshot(state, baseline, preferences, updated_at);
        self.write_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    /// Writes an already built snapshot.
    pub fn write_snapshot(&self, snapshot: &Snapshot) -> PersistResult<()> {
        let bytes = snapshot.to_vec()?;
        self.storage.write(&self.key, &bytes)?;
        tracing::debug!(key = %self.key, bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    /// Removes the stored document.
    pub fn clear(&self) -> PersistResult<()> {
        self.storage.delete(&self.key)
    }
}
