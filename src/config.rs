//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::AppLocale;

/// Local snapshot document key.
pub const DEFAULT_SNAPSHOT_KEY: &str = "inventory-state.json";
/// Persisted remote session key.
pub const DEFAULT_SYNC_STATE_KEY: &str = "google-drive-sync-state.json";
/// Remote blob name inside the application-data folder.
pub const DEFAULT_REMOTE_FILE_NAME: &str = "inventory-sync.json";
/// Directory created under the platform data or cache directory.
pub const APP_DIR_NAME: &str = "barsync";

/// Where snapshots and session state are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key.
    #[default]
    File,
    /// Key/value table in a SQLite database.
    Sqlite,
    /// Process memory only.
    Memory,
}

/// Remote application-data endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveConfig {
    /// Metadata and download base URL.
    pub api_base_url: String,
    /// Multipart upload base URL.
    pub upload_base_url: String,
    /// Remote blob name.
    pub file_name: String,
    /// OAuth scope requested by the sign-in flow.
    pub scope: String,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
            file_name: DEFAULT_REMOTE_FILE_NAME.to_string(),
            scope: "https://www.googleapis.com/auth/drive.appdata".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Top-level engine configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Overrides the platform directories when set.
    pub data_dir: Option<PathBuf>,
    /// Key of the local snapshot document.
    pub snapshot_key: String,
    /// Key of the persisted remote session.
    pub sync_state_key: String,
    /// Initial locale, until preferences say otherwise.
    pub locale: AppLocale,
    /// Quiet period after the last mutation before a persist.
    pub persist_debounce_ms: u64,
    /// Periodic sync interval; 0 disables it.
    pub sync_interval_ms: u64,
    /// Storage backend.
    pub storage: StorageBackend,
    /// Remote endpoints.
    pub drive: DriveConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            sync_state_key: DEFAULT_SYNC_STATE_KEY.to_string(),
            locale: AppLocale::default(),
            persist_debounce_ms: 300,
            sync_interval_ms: 0,
            storage: StorageBackend::default(),
            drive: DriveConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON config; blank input yields the defaults.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    /// Candidate storage directories, most preferred first.
    ///
    /// An explicit `data_dir` is the only candidate. Otherwise the platform data
    /// directory is tried before the cache directory.
    pub fn storage_dirs(&self) -> Vec<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return vec![dir.clone()];
        }
        [dirs::data_dir(), dirs::cache_dir()]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(APP_DIR_NAME))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_is_default() {
        assert_eq!(EngineConfig::from_json("  ").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_input_keeps_other_defaults() {
        let cfg = EngineConfig::from_json(
            r#"{"storage":"sqlite","persistDebounceMs":50,"locale":"uk-UA","drive":{"fileName":"x.json"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.storage, StorageBackend::Sqlite);
        assert_eq!(cfg.persist_debounce_ms, 50);
        assert_eq!(cfg.locale, AppLocale::UkUa);
        assert_eq!(cfg.drive.file_name, "x.json");
        assert_eq!(cfg.drive.timeout_ms, 30_000);
        assert_eq!(cfg.snapshot_key, DEFAULT_SNAPSHOT_KEY);
    }

    #[test]
    fn explicit_dir_is_the_only_candidate() {
        let cfg = EngineConfig {
            data_dir: Some(PathBuf::from("/tmp/bar")),
            ..EngineConfig::default()
        };
        assert_eq!(cfg.storage_dirs(), vec![PathBuf::from("/tmp/bar")]);
    }
}
