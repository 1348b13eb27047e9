//! Runtime event stream payloads.

use crate::{
    persist::store::LoadSource,
    types::{RecordId, RecordKind, TimestampMs},
};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// State was reconstructed at start.
    Loaded {
        /// Where it came from.
        source: LoadSource,
    },
    /// A record was created, updated, deleted or marked dirty.
    Changed {
        /// Collection.
        kind: RecordKind,
        /// Record id.
        id: RecordId,
    },
    /// Preferences were replaced.
    PreferencesChanged,
    /// A snapshot reached storage.
    Persisted {
        /// Mutation timestamp it carries.
        updated_at: Option<TimestampMs>,
    },
    /// A debounced or explicit persist failed; memory state is still valid.
    PersistFailed {
        /// Rendered error.
        error: String,
    },
    /// A sync round finished without adopting remote.
    Synced {
        /// Local was uploaded.
        uploaded: bool,
    },
    /// Remote was newer and replaced local state.
    RemoteAdopted {
        /// Remote mutation timestamp.
        updated_at: TimestampMs,
    },
    /// State was rebuilt from the bundled baseline.
    Reset,
}
