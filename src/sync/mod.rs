//! Last-write-wins reconciliation with a single remote JSON blob.

/// Merge state machine.
pub mod adapter;
/// Remote application-data HTTP client.
pub mod drive;
/// Remote blob access seam.
pub mod remote;
/// Bearer-token session seam and its stored implementation.
pub mod session;

use serde::{Deserialize, Serialize};

use crate::{persist::PersistError, snapshot::Snapshot, types::TimestampMs};

pub use self::{
    adapter::{SyncAdapter, SyncOutcome},
    drive::DriveClient,
    remote::RemoteStore,
    session::{AuthSession, SignInFlow, StoredSession, TokenGrant},
};

/// Sync failure.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Token missing or expired.
    #[error("remote session expired")]
    SessionExpired,
    /// Upload answered with a non-success status.
    #[error("remote upload failed ({status})")]
    UploadFailed {
        /// HTTP status code.
        status: u16,
    },
    /// Lookup or download failed; callers treat this as "no remote file".
    #[error("remote read failed: {0}")]
    ReadFailed(String),
    /// Transport error.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    /// Encoding or decoding failure.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// Session state could not be stored.
    #[error("persist: {0}")]
    Persist(#[from] PersistError),
    /// Sign-in flow failed or is not available.
    #[error("sign-in failed: {0}")]
    SignIn(String),
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Persisted session, stored separately from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSyncState {
    /// Bearer token.
    pub access_token: String,
    /// Expiry, ms since epoch.
    pub expires_at: TimestampMs,
    /// Remote blob id once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_file_id: Option<String>,
}

impl RemoteSyncState {
    /// True when the token is present and not expired at `now`.
    pub fn is_valid(&self, now: TimestampMs) -> bool {
        !self.access_token.is_empty() && self.expires_at > now
    }
}

/// Remote blob contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePayload {
    /// Mutation timestamp compared by the merge.
    #[serde(default)]
    pub updated_at: TimestampMs,
    /// Snapshot in the local document schema.
    pub snapshot: Snapshot,
}

impl RemotePayload {
    /// Wraps `snapshot`, stamping it with its own `updatedAt` or `now`.
    pub fn wrap(snapshot: Snapshot, now: TimestampMs) -> Self {
        Self {
            updated_at: snapshot.updated_at().unwrap_or(now),
            snapshot,
        }
    }
}
