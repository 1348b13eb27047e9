use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    persist::StorageDriver,
    types::{now_ms, TimestampMs},
};

use super::{RemoteSyncState, SyncError, SyncResult};

/// Shortest token lifetime honoured, in seconds.
pub const MIN_TOKEN_LIFETIME_SECS: i64 = 60;

/// Bearer-token capability injected into the sync adapter.
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Current token, or `None` when signed out or expired.
    async fn valid_access_token(&self) -> Option<String>;

    /// Runs the interactive sign-in; `Ok(false)` means the user cancelled.
    async fn sign_in(&self) -> SyncResult<bool>;

    /// Forgets the token and any cached remote file id.
    async fn sign_out(&self) -> SyncResult<()>;

    /// Remote blob id resolved earlier in this session.
    async fn cached_file_id(&self) -> Option<String> {
        None
    }

    /// Replaces the cached remote blob id.
    async fn cache_file_id(&self, _file_id: Option<&str>) -> SyncResult<()> {
        Ok(())
    }
}

/// Token returned by an external authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds as reported by the provider.
    pub expires_in_secs: i64,
}

/// External browser/OAuth flow. Only its resulting token matters here.
#[async_trait]
pub trait SignInFlow: Send + Sync {
    /// Requests a token for `scope`; `None` when the user cancelled.
    async fn authorize(&self, scope: &str) -> SyncResult<Option<TokenGrant>>;
}

/// Clock used for expiry checks.
pub type Clock = fn() -> TimestampMs;

/// [`AuthSession`] persisted as a [`RemoteSyncState`] document.
pub struct StoredSession {
    storage: Arc<dyn StorageDriver>,
    key: String,
    scope: String,
    flow: Option<Arc<dyn SignInFlow>>,
    clock: Clock,
}

impl StoredSession {
    /// Session stored at `key`, without a sign-in flow.
    pub fn new(storage: Arc<dyn StorageDriver>, key: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            scope: scope.into(),
            flow: None,
            clock: now_ms,
        }
    }

    /// Attaches the interactive sign-in flow.
    pub fn with_flow(mut self, flow: Arc<dyn SignInFlow>) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Stored state; unreadable or malformed documents count as signed out.
    pub fn load_state(&self) -> Option<RemoteSyncState> {
        let bytes = match self.storage.read(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(key = %self.key, %err, "sync state unreadable");
                return None;
            }
        };
        serde_json::from_slice(&bytes)
            .map_err(|err| tracing::debug!(key = %self.key, %err, "sync state malformed"))
            .ok()
    }

    /// Persists `state`.
    pub fn save_state(&self, state: &RemoteSyncState) -> SyncResult<()> {
        let bytes = serde_json::to_vec(state)?;
        self.storage.write(&self.key, &bytes)?;
        Ok(())
    }

    /// True when a non-expired token is stored.
    pub fn has_session(&self) -> bool {
        self.load_state()
            .is_some_and(|state| state.is_valid((self.clock)()))
    }

    /// Stores a freshly granted token.
    pub fn accept_grant(&self, grant: TokenGrant) -> SyncResult<()> {
        let lifetime = grant.expires_in_secs.max(MIN_TOKEN_LIFETIME_SECS);
        self.save_state(&RemoteSyncState {
            access_token: grant.access_token,
            expires_at: (self.clock)() + lifetime * 1000,
            remote_file_id: None,
        })
    }
}

#[async_trait]
impl AuthSession for StoredSession {
    async fn valid_access_token(&self) -> Option<String> {
        let state = self.load_state()?;
        state
            .is_valid((self.clock)())
            .then_some(state.access_token)
    }

    async fn sign_in(&self) -> SyncResult<bool> {
        let Some(flow) = &self.flow else {
            return Err(SyncError::SignIn("no sign-in flow configured".to_string()));
        };
        let Some(grant) = flow.authorize(&self.scope).await? else {
            tracing::info!("sign-in cancelled");
            return Ok(false);
        };
        if grant.access_token.is_empty() {
            return Ok(false);
        }
        self.accept_grant(grant)?;
        tracing::info!("remote session established");
        Ok(true)
    }

    async fn sign_out(&self) -> SyncResult<()> {
        self.storage.delete(&self.key)?;
        tracing::info!("remote session cleared");
        Ok(())
    }

    async fn cached_file_id(&self) -> Option<String> {
        self.load_state()?.remote_file_id
    }

    async fn cache_file_id(&self, file_id: Option<&str>) -> SyncResult<()> {
        let Some(mut state) = self.load_state() else {
            return Ok(());
        };
        let next = file_id.map(str::to_string);
        if state.remote_file_id == next {
            return Ok(());
        }
        state.remote_file_id = next;
        self.save_state(&state)
    }
}
