use std::{cmp::Ordering, sync::Arc};

use crate::{snapshot::Snapshot, types::now_ms};

use super::{remote::RemoteStore, session::AuthSession, RemotePayload, SyncResult};

/// Result of [`SyncAdapter::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Snapshot the caller should hold afterwards.
    pub merged: Snapshot,
    /// True when `merged` is the remote snapshot and must replace local state.
    pub changed: bool,
    /// True when local was uploaded.
    pub uploaded: bool,
}

impl SyncOutcome {
    fn keep(local: Snapshot, uploaded: bool) -> Self {
        Self {
            merged: local,
            changed: false,
            uploaded,
        }
    }
}

/// Last-write-wins merge between the local snapshot and the remote blob.
///
/// | session | remote blob          | result                    |
/// |---------|----------------------|---------------------------|
/// | none    | -                    | local, nothing sent       |
/// | valid   | absent or unreadable | local, uploaded           |
/// | valid   | newer                | remote, `changed`         |
/// | valid   | older                | local, uploaded           |
/// | valid   | same `updatedAt`     | local, nothing sent       |
///
/// The last row keeps local on a tie, so a remote edit stamped in the same millisecond
/// is never adopted.
#[derive(Clone)]
pub struct SyncAdapter {
    session: Arc<dyn AuthSession>,
    remote: Arc<dyn RemoteStore>,
}

impl SyncAdapter {
    /// Adapter over an injected session and remote.
    pub fn new(session: Arc<dyn AuthSession>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { session, remote }
    }

    /// Session capability.
    pub fn session(&self) -> &Arc<dyn AuthSession> {
        &self.session
    }

    /// Reconciles `local` with the remote blob.
    ///
    /// Upload failures are returned; local persistence is unaffected by them.
    pub async fn reconcile(&self, local: Snapshot) -> SyncResult<SyncOutcome> {
        let Some(token) = self.session.valid_access_token().await else {
            tracing::debug!("no remote session; sync skipped");
            return Ok(SyncOutcome::keep(local, false));
        };

        let remote = match self.read_remote(&token).await {
            Ok(remote) => remote,
            Err(err) => {
                tracing::warn!(%err, "remote read failed; treating as absent");
                None
            }
        };

        let Some(remote) = remote else {
            self.upload(&token, &local).await?;
            return Ok(SyncOutcome::keep(local, true));
        };

        let local_at = local.updated_at().unwrap_or(0);
        match remote.updated_at.cmp(&local_at) {
            Ordering::Greater => {
                tracing::info!(local_at, remote_at = remote.updated_at, "remote snapshot is newer");
                let mut merged = remote.snapshot;
                merged.set_updated_at(Some(remote.updated_at));
                Ok(SyncOutcome {
                    merged,
                    changed: true,
                    uploaded: false,
                })
            }
            Ordering::Less => {
                tracing::info!(local_at, remote_at = remote.updated_at, "local snapshot is newer");
                self.upload(&token, &local).await?;
                Ok(SyncOutcome::keep(local, true))
            }
            Ordering::Equal => {
                tracing::debug!(local_at, "timestamps equal; keeping local");
                Ok(SyncOutcome::keep(local, false))
            }
        }
    }

    /// Uploads `snapshot` regardless of the remote timestamp.
    ///
    /// Returns `false` without contacting the remote when there is no session.
    pub async fn push(&self, snapshot: &Snapshot) -> SyncResult<bool> {
        let Some(token) = self.session.valid_access_token().await else {
            return Ok(false);
        };
        self.upload(&token, snapshot).await?;
        Ok(true)
    }

    async fn read_remote(&self, token: &str) -> SyncResult<Option<RemotePayload>> {
        if let Some(cached) = self.session.cached_file_id().await {
            match self.remote.download(token, &cached).await {
                Ok(payload) => return Ok(Some(payload)),
                Err(err) => {
                    tracing::debug!(%err, file_id = %cached, "cached remote file unusable; looking it up");
                }
            }
        }

        let found = self.remote.find_file_id(token).await?;
        self.session.cache_file_id(found.as_deref()).await?;
        let Some(file_id) = found else {
            return Ok(None);
        };
        self.remote.download(token, &file_id).await.map(Some)
    }

    async fn upload(&self, token: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let file_id = match self.session.cached_file_id().await {
            Some(id) => Some(id),
            None => self.remote.find_file_id(token).await.unwrap_or_else(|err| {
                tracing::debug!(%err, "file lookup before upload failed; creating");
                None
            }),
        };

        let payload = RemotePayload::wrap(snapshot.clone(), now_ms());
        let resolved = self
            .remote
            .upload(token, file_id.as_deref(), &payload)
            .await?;
        self.session.cache_file_id(resolved.as_deref()).await?;
        tracing::info!(updated_at = payload.updated_at, "snapshot uploaded");
        Ok(())
    }
}
