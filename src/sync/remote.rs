use async_trait::async_trait;

use super::{RemotePayload, SyncResult};

/// Access to the single remote blob.
///
/// Implementations map non-success lookups and downloads to
/// [`super::SyncError::ReadFailed`] and non-success uploads to
/// [`super::SyncError::UploadFailed`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Id of the blob, if one exists.
    async fn find_file_id(&self, token: &str) -> SyncResult<Option<String>>;

    /// Contents of the blob with `file_id`.
    async fn download(&self, token: &str, file_id: &str) -> SyncResult<RemotePayload>;

    /// Creates the blob when `file_id` is `None`, otherwise replaces it. Returns the id the
    /// remote now knows the blob by.
    async fn upload(
        &self,
        token: &str,
        file_id: Option<&str>,
        payload: &RemotePayload,
    ) -> SyncResult<Option<String>>;
}
