use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    config::DriveConfig,
    types::{now_ms, TimestampMs},
};

use super::{remote::RemoteStore, RemotePayload, SyncError, SyncResult};

const APP_DATA_FOLDER: &str = "appDataFolder";
const JSON_PART: &str = "Content-Type: application/json; charset=UTF-8";

/// [`RemoteStore`] over the Drive v3 REST API, confined to the app-data folder.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    config: DriveConfig,
}

impl DriveClient {
    /// Builds a client with the configured request timeout.
    pub fn new(config: DriveConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self::with_client(http, config))
    }

    /// Uses an existing HTTP client.
    pub fn with_client(http: reqwest::Client, config: DriveConfig) -> Self {
        Self { http, config }
    }

    fn files_endpoint(&self) -> String {
        format!("{}/files", self.config.api_base_url.trim_end_matches('/'))
    }

    fn upload_endpoint(&self, file_id: Option<&str>) -> String {
        let base = self.config.upload_base_url.trim_end_matches('/');
        match file_id {
            Some(id) => format!("{base}/files/{id}?uploadType=multipart"),
            None => format!("{base}/files?uploadType=multipart"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRef {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    name: &'a str,
    parents: [&'a str; 1],
    description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadDescription<'a> {
    updated_at: TimestampMs,
    hash: &'a str,
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn find_file_id(&self, token: &str) -> SyncResult<Option<String>> {
        let query = format!("name='{}' and trashed=false", self.config.file_name);
        let response = self
            .http
            .get(self.files_endpoint())
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", APP_DATA_FOLDER),
                ("fields", "files(id)"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::ReadFailed(format!("file lookup returned {status}")));
        }

        let list: FileList = response
            .json()
            .await
            .map_err(|err| SyncError::ReadFailed(format!("file lookup body: {err}")))?;
        Ok(list.files.into_iter().find_map(|file| file.id))
    }

    async fn download(&self, token: &str, file_id: &str) -> SyncResult<RemotePayload> {
        let response = self
            .http
            .get(format!("{}/{file_id}", self.files_endpoint()))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::ReadFailed(format!("download returned {status}")));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|err| SyncError::ReadFailed(format!("remote payload malformed: {err}")))
    }

    async fn upload(
        &self,
        token: &str,
        file_id: Option<&str>,
        payload: &RemotePayload,
    ) -> SyncResult<Option<String>> {
        let contents = serde_json::to_string(payload)?;
        let hash = content_hash(&contents);
        let metadata = serde_json::to_string(&UploadMetadata {
            name: &self.config.file_name,
            parents: [APP_DATA_FOLDER],
            description: serde_json::to_string(&UploadDescription {
                updated_at: payload.updated_at,
                hash: &hash,
            })?,
        })?;

        let boundary = format!("barsync-sync-{}", now_ms());
        let body = encode_multipart(&boundary, &metadata, &contents);
        let method = if file_id.is_some() {
            Method::PATCH
        } else {
            Method::POST
        };

        let response = self
            .http
            .request(method.clone(), self.upload_endpoint(file_id))
            .bearer_auth(token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, %method, "remote upload rejected");
            return Err(SyncError::UploadFailed {
                status: status.as_u16(),
            });
        }

        let created = if status == StatusCode::NO_CONTENT {
            FileRef::default()
        } else {
            response.json::<FileRef>().await.unwrap_or_default()
        };
        Ok(created.id.or_else(|| file_id.map(str::to_string)))
    }
}

/// `multipart/related` body with a JSON metadata part followed by a JSON content part.
pub fn encode_multipart(boundary: &str, metadata: &str, contents: &str) -> String {
    format!(
        "--{boundary}\r\n{JSON_PART}\r\n\r\n{metadata}\r\n\
         --{boundary}\r\n{JSON_PART}\r\n\r\n{contents}\r\n\
         --{boundary}--"
    )
}

/// djb2-xor over UTF-16 code units, as lowercase hex.
pub fn content_hash(value: &str) -> String {
    let hash = value
        .encode_utf16()
        .fold(5381u32, |hash, unit| hash.wrapping_mul(33) ^ u32::from(unit));
    format!("{hash:x}")
}
