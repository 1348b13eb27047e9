mod common;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use barsync::{
    config::DriveConfig,
    persist::{MemoryStorage, StorageDriver},
    snapshot::{build_snapshot, Preferences},
    sync::{
        drive::{content_hash, encode_multipart},
        DriveClient, RemotePayload, RemoteStore, StoredSession, SyncAdapter, SyncError,
        TokenGrant,
    },
};
use serde_json::{json, Value};

use common::baseline;

const FILE_NAME: &str = "inventory-sync.json";

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    auth: Option<String>,
    content_type: Option<String>,
    body: String,
}

struct FakeDrive {
    blob: Mutex<Option<(String, String)>>,
    lookup_status: StatusCode,
    upload_status: StatusCode,
    seen: Mutex<Vec<Seen>>,
}

impl FakeDrive {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            blob: Mutex::new(None),
            lookup_status: StatusCode::OK,
            upload_status: StatusCode::OK,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn with_blob(id: &str, body: &str) -> Arc<Self> {
        let drive = Self::new();
        *drive.blob.lock().expect("lock") = Some((id.to_string(), body.to_string()));
        drive
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().expect("lock").clone()
    }
}

async fn handle(
    State(drive): State<Arc<FakeDrive>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    drive.seen.lock().expect("lock").push(Seen {
        method: method.clone(),
        path: uri.path().to_string(),
        query: query.clone(),
        auth: text(header::AUTHORIZATION),
        content_type: text(header::CONTENT_TYPE),
        body: body.clone(),
    });

    let path = uri.path();
    if method == Method::GET && path == "/files" {
        if drive.lookup_status != StatusCode::OK {
            return drive.lookup_status.into_response();
        }
        let files: Vec<Value> = drive
            .blob
            .lock()
            .expect("lock")
            .iter()
            .map(|(id, _)| json!({ "id": id }))
            .collect();
        return Json(json!({ "files": files })).into_response();
    }

    if method == Method::GET {
        let wanted = path.trim_start_matches("/files/");
        return match drive.blob.lock().expect("lock").as_ref() {
            Some((id, contents)) if id == wanted => contents.clone().into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        };
    }

    if drive.upload_status != StatusCode::OK {
        return drive.upload_status.into_response();
    }
    let id = match path.strip_prefix("/upload/files/") {
        Some(id) => id.to_string(),
        None => "created-1".to_string(),
    };
    // Stored the way the real service would: only the content part.
    let contents = body
        .split("\r\n\r\n")
        .nth(2)
        .and_then(|part| part.split("\r\n--").next())
        .unwrap_or_default()
        .to_string();
    *drive.blob.lock().expect("lock") = Some((id.clone(), contents));
    Json(json!({ "id": id })).into_response()
}

async fn serve(drive: Arc<FakeDrive>) -> DriveClient {
    let app = Router::new().fallback(handle).with_state(drive);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    DriveClient::new(DriveConfig {
        api_base_url: format!("http://{addr}"),
        upload_base_url: format!("http://{addr}/upload"),
        file_name: FILE_NAME.to_string(),
        timeout_ms: 5_000,
        ..DriveConfig::default()
    })
    .expect("client")
}

fn payload(updated_at: i64) -> RemotePayload {
    let base = baseline();
    let mut state = base.to_state();
    state.delete_cocktail(1).expect("delete");
    RemotePayload::wrap(
        build_snapshot(&state, &base, &Preferences::default(), Some(updated_at)),
        0,
    )
}

#[tokio::test]
async fn lookup_queries_the_app_data_folder() {
    let drive = FakeDrive::with_blob("abc", "{}");
    let client = serve(drive.clone()).await;

    let found = client.find_file_id("tok").await.expect("lookup");
    assert_eq!(found.as_deref(), Some("abc"));

    let seen = drive.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/files");
    assert_eq!(seen[0].auth.as_deref(), Some("Bearer tok"));
    assert_eq!(seen[0].query["q"], format!("name='{FILE_NAME}' and trashed=false"));
    assert_eq!(seen[0].query["spaces"], "appDataFolder");
    assert_eq!(seen[0].query["fields"], "files(id)");
}

#[tokio::test]
async fn lookup_without_files_is_none_and_errors_are_read_failures() {
    let client = serve(FakeDrive::new()).await;
    assert_eq!(client.find_file_id("tok").await.expect("lookup"), None);

    let drive = Arc::new(FakeDrive {
        lookup_status: StatusCode::UNAUTHORIZED,
        ..Arc::into_inner(FakeDrive::new()).expect("sole owner")
    });
    let client = serve(drive).await;
    let err = client.find_file_id("tok").await.expect_err("401");
    assert!(matches!(err, SyncError::ReadFailed(_)), "{err}");
}

#[tokio::test]
async fn download_parses_the_stored_payload() {
    let stored = payload(1234);
    let body = serde_json::to_string(&stored).expect("encode");
    let drive = FakeDrive::with_blob("abc", &body);
    let client = serve(drive.clone()).await;

    let fetched = client.download("tok", "abc").await.expect("download");
    assert_eq!(fetched, stored);
    assert_eq!(drive.seen()[0].query["alt"], "media");

    let err = client.download("tok", "missing").await.expect_err("404");
    assert!(matches!(err, SyncError::ReadFailed(_)), "{err}");
}

#[tokio::test]
async fn malformed_remote_body_is_a_read_failure() {
    let client = serve(FakeDrive::with_blob("abc", "{\"snapshot\":{\"version\":42}}")).await;
    let err = client.download("tok", "abc").await.expect_err("malformed");
    assert!(matches!(err, SyncError::ReadFailed(_)), "{err}");
}

#[tokio::test]
async fn first_upload_posts_multipart_and_returns_the_new_id() {
    let drive = FakeDrive::new();
    let client = serve(drive.clone()).await;
    let outgoing = payload(99);

    let id = client.upload("tok", None, &outgoing).await.expect("upload");
    assert_eq!(id.as_deref(), Some("created-1"));

    let seen = drive.seen();
    let request = &seen[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "/upload/files");
    assert_eq!(request.query["uploadType"], "multipart");

    let content_type = request.content_type.as_deref().expect("content type");
    let boundary = content_type
        .strip_prefix("multipart/related; boundary=")
        .expect("multipart");
    assert!(boundary.starts_with("barsync-sync-"));
    assert!(request.body.ends_with(&format!("--{boundary}--")));

    let parts: Vec<&str> = request.body.split("\r\n\r\n").collect();
    let metadata: Value = serde_json::from_str(
        parts[1]
            .split("\r\n--")
            .next()
            .expect("metadata part"),
    )
    .expect("metadata json");
    assert_eq!(metadata["name"], FILE_NAME);
    assert_eq!(metadata["parents"], json!(["appDataFolder"]));

    let contents = serde_json::to_string(&outgoing).expect("encode");
    let description: Value =
        serde_json::from_str(metadata["description"].as_str().expect("description"))
            .expect("description json");
    assert_eq!(description["updatedAt"], 99);
    assert_eq!(description["hash"], content_hash(&contents));

    let (_, stored) = drive.blob.lock().expect("lock").clone().expect("stored");
    assert_eq!(stored, contents);
}

#[tokio::test]
async fn known_id_is_patched_in_place() {
    let drive = FakeDrive::with_blob("abc", "{}");
    let client = serve(drive.clone()).await;

    let id = client
        .upload("tok", Some("abc"), &payload(5))
        .await
        .expect("upload");
    assert_eq!(id.as_deref(), Some("abc"));

    let seen = drive.seen();
    assert_eq!(seen[0].method, Method::PATCH);
    assert_eq!(seen[0].path, "/upload/files/abc");
    assert_eq!(seen[0].auth.as_deref(), Some("Bearer tok"));
}

#[tokio::test]
async fn rejected_upload_reports_the_status() {
    let drive = Arc::new(FakeDrive {
        upload_status: StatusCode::FORBIDDEN,
        ..Arc::into_inner(FakeDrive::new()).expect("sole owner")
    });
    let client = serve(drive).await;

    let err = client
        .upload("tok", None, &payload(1))
        .await
        .expect_err("403");
    assert!(matches!(err, SyncError::UploadFailed { status: 403 }), "{err}");
}

#[tokio::test]
async fn adapter_over_drive_creates_then_reuses_the_blob() {
    let drive = FakeDrive::new();
    let client = serve(drive.clone()).await;
    let storage: Arc<dyn StorageDriver> = Arc::new(MemoryStorage::new());
    let session = Arc::new(StoredSession::new(storage, "sync-state", "scope"));
    session
        .accept_grant(TokenGrant {
            access_token: "tok".to_string(),
            expires_in_secs: 3600,
        })
        .expect("grant");
    let adapter = SyncAdapter::new(session.clone(), Arc::new(client));

    let local = payload(500).snapshot;
    let outcome = adapter.reconcile(local.clone()).await.expect("first sync");
    assert!(outcome.uploaded);
    assert_eq!(session.load_state().expect("state").remote_file_id.as_deref(), Some("created-1"));

    let outcome = adapter.reconcile(local).await.expect("second sync");
    assert!(!outcome.uploaded && !outcome.changed);

    let methods: Vec<Method> = drive.seen().into_iter().map(|seen| seen.method).collect();
    assert_eq!(
        methods,
        vec![Method::GET, Method::GET, Method::POST, Method::GET],
        "lookup, lookup before create, create, download by cached id"
    );
}

#[test]
fn hash_matches_reference_values() {
    assert_eq!(content_hash(""), "1505");
    assert_eq!(content_hash("a"), "2b5c4");
    assert_eq!(content_hash("hello"), "a9cede7");
    assert_eq!(content_hash("Ґ😀"), "b5ad2e8");
}

#[test]
fn multipart_layout() {
    let body = encode_multipart("b", "{\"name\":\"x\"}", "{}");
    assert_eq!(
        body,
        "--b\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"x\"}\r\n\
         --b\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n\
         --b--"
    );
}
