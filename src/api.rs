//! HTTP surface for the sync cache.
//!
//! - `GET /api/chat/config/llamacloud` – Projects and their pipelines, for pickers in chat UIs.
//! - `POST /api/pipelines/:pipeline_id/files` – Upload a raw request body into a pipeline.
//!   Query: `project_id`, `name`, optional `wait` (default `true`) and `metadata` (JSON object).
//!   Bodies up to the configured upload limit are accepted.
//! - `POST /api/sources/download` – Queue background downloads for the source files behind
//!   retrieval results. Responds `202` before any download runs.
//! - `GET /api/files/output/llamacloud/:name` – Serve a cached pipeline file.
//! - `GET /metrics` – Cache and ingestion counters.

use crate::cloud::FileUpload;
use crate::metrics::SyncMetricsSnapshot;
use crate::sync::naming::is_plain_file_name;
use crate::sync::{NodeWithScore, SyncApi, SyncError, UploadRequest};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Build the HTTP router exposing the sync API surface.
///
/// `max_upload_bytes` caps the upload route body; every other route keeps axum's default.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: SyncApi + 'static,
{
    Router::new()
        .route("/api/chat/config/llamacloud", get(get_llamacloud_config::<S>))
        .route(
            "/api/pipelines/:pipeline_id/files",
            post(upload_file::<S>).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/sources/download", post(schedule_downloads::<S>))
        .route(
            "/api/files/output/llamacloud/:name",
            get(get_cached_file::<S>),
        )
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

#[derive(Serialize)]
struct LlamaCloudConfigResponse {
    projects: Vec<crate::cloud::ProjectRoster>,
}

async fn get_llamacloud_config<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<LlamaCloudConfigResponse>, AppError>
where
    S: SyncApi,
{
    if !service.is_configured() {
        return Err(AppError::NotConfigured);
    }
    let projects = service.pipeline_roster().await;
    Ok(Json(LlamaCloudConfigResponse { projects }))
}

/// Query parameters for `POST /api/pipelines/:pipeline_id/files`.
#[derive(Deserialize)]
struct UploadParams {
    project_id: String,
    name: String,
    #[serde(default = "default_wait")]
    wait: bool,
    /// JSON-encoded object merged into the file's custom metadata.
    #[serde(default)]
    metadata: Option<String>,
}

fn default_wait() -> bool {
    true
}

#[derive(Serialize)]
struct UploadResponse {
    file_id: String,
}

/// Upload the request body as a file and register it with the pipeline.
async fn upload_file<S>(
    State(service): State<Arc<S>>,
    Path(pipeline_id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError>
where
    S: SyncApi,
{
    if !service.is_configured() {
        return Err(AppError::NotConfigured);
    }
    for (field, value) in [("pipeline_id", &pipeline_id), ("project_id", &params.project_id)] {
        if !is_plain_file_name(value) {
            return Err(AppError::BadRequest(format!("invalid {field}: {value}")));
        }
    }
    let custom_metadata = parse_metadata(params.metadata.as_deref())?;
    let request = UploadRequest {
        project_id: params.project_id,
        pipeline_id,
        upload: FileUpload {
            name: params.name,
            bytes: body.to_vec(),
        },
        custom_metadata,
        wait_for_processing: params.wait,
    };
    let file_id = service.upload(request).await?;
    tracing::info!(file_id = %file_id, "Upload request completed");
    Ok(Json(UploadResponse { file_id }))
}

fn parse_metadata(raw: Option<&str>) -> Result<Map<String, Value>, AppError> {
    match raw {
        None => Ok(Map::new()),
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(AppError::BadRequest(
                "metadata must be a JSON object".to_string(),
            )),
        },
    }
}

#[derive(Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    nodes: Vec<NodeWithScore>,
}

#[derive(Serialize)]
struct DownloadResponse {
    scheduled: usize,
}

async fn schedule_downloads<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<DownloadRequest>,
) -> (StatusCode, Json<DownloadResponse>)
where
    S: SyncApi,
{
    let scheduled = service.schedule_source_downloads(&request.nodes);
    tracing::debug!(
        nodes = request.nodes.len(),
        scheduled,
        "Source downloads scheduled"
    );
    (StatusCode::ACCEPTED, Json(DownloadResponse { scheduled }))
}

/// Serve a previously cached pipeline file.
async fn get_cached_file<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
) -> Result<Response, AppError>
where
    S: SyncApi,
{
    if !is_plain_file_name(&name) {
        return Err(AppError::BadRequest(format!("invalid file name: {name}")));
    }
    let path = service.cache_root().join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::NotFound(name))
        }
        Err(error) => Err(AppError::Io(error)),
    }
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<SyncMetricsSnapshot>
where
    S: SyncApi,
{
    Json(service.metrics_snapshot())
}

enum AppError {
    NotConfigured,
    BadRequest(String),
    NotFound(String),
    Sync(SyncError),
    Io(std::io::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotConfigured | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Sync(SyncError::IngestionFailed { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Sync(SyncError::IngestionTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Sync(SyncError::Cloud(_)) => StatusCode::BAD_GATEWAY,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotConfigured => "LlamaCloud is not configured".to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::NotFound(name) => format!("file not found: {name}"),
            Self::Sync(error) => error.to_string(),
            Self::Io(error) => error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<SyncError> for AppError {
    fn from(inner: SyncError) -> Self {
        Self::Sync(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::cloud::{CloudError, FileStatus, IngestionStatus, PipelineSummary, ProjectRoster};
    use crate::metrics::SyncMetricsSnapshot;
    use crate::sync::testing::project;
    use crate::sync::{NodeWithScore, SyncApi, SyncError, UploadRequest};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Clone, Copy)]
    enum UploadBehavior {
        Succeed,
        Fail,
        TimeOut,
        Transport,
    }

    struct StubSyncService {
        configured: bool,
        cache_root: PathBuf,
        upload_behavior: UploadBehavior,
        uploads: Mutex<Vec<UploadRequest>>,
        scheduled_batches: Mutex<Vec<usize>>,
    }

    impl StubSyncService {
        fn new(cache_root: &Path) -> Self {
            Self {
                configured: true,
                cache_root: cache_root.to_path_buf(),
                upload_behavior: UploadBehavior::Succeed,
                uploads: Mutex::new(Vec::new()),
                scheduled_batches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SyncApi for StubSyncService {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn pipeline_roster(&self) -> Vec<ProjectRoster> {
            vec![ProjectRoster {
                project: project("proj-1", "Default"),
                pipelines: vec![PipelineSummary {
                    id: "pipe-1".into(),
                    name: "docs".into(),
                }],
            }]
        }

        async fn upload(&self, request: UploadRequest) -> Result<String, SyncError> {
            self.uploads.lock().expect("uploads lock").push(request);
            match self.upload_behavior {
                UploadBehavior::Succeed => Ok("file-1".into()),
                UploadBehavior::Fail => Err(SyncError::IngestionFailed {
                    file_id: "file-1".into(),
                    status: FileStatus::new(IngestionStatus::Error),
                }),
                UploadBehavior::TimeOut => Err(SyncError::IngestionTimeout { attempts: 20 }),
                UploadBehavior::Transport => Err(SyncError::Cloud(CloudError::UnexpectedStatus {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    body: "unavailable".into(),
                })),
            }
        }

        fn schedule_source_downloads(&self, nodes: &[NodeWithScore]) -> usize {
            self.scheduled_batches
                .lock()
                .expect("batches lock")
                .push(nodes.len());
            nodes.len()
        }

        fn cache_root(&self) -> &Path {
            &self.cache_root
        }

        fn metrics_snapshot(&self) -> SyncMetricsSnapshot {
            SyncMetricsSnapshot {
                downloads: 3,
                ..SyncMetricsSnapshot::default()
            }
        }
    }

    const UPLOAD_LIMIT: usize = 4 * 1024 * 1024;

    async fn send(
        service: Arc<StubSyncService>,
        method: Method,
        uri: &str,
        body: Body,
    ) -> (StatusCode, Vec<u8>) {
        let response = create_router(service, UPLOAD_LIMIT)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, body.to_vec())
    }

    fn json_body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("json body")
    }

    #[tokio::test]
    async fn llamacloud_config_lists_projects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = Arc::new(StubSyncService::new(dir.path()));

        let (status, body) = send(
            service,
            Method::GET,
            "/api/chat/config/llamacloud",
            Body::empty(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json = json_body(&body);
        assert_eq!(json["projects"][0]["id"], "proj-1");
        assert_eq!(json["projects"][0]["pipelines"][0]["name"], "docs");
    }

    #[tokio::test]
    async fn llamacloud_config_is_404_without_credentials() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut stub = StubSyncService::new(dir.path());
        stub.configured = false;

        let (status, body) = send(
            Arc::new(stub),
            Method::GET,
            "/api/chat/config/llamacloud",
            Body::empty(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&body)["error"], "LlamaCloud is not configured");
    }

    #[tokio::test]
    async fn upload_route_forwards_body_and_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = Arc::new(StubSyncService::new(dir.path()));

        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/api/pipelines/pipe-1/files?project_id=proj-1&name=notes.txt&wait=false&metadata=%7B%22team%22%3A%22docs%22%7D",
            Body::from("file body"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["file_id"], "file-1");

        let uploads = service.uploads.lock().expect("uploads lock");
        assert_eq!(uploads.len(), 1);
        let request = &uploads[0];
        assert_eq!(request.pipeline_id, "pipe-1");
        assert_eq!(request.project_id, "proj-1");
        assert_eq!(request.upload.name, "notes.txt");
        assert_eq!(request.upload.bytes, b"file body");
        assert!(!request.wait_for_processing);
        assert_eq!(request.custom_metadata["team"], json!("docs"));
    }

    #[tokio::test]
    async fn upload_route_rejects_non_object_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = Arc::new(StubSyncService::new(dir.path()));

        let (status, _) = send(
            service.clone(),
            Method::POST,
            "/api/pipelines/pipe-1/files?project_id=proj-1&name=a.txt&metadata=%5B1%5D",
            Body::from("x"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(service.uploads.lock().expect("uploads lock").is_empty());
    }

    #[tokio::test]
    async fn upload_errors_map_to_distinct_statuses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let uri = "/api/pipelines/pipe-1/files?project_id=proj-1&name=a.txt";

        let mut failing = StubSyncService::new(dir.path());
        failing.upload_behavior = UploadBehavior::Fail;
        let (status, body) = send(Arc::new(failing), Method::POST, uri, Body::from("x")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(
            json_body(&body)["error"]
                .as_str()
                .expect("message")
                .contains("File processing failed")
        );

        let mut slow = StubSyncService::new(dir.path());
        slow.upload_behavior = UploadBehavior::TimeOut;
        let (status, _) = send(Arc::new(slow), Method::POST, uri, Body::from("x")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let mut unreachable = StubSyncService::new(dir.path());
        unreachable.upload_behavior = UploadBehavior::Transport;
        let (status, body) =
            send(Arc::new(unreachable), Method::POST, uri, Body::from("x")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(
            json_body(&body)["error"]
                .as_str()
                .expect("message")
                .contains("503")
        );
    }

    #[tokio::test]
    async fn upload_route_is_404_without_credentials() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut stub = StubSyncService::new(dir.path());
        stub.configured = false;
        let service = Arc::new(stub);

        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/api/pipelines/pipe-1/files?project_id=proj-1&name=a.txt",
            Body::from("x"),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&body)["error"], "LlamaCloud is not configured");
        assert!(service.uploads.lock().expect("uploads lock").is_empty());
    }

    #[tokio::test]
    async fn upload_route_rejects_path_like_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = Arc::new(StubSyncService::new(dir.path()));

        for uri in [
            "/api/pipelines/..%2F..%2Fx/files?project_id=proj-1&name=a.txt",
            "/api/pipelines/../files?project_id=proj-1&name=a.txt",
            "/api/pipelines/pipe-1/files?project_id=..%2Fprojects&name=a.txt",
        ] {
            let (status, _) = send(service.clone(), Method::POST, uri, Body::from("x")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }

        assert!(service.uploads.lock().expect("uploads lock").is_empty());
    }

    #[tokio::test]
    async fn upload_route_accepts_bodies_up_to_the_configured_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = Arc::new(StubSyncService::new(dir.path()));
        let uri = "/api/pipelines/pipe-1/files?project_id=proj-1&name=big.pdf&wait=false";

        let (status, _) = send(
            service.clone(),
            Method::POST,
            uri,
            Body::from(vec![7_u8; 3 * 1024 * 1024]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            service.clone(),
            Method::POST,
            uri,
            Body::from(vec![7_u8; UPLOAD_LIMIT + 1]),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(service.uploads.lock().expect("uploads lock").len(), 1);
    }

    #[tokio::test]
    async fn download_route_accepts_nodes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = Arc::new(StubSyncService::new(dir.path()));
        let payload = json!({
            "nodes": [
                { "node": { "metadata": { "file_name": "a.pdf", "pipeline_id": "p1" } }, "score": 0.5 },
                { "node": { "metadata": {} } }
            ]
        });

        let (status, body) = send(
            service.clone(),
            Method::POST,
            "/api/sources/download",
            Body::from(payload.to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json_body(&body)["scheduled"], 2);
        assert_eq!(
            *service.scheduled_batches.lock().expect("batches lock"),
            vec![2]
        );
    }

    #[tokio::test]
    async fn cached_files_are_served_and_traversal_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("p1$a.pdf"), b"cached").expect("seed");
        let service = Arc::new(StubSyncService::new(dir.path()));

        let (status, body) = send(
            service.clone(),
            Method::GET,
            "/api/files/output/llamacloud/p1$a.pdf",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"cached");

        let (status, _) = send(
            service.clone(),
            Method::GET,
            "/api/files/output/llamacloud/missing.pdf",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            service,
            Method::GET,
            "/api/files/output/llamacloud/..%2Fsecret",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_route_returns_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = Arc::new(StubSyncService::new(dir.path()));

        let (status, body) = send(service, Method::GET, "/metrics", Body::empty()).await;

        assert_eq!(status, StatusCode::OK);
        let json = json_body(&body);
        assert_eq!(json["downloads"], 3);
        assert_eq!(json["cache_hits"], 0);
    }
}
