//! HTTP surface tests against in-process collaborators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use vrelay_api::{create_router, ApiConfig, AppState};
use vrelay_delivery::{Deliverer, DeliveryResult};
use vrelay_jobs::JobTable;
use vrelay_media::{MediaResult, ProgressCallback, Transcoder, VideoInfo};
use vrelay_models::{
    DeliveryMode, DeliveryOptions, DeliveryReceipt, JobId, ObjectInfo, SearchQuery, StreamingPolicy,
    ThumbnailOffset, ThumbnailSize,
};
use vrelay_storage::{download_path, SourceStore, StorageError, StorageResult};
use vrelay_worker::{Collaborators, Orchestrator, WorkerConfig};

struct FakeStore {
    fetch_delay: Duration,
}

#[async_trait]
impl SourceStore for FakeStore {
    async fn resolve(&self, reference: &str) -> StorageResult<ObjectInfo> {
        if !reference.starts_with("drive:") {
            return Err(StorageError::not_found(reference));
        }
        Ok(ObjectInfo::new(reference, "clip.mp4")
            .with_size(64)
            .with_mime_type("video/mp4"))
    }

    async fn fetch(&self, info: &ObjectInfo, dir: &Path) -> StorageResult<PathBuf> {
        tokio::time::sleep(self.fetch_delay).await;
        let path = download_path(dir, &info.name, &info.mime_type);
        tokio::fs::write(&path, vec![0u8; info.size as usize]).await?;
        Ok(path)
    }

    async fn search(&self, query: &SearchQuery) -> StorageResult<Vec<ObjectInfo>> {
        let mut found = vec![
            ObjectInfo::new("a1", "beach.mp4")
                .with_size(5 * 1024 * 1024)
                .with_mime_type("video/mp4"),
            ObjectInfo::new("b2", "city.mov")
                .with_size(1536)
                .with_mime_type("video/quicktime"),
        ];
        if let Some(q) = &query.query {
            found.retain(|o| o.name.contains(q.as_str()));
        }
        Ok(found)
    }
}

struct FakeTranscoder;

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe(&self, _path: &Path) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            duration: 4.0,
            width: 640,
            height: 360,
            fps: 25.0,
            codec: "h264".to_string(),
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            size: 64,
            bitrate: 128_000,
            has_audio: false,
        })
    }

    async fn needs_transcode(&self, _path: &Path) -> bool {
        false
    }

    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        _policy: &StreamingPolicy,
        _progress: ProgressCallback,
    ) -> MediaResult<PathBuf> {
        Ok(output.to_path_buf())
    }

    async fn thumbnail(
        &self,
        _input: &Path,
        output: &Path,
        _offset: ThumbnailOffset,
        _size: ThumbnailSize,
    ) -> MediaResult<PathBuf> {
        tokio::fs::write(output, b"jpeg").await?;
        Ok(output.to_path_buf())
    }
}

#[derive(Default)]
struct FakeDeliverer {
    destinations: Mutex<Vec<String>>,
    options: Mutex<Vec<DeliveryOptions>>,
}

#[async_trait]
impl Deliverer for FakeDeliverer {
    async fn deliver(
        &self,
        _media: &Path,
        destination: &str,
        options: &DeliveryOptions,
    ) -> DeliveryResult<DeliveryReceipt> {
        self.destinations.lock().unwrap().push(destination.to_string());
        self.options.lock().unwrap().push(options.clone());
        Ok(DeliveryReceipt {
            message_id: "1".to_string(),
            chat_id: destination.to_string(),
            mode: DeliveryMode::Streaming,
        })
    }

    async fn notify_failure(&self, _destination: &str, _message: &str) -> DeliveryResult<()> {
        Ok(())
    }
}

struct TestApp {
    router: Router,
    orchestrator: Orchestrator,
    deliverer: Arc<FakeDeliverer>,
    _work_dir: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_fetch_delay(Duration::ZERO)
    }

    fn with_fetch_delay(fetch_delay: Duration) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore { fetch_delay });
        let deliverer = Arc::new(FakeDeliverer::default());
        let collaborators = Collaborators {
            storage: store.clone(),
            transcoder: Arc::new(FakeTranscoder),
            deliverer: deliverer.clone(),
        };
        let config = WorkerConfig::default()
            .with_work_dir(work_dir.path())
            .with_cleanup_grace(Duration::from_secs(3600));
        let orchestrator = Orchestrator::new(collaborators, Arc::new(JobTable::default()), config);

        let state = AppState::new(ApiConfig::default(), orchestrator.clone(), store);
        Self {
            router: create_router(state, None),
            orchestrator,
            deliverer,
            _work_dir: work_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, bytes) = self.send(Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn wait_terminal(&self, job_id: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let snapshot = self
                .orchestrator
                .get_status(&JobId::from_string(job_id))
                .unwrap();
            if snapshot.job.is_terminal() {
                return serde_json::to_value(&snapshot).unwrap();
            }
            assert!(tokio::time::Instant::now() < deadline, "job {} never finished", job_id);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[tokio::test]
async fn submit_returns_job_id_and_status_url() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/jobs", json!({"sourceRef": "drive:abc", "destination": "42"}))
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["jobId"].as_str().unwrap().to_string();
    assert_eq!(body["statusUrl"], format!("/jobs/{}", job_id));

    let done = app.wait_terminal(&job_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["progress"], 100);
}

#[tokio::test]
async fn submit_without_destination_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app.post_json("/jobs", json!({"sourceRef": "drive:abc"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
    assert!(body["detail"].as_str().unwrap().contains("destination is required"));
    assert!(app.orchestrator.table().is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new();
    let request = Request::post("/jobs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/jobs/does-not-exist").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn status_reports_snapshot_with_duration() {
    let app = TestApp::new();
    let (_, body) = app
        .post_json("/jobs", json!({"sourceRef": "drive:abc", "destination": "42"}))
        .await;
    let job_id = body["jobId"].as_str().unwrap().to_string();
    app.wait_terminal(&job_id).await;

    let (status, snapshot) = app.get_json(&format!("/jobs/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["id"], job_id.as_str());
    assert_eq!(snapshot["status"], "completed");
    assert!(snapshot["duration"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn failed_job_keeps_its_error() {
    let app = TestApp::new();
    let (_, body) = app
        .post_json("/jobs", json!({"sourceRef": "ftp://nowhere", "destination": "42"}))
        .await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let done = app.wait_terminal(&job_id).await;
    assert_eq!(done["status"], "failed");
    assert!(done["error"].as_str().unwrap().contains("ftp://nowhere"));
}

#[tokio::test]
async fn webhook_accepts_aliases_inside_envelope() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/webhook/process",
            json!({"body": {"videoUrl": "drive:xyz", "chat_id": -100123, "message": "hi"}}),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["jobId"].as_str().unwrap().to_string();
    app.wait_terminal(&job_id).await;

    let destinations = app.deliverer.destinations.lock().unwrap().clone();
    assert_eq!(destinations, vec!["-100123".to_string()]);
}

#[tokio::test]
async fn webhook_without_source_is_rejected() {
    let app = TestApp::new();
    let (status, _) = app
        .post_json("/webhook/process", json!({"chatId": "42"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_stream_follows_job_to_completion() {
    let app = TestApp::with_fetch_delay(Duration::from_millis(50));
    let (_, body) = app
        .post_json("/jobs", json!({"sourceRef": "drive:abc", "destination": "42"}))
        .await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/jobs/{}/events", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = tokio::time::timeout(
        Duration::from_secs(10),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("stream did not close after the terminal event")
    .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("event: progress"));
    assert!(text.contains("\"status\":\"fetching\"") || text.contains("\"status\":\"queued\""));
    assert!(text.contains("\"status\":\"completed\""));
}

#[tokio::test]
async fn events_for_finished_job_send_one_event() {
    let app = TestApp::new();
    let (_, body) = app
        .post_json("/jobs", json!({"sourceRef": "drive:abc", "destination": "42"}))
        .await;
    let job_id = body["jobId"].as_str().unwrap().to_string();
    app.wait_terminal(&job_id).await;

    let (status, bytes) = app
        .send(
            Request::get(format!("/jobs/{}/events", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let text = String::from_utf8(bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text.matches("event: progress").count(), 1);
    assert!(text.contains("\"progress\":100"));
}

#[tokio::test]
async fn events_for_unknown_job_is_not_found() {
    let app = TestApp::new();
    let (status, _) = app
        .send(Request::get("/jobs/nope/events").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_formats_sizes() {
    let app = TestApp::new();
    let (status, body) = app.post_json("/videos/search", json!({"query": "beach"})).await;

    assert_eq!(status, StatusCode::OK);
    let videos = body["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["id"], "a1");
    assert_eq!(videos[0]["sizeFormatted"], "5 MB");
    assert_eq!(videos[0]["mimeType"], "video/mp4");
}

#[tokio::test]
async fn auto_process_queues_one_job_per_folder_video() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/workflow/auto-process", json!({"folderId": "f", "chatId": 42}))
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let jobs = body["jobs"].as_array().unwrap();
    let names: Vec<&str> = jobs.iter().map(|j| j["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["beach.mp4", "city.mov"]);

    for job in jobs {
        let job_id = job["jobId"].as_str().unwrap();
        assert_eq!(job["statusUrl"], format!("/jobs/{}", job_id));
        let done = app.wait_terminal(job_id).await;
        assert_eq!(done["status"], "completed");
    }

    let snapshot = app
        .orchestrator
        .get_status(&JobId::from_string(jobs[0]["jobId"].as_str().unwrap()))
        .unwrap();
    assert_eq!(snapshot.job.source_ref, "drive:a1");
    assert_eq!(snapshot.job.destination, "42");

    let options = app.deliverer.options.lock().unwrap().clone();
    let beach = options
        .iter()
        .find(|o| o.controls.iter().any(|c| c.action == "like_a1"))
        .expect("beach.mp4 delivered with its controls");
    assert_eq!(
        beach.caption.as_deref(),
        Some("📹 beach.mp4\n\n#video #auto_processed")
    );
    assert!(beach.controls.iter().any(|c| c.label == "📤 Share" && c.action == "share_a1"));

    let delivered = app.deliverer.destinations.lock().unwrap().clone();
    assert_eq!(delivered, vec!["42".to_string(), "42".to_string()]);
    assert_eq!(options.len(), 2);
}

#[tokio::test]
async fn auto_process_without_chat_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/workflow/auto-process", json!({"folderId": "f"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
    assert!(body["detail"].as_str().unwrap().contains("chatId is required"));
    assert!(app.orchestrator.table().is_empty());
}

#[tokio::test]
async fn auto_process_with_no_matches_returns_empty_list() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/workflow/auto-process",
            json!({"folderId": "f", "chatId": "42", "query": "nothing"}),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["jobs"], json!([]));
    assert!(app.orchestrator.table().is_empty());
}

#[tokio::test]
async fn health_is_ok_and_carries_request_id() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header("X-Request-ID", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-Request-ID"], "req-123");
}

#[tokio::test]
async fn ready_reports_job_counts() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["jobs"]["total"], 0);
    assert_eq!(body["checks"]["delivery"]["status"], "ok");
}

#[tokio::test]
async fn only_documented_health_paths_are_routed() {
    let app = TestApp::new();
    let (status, _) = app.send(Request::get("/healthz").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
