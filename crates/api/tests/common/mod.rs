#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use xplain_api::config::ServerConfig;
use xplain_api::router::build_app_router;
use xplain_api::state::AppState;
use xplain_core::capability::{Classifier, ExplainParams, Explainer, Explanation, Scorer, Scores};
use xplain_core::error::CoreError;
use xplain_core::image::ImageTensor;
use xplain_core::labels::LabelSet;
use xplain_core::registry::JobRegistry;
use xplain_core::storage::FsArtifactStore;
use xplain_pipeline::{JobRunner, SampledExplainer};

pub const BOUNDARY: &str = "xplain-test-boundary";

pub const LABELS: [&str; 6] = ["beagle", "boxer", "corgi", "husky", "poodle", "pug"];

/// Build a test `ServerConfig` that keeps jobs small and polls fast.
pub fn test_config(dirs: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        upload_dir: dirs.path().join("uploads"),
        artifact_dir: dirs.path().join("artifacts"),
        model_url: "http://127.0.0.1:1/unused".to_string(),
        labels_path: dirs.path().join("labels.csv"),
        explain_num_samples: 40,
        explain_batch_size: 10,
        explain_num_features: 3,
        progress_granularity: 1,
        progress_poll_interval_ms: 20,
        job_retention_secs: 600,
        database_url: None,
    }
}

// ---------------------------------------------------------------------------
// Fake capabilities
// ---------------------------------------------------------------------------

/// Returns the same scores for every image after an optional delay.
pub struct FixedClassifier {
    pub scores: Vec<f32>,
    pub delay: Duration,
}

impl FixedClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            delay: Duration::ZERO,
        }
    }

    pub fn slow(scores: Vec<f32>, delay: Duration) -> Self {
        Self { scores, delay }
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn predict(&self, batch: &[ImageTensor]) -> Result<Vec<Scores>, CoreError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(batch.iter().map(|_| self.scores.clone()).collect())
    }
}

/// Never answers. Jobs using it only end through cancellation.
pub struct StalledClassifier;

#[async_trait]
impl Classifier for StalledClassifier {
    async fn predict(&self, _batch: &[ImageTensor]) -> Result<Vec<Scores>, CoreError> {
        std::future::pending().await
    }
}

/// Fails every explanation without scoring anything.
pub struct FailingExplainer;

#[async_trait]
impl Explainer for FailingExplainer {
    async fn explain(
        &self,
        _image: &ImageTensor,
        _scorer: &mut dyn Scorer,
        _params: &ExplainParams,
    ) -> Result<Explanation, CoreError> {
        Err(CoreError::Inference("explainer exploded".into()))
    }
}

pub fn default_scores() -> Vec<f32> {
    vec![0.1, 0.5, 0.05, 0.2, 0.1, 0.05]
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Router plus handles tests need to inspect server-side state.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<JobRegistry>,
    pub config: ServerConfig,
    _dirs: TempDir,
}

/// Build the full application router with all middleware layers around
/// the given capabilities and a scratch directory.
pub fn build_test_app(classifier: Arc<dyn Classifier>, explainer: Arc<dyn Explainer>) -> TestApp {
    let dirs = TempDir::new().unwrap();
    let config = test_config(&dirs);

    let registry = Arc::new(JobRegistry::new());
    let store = Arc::new(FsArtifactStore::new(config.artifact_dir.clone()));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&registry),
        Arc::clone(&classifier),
        explainer,
        store.clone(),
        config.runner_config(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        runner,
        classifier,
        labels: Arc::new(LabelSet::new(LABELS)),
        store,
        pool: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        registry,
        config,
        _dirs: dirs,
    }
}

/// App with a slightly slow fixed classifier and the real sampled explainer.
pub fn default_test_app() -> TestApp {
    build_test_app(
        Arc::new(FixedClassifier::slow(default_scores(), Duration::from_millis(15))),
        Arc::new(SampledExplainer::new(4).with_seed(11)),
    )
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// A small PNG image.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Encode a single multipart field.
pub fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_multipart(app: Router, uri: &str, field: &str, bytes: &[u8]) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, bytes)))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Submit an image and return the new job id.
pub async fn submit(app: Router, bytes: &[u8]) -> String {
    let response = post_multipart(app, "/api/v1/explain", "file", bytes).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["job_id"].as_str().unwrap().to_string()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Payloads of every `data:` line in an SSE body.
pub fn parse_events(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

/// Open the progress stream and read it to the end.
pub async fn read_stream(app: Router, job_id: &str) -> Vec<Value> {
    let response = get(app, &format!("/api/v1/explain/{job_id}/progress")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    parse_events(&text)
}

/// Wait (bounded) until the job's snapshot satisfies `done`.
pub async fn wait_for(registry: &JobRegistry, job_id: &str, done: impl Fn(&xplain_core::job::JobSnapshot) -> bool) {
    let id = job_id.parse().unwrap();
    for _ in 0..200 {
        if registry.get(&id).as_ref().is_some_and(&done) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached the expected state");
}
