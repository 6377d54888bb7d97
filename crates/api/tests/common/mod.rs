#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use melody_api::config::{LogFormat, ServerConfig};
use melody_api::router::build_app_router;
use melody_api::state::AppState;
use melody_engine::{EngineError, GenerationEngine, GenerationRequest, MagentaConfig};
use melody_worker::JobManager;
use tempfile::TempDir;
use tower::ServiceExt;

/// Bytes written by [`StubEngine`] for every successful job.
pub const STUB_AUDIO: &[u8] = b"stub-audio";

/// Engine that writes [`STUB_AUDIO`] immediately, or fails when the prompt
/// contains `fail`.
pub struct StubEngine;

impl GenerationEngine for StubEngine {
    fn generate(&self, request: &GenerationRequest, out_path: &Path) -> Result<PathBuf, EngineError> {
        if request.prompt.contains("fail") {
            return Err(EngineError::ProcessFailed {
                program: "stub".to_string(),
                exit_code: Some(2),
                stderr: "generator crashed".to_string(),
            });
        }
        std::fs::write(out_path, STUB_AUDIO)?;
        Ok(out_path.to_path_buf())
    }
}

/// Build a test `ServerConfig` writing artifacts into `output_dir`.
pub fn test_config(output_dir: &Path, max_queue_size: usize) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        output_dir: output_dir.to_path_buf(),
        max_queue_size: NonZeroUsize::new(max_queue_size).unwrap(),
        slug_max_len: 50,
        worker_fault_backoff_secs: 0,
        static_dir: None,
        log_format: LogFormat::Text,
        log_file: None,
        log_file_backup_count: 1,
        engine: MagentaConfig::default(),
    }
}

/// A router over a fresh job manager backed by [`StubEngine`].
///
/// The worker is not started; call `jobs.start()` for tests that need jobs
/// to run.
pub struct TestApp {
    pub app: Router,
    pub jobs: Arc<JobManager>,
    pub output_dir: TempDir,
}

impl TestApp {
    pub fn new(max_queue_size: usize) -> Self {
        let output_dir = tempfile::tempdir().unwrap();
        let config = test_config(output_dir.path(), max_queue_size);
        let jobs = Arc::new(JobManager::new(
            Arc::new(StubEngine),
            config.manager_settings(),
        ));
        let state = AppState {
            config: Arc::new(config.clone()),
            jobs: Arc::clone(&jobs),
        };
        let app = build_app_router(state, &config);
        Self {
            app,
            jobs,
            output_dir,
        }
    }

    /// Start the worker and wait for every admitted job to finish.
    pub async fn run_queue(&self) {
        self.jobs.start().await;
        tokio::time::timeout(std::time::Duration::from_secs(5), self.jobs.queue().join())
            .await
            .expect("queue did not drain");
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(
        app,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
    )
    .await
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

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
