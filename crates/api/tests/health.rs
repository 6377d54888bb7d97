//! Integration tests for the health endpoints and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_bytes, body_json, get, send, TestApp};

#[tokio::test]
async fn health_reports_degraded_before_worker_starts() {
    let test = TestApp::new(4);
    let response = get(&test.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["worker_running"], false);
    assert_eq!(json["queued"], 0);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn health_reports_ok_with_worker_and_counts_queue() {
    let test = TestApp::new(4);
    test.jobs
        .submit(melody_core::job::JobRequest {
            prompt: "queued before start".into(),
            duration_s: 1.0,
            gain_db: 0.0,
            format: Default::default(),
        })
        .await
        .unwrap();

    let json = body_json(get(&test.app, "/health").await).await;
    assert_eq!(json["queued"], 1);

    test.run_queue().await;
    let json = body_json(get(&test.app, "/health").await).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["worker_running"], true);
    assert_eq!(json["queued"], 0);
    test.jobs.stop().await;
}

#[tokio::test]
async fn ping_returns_pong() {
    let test = TestApp::new(1);
    let response = get(&test.app, "/ping").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"pong\n");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let test = TestApp::new(1);
    let response = get(&test.app, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let test = TestApp::new(1);
    let response = get(&test.app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let test = TestApp::new(1);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/jobs")
        .header("Origin", "http://example.test")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = send(&test.app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}
