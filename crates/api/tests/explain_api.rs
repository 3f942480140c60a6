//! Integration tests for job submission, snapshots and cancellation.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, default_scores, default_test_app, get, png_bytes, post_empty,
    post_multipart, read_stream, submit, wait_for, FixedClassifier, StalledClassifier,
};
use xplain_pipeline::SampledExplainer;

fn stalled_app() -> common::TestApp {
    build_test_app(
        Arc::new(StalledClassifier),
        Arc::new(SampledExplainer::default()),
    )
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_before_the_job_finishes() {
    let app = stalled_app();

    let job_id = submit(app.router.clone(), &png_bytes()).await;

    let snapshot = app.registry.get(&job_id.parse().unwrap()).unwrap();
    assert_eq!(snapshot.progress, 0);
    assert!(snapshot.result.is_none());
    assert!(!snapshot.is_terminal());
}

#[tokio::test]
async fn every_submission_gets_a_fresh_id() {
    let app = stalled_app();
    let bytes = png_bytes();

    let mut ids = HashSet::new();
    for _ in 0..5 {
        ids.insert(submit(app.router.clone(), &bytes).await);
    }

    assert_eq!(ids.len(), 5);
    assert_eq!(app.registry.len(), 5);
    assert!(ids.iter().all(|id| id.len() == 32));
}

#[tokio::test]
async fn submit_without_file_field_is_rejected() {
    let app = default_test_app();

    let response = post_multipart(app.router.clone(), "/api/v1/explain", "notes", b"hello").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "No file provided");
    assert!(app.registry.is_empty());
}

#[tokio::test]
async fn submit_with_non_image_is_rejected() {
    let app = default_test_app();

    let response =
        post_multipart(app.router.clone(), "/api/v1/explain", "file", b"definitely not an image").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(app.registry.is_empty());
}

#[tokio::test]
async fn submit_with_empty_file_is_rejected() {
    let app = default_test_app();

    let response = post_multipart(app.router.clone(), "/api/v1/explain", "file", b"").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.registry.is_empty());
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_reports_finished_job_without_retiring_it() {
    let app = build_test_app(
        Arc::new(FixedClassifier::new(default_scores())),
        Arc::new(SampledExplainer::new(4).with_seed(5)),
    );
    let job_id = submit(app.router.clone(), &png_bytes()).await;
    wait_for(&app.registry, &job_id, |s| s.is_terminal()).await;

    for _ in 0..2 {
        let response = get(app.router.clone(), &format!("/api/v1/explain/{job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["progress"], 100);
        assert_eq!(json["data"]["result"], format!("{job_id}_explained.jpg"));
    }

    assert_eq!(app.registry.len(), 1);
}

#[tokio::test]
async fn snapshot_of_unknown_or_malformed_job_is_404() {
    let app = default_test_app();

    let unknown = get(
        app.router.clone(),
        "/api/v1/explain/0123456789abcdef0123456789abcdef",
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let malformed = get(app.router.clone(), "/api/v1/explain/not-a-job").await;
    assert_eq!(malformed.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_ends_the_job_as_cancelled() {
    let app = stalled_app();
    let job_id = submit(app.router.clone(), &png_bytes()).await;

    let response = post_empty(app.router.clone(), &format!("/api/v1/explain/{job_id}/cancel")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let events = read_stream(app.router.clone(), &job_id).await;
    let last = events.last().unwrap();
    assert_eq!(last["progress"], 100);
    assert!(last["result"].is_null());
    assert_eq!(last["error"], "cancelled");
}

#[tokio::test]
async fn cancel_unknown_job_is_404() {
    let app = default_test_app();

    let response = post_empty(
        app.router.clone(),
        "/api/v1/explain/0123456789abcdef0123456789abcdef/cancel",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_finished_job_is_conflict() {
    let app = build_test_app(
        Arc::new(FixedClassifier::new(default_scores())),
        Arc::new(SampledExplainer::new(4).with_seed(5)),
    );
    let job_id = submit(app.router.clone(), &png_bytes()).await;
    wait_for(&app.registry, &job_id, |s| s.is_terminal()).await;

    let response = post_empty(app.router.clone(), &format!("/api/v1/explain/{job_id}/cancel")).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let snapshot = app.registry.get(&job_id.parse().unwrap()).unwrap();
    assert!(snapshot.result.is_some());
}
