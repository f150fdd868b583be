//! API integration tests
//!
//! Tests the API surface: health probes, CORS behavior, metric
//! ingestion and run-log queries.

use serde_json::json;

use crate::common::*;
use kpiwatch::models::{EvaluationRun, MetricSnapshot};

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_endpoint() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/detailed").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert!(json.get("status").is_some());
    assert!(json.get("components").is_some());
    assert!(json["components"].get("database").is_some());
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/live").await;

    response.assert_ok();
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/ready").await;

    response.assert_ok();
}

#[tokio::test]
async fn test_not_found_returns_404() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/nonexistent").await;

    response.assert_not_found();
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let app = TestApp::new().await;

    let response = app.options("/api/v1/evaluate").await;

    response.assert_ok();
    assert_eq!(
        response
            .headers
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap()),
        Some("*")
    );
    assert!(response.headers.contains_key("access-control-allow-methods"));
}

#[tokio::test]
async fn test_cors_headers_present_on_regular_responses() {
    let app = TestApp::new().await;

    let response = app
        .post_json("/api/v1/evaluate", json!({"tenant_id": "acme"}))
        .await;

    response.assert_ok();
    assert_eq!(
        response
            .headers
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap()),
        Some("*")
    );
}

// ---------------------------------------------------------------------------
// Metric ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_record_snapshot_accepts_numeric_value() {
    let app = TestApp::new().await;
    let factory = MetricFactory::new();

    let payload = factory
        .create()
        .with_tenant("acme")
        .with_kpi("revenue")
        .with_value(1250.5)
        .build_json();
    let response = app.post_json("/api/v1/metrics/snapshots", payload).await;

    response.assert_created();
    let snapshot: MetricSnapshot = response.json();
    assert_eq!(snapshot.tenant_id, "acme");
    assert_eq!(snapshot.kpi_name, "revenue");
    assert_eq!(snapshot.value, "1250.5");
}

#[tokio::test]
async fn test_record_snapshot_accepts_string_value() {
    let app = TestApp::new().await;
    let factory = MetricFactory::new();

    let payload = factory
        .create()
        .with_tenant("acme")
        .with_kpi("revenue")
        .with_text_value("1250.5")
        .build_json();
    let response = app.post_json("/api/v1/metrics/snapshots", payload).await;

    response.assert_created();
    let snapshot: MetricSnapshot = response.json();
    assert_eq!(snapshot.value, "1250.5");
}

#[tokio::test]
async fn test_record_snapshot_rejects_invalid_kpi_name() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/metrics/snapshots",
            json!({"tenant_id": "acme", "kpi_name": "!!bad!!", "value": 1}),
        )
        .await;

    response.assert_bad_request();
}

#[tokio::test]
async fn test_record_history_with_explicit_timestamp() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/metrics/history",
            json!({
                "tenant_id": "acme",
                "kpi_name": "revenue",
                "value": 900,
                "recorded_at": "2026-08-01T00:00:00Z",
            }),
        )
        .await;

    response.assert_created();
    let entry: serde_json::Value = response.json();
    assert_eq!(entry["value"], "900");
    assert!(entry["recorded_at"]
        .as_str()
        .unwrap()
        .starts_with("2026-08-01"));
}

#[tokio::test]
async fn test_latest_snapshot_returns_most_recent_value() {
    let app = TestApp::new().await;

    record_snapshot(&app, "acme", "revenue", 100.0).await;
    record_snapshot(&app, "acme", "revenue", 250.0).await;

    let response = app
        .get("/api/v1/metrics/latest?tenant_id=acme&kpi_name=revenue")
        .await;

    response.assert_ok();
    let snapshot: MetricSnapshot = response.json();
    // JSON numbers are stored in their serialized form
    assert_eq!(snapshot.value, "250.0");
}

#[tokio::test]
async fn test_latest_snapshot_unknown_kpi_returns_404() {
    let app = TestApp::new().await;

    let response = app
        .get("/api/v1/metrics/latest?tenant_id=acme&kpi_name=revenue")
        .await;

    response.assert_not_found();
}

#[tokio::test]
async fn test_latest_snapshot_requires_query_parameters() {
    let app = TestApp::new().await;

    app.get("/api/v1/metrics/latest?kpi_name=revenue")
        .await
        .assert_bad_request();
    app.get("/api/v1/metrics/latest?tenant_id=acme")
        .await
        .assert_bad_request();
}

// ---------------------------------------------------------------------------
// Run log queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_runs_requires_tenant_id() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/evaluate/runs").await;

    response.assert_bad_request();
}

#[tokio::test]
async fn test_list_runs_newest_first() {
    let app = TestApp::new().await;

    evaluate(&app, "acme").await.assert_ok();
    evaluate(&app, "acme").await.assert_ok();

    let response = app.get("/api/v1/evaluate/runs?tenant_id=acme").await;

    response.assert_ok();
    let runs: Vec<EvaluationRun> = response.json();
    assert_eq!(runs.len(), 2);
    assert!(runs[0].started_at >= runs[1].started_at);
}

#[tokio::test]
async fn test_list_runs_respects_limit() {
    let app = TestApp::new().await;

    evaluate(&app, "acme").await.assert_ok();
    evaluate(&app, "acme").await.assert_ok();
    evaluate(&app, "acme").await.assert_ok();

    let response = app
        .get("/api/v1/evaluate/runs?tenant_id=acme&limit=2")
        .await;

    response.assert_ok();
    let runs: Vec<EvaluationRun> = response.json();
    assert_eq!(runs.len(), 2);
}
