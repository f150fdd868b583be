//! Integration tests for the KPI alert evaluation endpoint
//!
//! These tests drive the full evaluation flow through the API: seed
//! rules and metric values, run a pass, then check the created alerts
//! and the run log.

use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;
use kpiwatch::models::{Alert, AlertCondition, AlertStatus, CompareWindow, EvaluationRun, RunStatus};

async fn list_runs(app: &TestApp, tenant_id: &str) -> Vec<EvaluationRun> {
    let response = app
        .get(&format!("/api/v1/evaluate/runs?tenant_id={}", tenant_id))
        .await;
    response.assert_ok();
    response.json()
}

// ---------------------------------------------------------------------------
// Request contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_evaluate_without_tenant_id_returns_400() {
    let app = TestApp::new().await;

    let response = app.post_json("/api/v1/evaluate", json!({})).await;

    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        json!({"error": "tenant_id is required in the request body"})
    );
}

#[tokio::test]
async fn test_evaluate_with_null_tenant_id_returns_400() {
    let app = TestApp::new().await;

    let response = app
        .post_json("/api/v1/evaluate", json!({"tenant_id": null}))
        .await;

    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "tenant_id is required in the request body");
}

#[tokio::test]
async fn test_evaluate_with_blank_tenant_id_returns_400() {
    let app = TestApp::new().await;

    let response = app
        .post_json("/api/v1/evaluate", json!({"tenant_id": "   "}))
        .await;

    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "tenant_id is required in the request body");
}

#[tokio::test]
async fn test_evaluate_with_invalid_json_returns_400() {
    let app = TestApp::new().await;

    let response = app.post_raw("/api/v1/evaluate", "{not json").await;

    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "tenant_id is required in the request body");
}

#[tokio::test]
async fn test_evaluate_with_empty_body_returns_400() {
    let app = TestApp::new().await;

    let response = app.post_empty("/api/v1/evaluate").await;

    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "tenant_id is required in the request body");
}

#[tokio::test]
async fn test_evaluate_unknown_tenant_succeeds_with_no_alerts() {
    let app = TestApp::new().await;

    let response = evaluate(&app, "no-such-tenant").await;

    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["alerts"], json!([]));

    // Even an empty pass writes a run row
    let runs = list_runs(&app, "no-such-tenant").await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].rules_processed, 0);
    assert_eq!(runs[0].alerts_created, 0);
}

#[tokio::test]
async fn test_evaluate_failure_returns_500_with_details() {
    let app = TestApp::new().await;

    // Break rule loading out from under the evaluator
    sqlx::query("DROP TABLE alert_rules")
        .execute(&app.state.db)
        .await
        .unwrap();

    let response = evaluate(&app, "acme").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Failed to process KPI alerts");
    assert!(body["details"].is_string());

    // The failure itself is recorded in the run log
    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].error.is_some());
}

// ---------------------------------------------------------------------------
// Threshold conditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_above_condition_triggers_alert() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    let rule = create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .build_json(),
    )
    .await;

    record_snapshot(&app, "acme", "error_rate", 150.0).await;
    record_history_days_ago(&app, "acme", "error_rate", 140.0, 8).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_id, Some(rule.id));
    assert_eq!(alerts[0].condition, "above");
    assert_eq!(alerts[0].current_value, 150.0);
    assert_eq!(alerts[0].previous_value, 140.0);
}

#[tokio::test]
async fn test_above_condition_is_strict_at_threshold() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .build_json(),
    )
    .await;

    // Exactly at the threshold must not fire
    record_snapshot(&app, "acme", "error_rate", 100.0).await;
    record_history_days_ago(&app, "acme", "error_rate", 90.0, 8).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn test_below_condition_triggers_and_is_strict() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("uptime")
            .with_condition(AlertCondition::Below)
            .with_threshold(50.0)
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "uptime", 60.0, 8).await;

    // Exactly at the threshold must not fire
    record_snapshot(&app, "acme", "uptime", 50.0).await;
    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());

    // Strictly under fires; the newest snapshot wins
    record_snapshot(&app, "acme", "uptime", 49.9).await;
    let alerts = evaluate_ok(&app, "acme").await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].current_value, 49.9);
}

#[tokio::test]
async fn test_falls_by_percent_triggers_on_drop_beyond_threshold() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("conversion_rate")
            .with_condition(AlertCondition::FallsByPercent)
            .with_threshold(10.0)
            .build_json(),
    )
    .await;

    // 200 -> 170 is a 15% drop, beyond the 10% threshold
    record_history_days_ago(&app, "acme", "conversion_rate", 200.0, 8).await;
    record_snapshot(&app, "acme", "conversion_rate", 170.0).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].percent_change, -15.0);
    assert_eq!(alerts[0].previous_value, 200.0);
}

#[tokio::test]
async fn test_falls_by_percent_is_strict_at_exact_drop() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("conversion_rate")
            .with_condition(AlertCondition::FallsByPercent)
            .with_threshold(25.0)
            .build_json(),
    )
    .await;

    // 200 -> 150 is exactly a 25% drop, which must not fire
    record_history_days_ago(&app, "acme", "conversion_rate", 200.0, 8).await;
    record_snapshot(&app, "acme", "conversion_rate", 150.0).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn test_rises_by_percent_triggers_on_rise_beyond_threshold() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("bounce_rate")
            .with_condition(AlertCondition::RisesByPercent)
            .with_threshold(10.0)
            .build_json(),
    )
    .await;

    // 200 -> 230 is a 15% rise
    record_history_days_ago(&app, "acme", "bounce_rate", 200.0, 8).await;
    record_snapshot(&app, "acme", "bounce_rate", 230.0).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].percent_change, 15.0);
}

#[tokio::test]
async fn test_zero_baseline_never_fires_percent_conditions() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("signups")
            .with_condition(AlertCondition::RisesByPercent)
            .with_threshold(1.0)
            .build_json(),
    )
    .await;
    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("signups")
            .with_condition(AlertCondition::FallsByPercent)
            .with_threshold(1.0)
            .build_json(),
    )
    .await;

    // A zero baseline resolves to a 0% change, never infinity
    record_history_days_ago(&app, "acme", "signups", 0.0, 8).await;
    record_snapshot(&app, "acme", "signups", 500.0).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());

    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs[0].rules_processed, 2);
    assert_eq!(runs[0].rules_failed, 0);
}

#[tokio::test]
async fn test_legacy_comparison_alias_creates_above_rule() {
    let app = TestApp::new().await;

    // Rules created by older clients still arrive with ">" / "<"
    let rule = create_rule(
        &app,
        json!({
            "tenant_id": "acme",
            "kpi_name": "error_rate",
            "condition": ">",
            "threshold": 100.0,
        }),
    )
    .await;

    assert_eq!(rule.condition, AlertCondition::Above);

    record_snapshot(&app, "acme", "error_rate", 150.0).await;
    record_history_days_ago(&app, "acme", "error_rate", 140.0, 8).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].condition, "above");
}

// ---------------------------------------------------------------------------
// Missing and unusable data
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rule_without_snapshot_is_skipped() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory.create().with_tenant("acme").with_kpi("orphan_kpi").build_json(),
    )
    .await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());

    // Skipped, not failed
    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs[0].rules_processed, 1);
    assert_eq!(runs[0].alerts_created, 0);
    assert_eq!(runs[0].rules_failed, 0);
}

#[tokio::test]
async fn test_rule_without_history_is_skipped() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("revenue")
            .with_condition(AlertCondition::Above)
            .with_threshold(10.0)
            .build_json(),
    )
    .await;

    // Current value alone is not enough to evaluate
    record_snapshot(&app, "acme", "revenue", 500.0).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());

    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs[0].rules_processed, 1);
    assert_eq!(runs[0].rules_failed, 0);
}

#[tokio::test]
async fn test_history_newer_than_window_is_not_used() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("revenue")
            .with_condition(AlertCondition::FallsByPercent)
            .with_threshold(10.0)
            .with_window(CompareWindow::Week)
            .build_json(),
    )
    .await;

    // Only history from 6 days ago exists; the week window needs a value
    // more than 7 days old
    record_history_days_ago(&app, "acme", "revenue", 200.0, 6).await;
    record_snapshot(&app, "acme", "revenue", 100.0).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn test_history_picks_latest_value_within_window() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("revenue")
            .with_condition(AlertCondition::FallsByPercent)
            .with_threshold(10.0)
            .with_window(CompareWindow::Week)
            .build_json(),
    )
    .await;

    // Two candidates before the cutoff; the most recent one is the
    // comparison baseline
    record_history_days_ago(&app, "acme", "revenue", 100.0, 30).await;
    record_history_days_ago(&app, "acme", "revenue", 200.0, 8).await;
    record_snapshot(&app, "acme", "revenue", 170.0).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].previous_value, 200.0);
    assert_eq!(alerts[0].percent_change, -15.0);
}

#[tokio::test]
async fn test_non_numeric_snapshot_is_skipped() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("status_text")
            .with_condition(AlertCondition::Above)
            .with_threshold(1.0)
            .build_json(),
    )
    .await;

    // Ingestion accepts free-form strings; evaluation skips the ones that
    // do not parse as numbers
    app.post_json(
        "/api/v1/metrics/snapshots",
        json!({"tenant_id": "acme", "kpi_name": "status_text", "value": "degraded"}),
    )
    .await
    .assert_created();
    record_history_days_ago(&app, "acme", "status_text", 1.0, 8).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());

    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs[0].rules_failed, 0);
}

#[tokio::test]
async fn test_unknown_stored_condition_counts_as_failed_rule() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    let rule = create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("revenue")
            .with_condition(AlertCondition::Above)
            .with_threshold(10.0)
            .build_json(),
    )
    .await;

    // Simulate a row written with a condition this version does not know
    corrupt_rule_condition(&app, rule.id, "equals").await;

    record_snapshot(&app, "acme", "revenue", 500.0).await;
    record_history_days_ago(&app, "acme", "revenue", 400.0, 8).await;

    // The pass still completes; the broken rule is counted, not fatal
    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());

    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].rules_processed, 1);
    assert_eq!(runs[0].rules_failed, 1);
}

// ---------------------------------------------------------------------------
// Alert contents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_custom_message_template_rendering() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .with_message("{{value}} exceeded {{threshold}} (was {{previousValue}}, {{percentChange}}% change)")
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "error_rate", 120.0, 8).await;
    record_snapshot(&app, "acme", "error_rate", 150.0).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].message, "150 exceeded 100 (was 120, 25% change)");
    // The description keeps the default sentence
    assert_eq!(
        alerts[0].description,
        "error_rate is 150, above the threshold of 100"
    );
}

#[tokio::test]
async fn test_template_substitutes_first_occurrence_only() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .with_message("{{value}} and {{value}}")
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "error_rate", 120.0, 8).await;
    record_snapshot(&app, "acme", "error_rate", 150.0).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].message, "150 and {{value}}");
}

#[tokio::test]
async fn test_default_message_used_without_template() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("conversion_rate")
            .with_condition(AlertCondition::FallsByPercent)
            .with_threshold(10.0)
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "conversion_rate", 200.0, 8).await;
    record_snapshot(&app, "acme", "conversion_rate", 170.0).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(
        alerts[0].message,
        "conversion_rate fell 15% over the past week, more than the allowed 10% drop"
    );
    assert_eq!(alerts[0].message, alerts[0].description);
}

#[tokio::test]
async fn test_alert_copies_rule_fields() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    let rule = create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .with_severity("critical")
            .with_campaign("summer-launch")
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "error_rate", 120.0, 8).await;
    record_snapshot(&app, "acme", "error_rate", 150.0).await;

    let alerts = evaluate_ok(&app, "acme").await;

    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.tenant_id, "acme");
    assert_eq!(alert.rule_id, Some(rule.id));
    assert_eq!(alert.kpi_name, "error_rate");
    assert_eq!(alert.severity, "critical");
    assert_eq!(alert.threshold, 100.0);
    assert_eq!(alert.campaign_id.as_deref(), Some("summer-launch"));
    assert_eq!(alert.status, AlertStatus::Triggered);
    assert_eq!(alert.current_value, 150.0);
    assert_eq!(alert.previous_value, 120.0);
    assert_eq!(alert.percent_change, 25.0);
}

// ---------------------------------------------------------------------------
// Pass semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_inactive_rules_are_not_evaluated() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    // This rule would fire if it were active
    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(10.0)
            .inactive()
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "error_rate", 120.0, 8).await;
    record_snapshot(&app, "acme", "error_rate", 150.0).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert!(alerts.is_empty());

    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs[0].rules_processed, 0);
}

#[tokio::test]
async fn test_pass_summary_counts_rules_and_alerts() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    // Two active rules on the same KPI, one firing, plus an inactive one
    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .build_json(),
    )
    .await;
    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(1000.0)
            .build_json(),
    )
    .await;
    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(1.0)
            .inactive()
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "error_rate", 120.0, 8).await;
    record_snapshot(&app, "acme", "error_rate", 150.0).await;

    let alerts = evaluate_ok(&app, "acme").await;
    assert_eq!(alerts.len(), 1);

    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].rules_processed, 2);
    assert_eq!(runs[0].alerts_created, 1);
    assert_eq!(runs[0].rules_failed, 0);
}

#[tokio::test]
async fn test_repeated_passes_create_duplicate_alerts() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .build_json(),
    )
    .await;

    record_history_days_ago(&app, "acme", "error_rate", 120.0, 8).await;
    record_snapshot(&app, "acme", "error_rate", 150.0).await;

    // There is no deduplication across passes; a still-breached rule
    // fires every time
    let first = evaluate_ok(&app, "acme").await;
    let second = evaluate_ok(&app, "acme").await;
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].id, second[0].id);

    let response = app.get("/api/v1/alerts?tenant_id=acme").await;
    response.assert_ok();
    let alerts: Vec<Alert> = response.json();
    assert_eq!(alerts.len(), 2);

    // And each pass wrote its own run row
    let runs = list_runs(&app, "acme").await;
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn test_tenants_are_evaluated_in_isolation() {
    let app = TestApp::new().await;
    let factory = RuleFactory::new();

    create_rule(
        &app,
        factory
            .create()
            .with_tenant("acme")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .build_json(),
    )
    .await;
    create_rule(
        &app,
        factory
            .create()
            .with_tenant("globex")
            .with_kpi("error_rate")
            .with_condition(AlertCondition::Above)
            .with_threshold(100.0)
            .build_json(),
    )
    .await;

    // Only acme has data that breaches its rule
    record_history_days_ago(&app, "acme", "error_rate", 120.0, 8).await;
    record_snapshot(&app, "acme", "error_rate", 150.0).await;

    let globex_alerts = evaluate_ok(&app, "globex").await;
    assert!(globex_alerts.is_empty());

    let acme_alerts = evaluate_ok(&app, "acme").await;
    assert_eq!(acme_alerts.len(), 1);
    assert_eq!(acme_alerts[0].tenant_id, "acme");

    // Run logs are also per tenant
    let acme_runs = list_runs(&app, "acme").await;
    let globex_runs = list_runs(&app, "globex").await;
    assert_eq!(acme_runs.len(), 1);
    assert_eq!(globex_runs.len(), 1);
    assert_eq!(globex_runs[0].rules_processed, 1);
    assert_eq!(globex_runs[0].alerts_created, 0);
}
