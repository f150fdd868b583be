//! KPI metric ingestion and lookup endpoints
//!
//! Both stores are append-only. Snapshots feed the "current value" side
//! of rule evaluation; history entries feed the comparison side.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::{KpiHistoryRepository, KpiSnapshotRepository};
use crate::models::{MetricHistoryEntry, MetricSnapshot, RecordMetricRequest};
use crate::utils::validation::{validate_kpi_name, validate_tenant_id};
use crate::utils::AppError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics/snapshots", post(record_snapshot))
        .route("/metrics/history", post(record_history))
        .route("/metrics/latest", get(latest_snapshot))
}

/// POST /metrics/snapshots
pub async fn record_snapshot(
    State(state): State<AppState>,
    payload: Result<Json<RecordMetricRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MetricSnapshot>), AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    validate_record_request(&req)?;

    let recorded_at = req.recorded_at.unwrap_or_else(Utc::now);
    let repo = KpiSnapshotRepository::new(&state.db);
    let snapshot = repo
        .insert(&req.tenant_id, &req.kpi_name, &req.value, recorded_at)
        .await?;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// POST /metrics/history
pub async fn record_history(
    State(state): State<AppState>,
    payload: Result<Json<RecordMetricRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MetricHistoryEntry>), AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    validate_record_request(&req)?;

    let recorded_at = req.recorded_at.unwrap_or_else(Utc::now);
    let repo = KpiHistoryRepository::new(&state.db);
    let entry = repo
        .insert(&req.tenant_id, &req.kpi_name, &req.value, recorded_at)
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Query parameters for the latest snapshot lookup
#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub tenant_id: Option<String>,
    pub kpi_name: Option<String>,
}

/// GET /metrics/latest
pub async fn latest_snapshot(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<MetricSnapshot>, AppError> {
    let tenant_id = query
        .tenant_id
        .as_deref()
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .ok_or_else(|| AppError::BadRequest("tenant_id query parameter is required".to_string()))?;
    let kpi_name = query
        .kpi_name
        .as_deref()
        .map(str::trim)
        .filter(|kpi| !kpi.is_empty())
        .ok_or_else(|| AppError::BadRequest("kpi_name query parameter is required".to_string()))?;

    let repo = KpiSnapshotRepository::new(&state.db);
    let snapshot = repo.latest(tenant_id, kpi_name).await?.ok_or_else(|| {
        AppError::NotFound(format!("No snapshot recorded for KPI '{}'", kpi_name))
    })?;

    Ok(Json(snapshot))
}

fn validate_record_request(req: &RecordMetricRequest) -> Result<(), AppError> {
    if !validate_tenant_id(req.tenant_id.trim()) {
        return Err(AppError::BadRequest("tenant_id is required".to_string()));
    }
    if !validate_kpi_name(&req.kpi_name) {
        return Err(AppError::BadRequest(format!(
            "Invalid KPI name '{}'",
            req.kpi_name
        )));
    }
    Ok(())
}
