//! Alert listing and lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::AlertRepository;
use crate::models::{Alert, AlertStats, AlertStatus};
use crate::utils::AppError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/stats", get(alert_stats))
        .route("/alerts/{id}", get(get_alert))
        .route("/alerts/{id}/acknowledge", post(acknowledge_alert))
        .route("/alerts/{id}/resolve", post(resolve_alert))
}

/// Query parameters for listing alerts
#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    pub tenant_id: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub limit: Option<i64>,
}

/// GET /alerts
///
/// Lists a tenant's alerts, newest first, optionally filtered by status
/// and severity.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let tenant_id = required_tenant(query.tenant_id.as_deref())?;

    let status = query
        .status
        .as_deref()
        .map(|status| {
            AlertStatus::from_str(status)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown alert status '{}'", status)))
        })
        .transpose()?;

    let limit = query.limit.unwrap_or(50).clamp(1, 1000);

    let repo = AlertRepository::new(&state.db);
    let alerts = repo
        .list(tenant_id, status, query.severity.as_deref(), limit)
        .await?;

    Ok(Json(alerts))
}

/// GET /alerts/stats
pub async fn alert_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AlertStats>, AppError> {
    let tenant_id = required_tenant(query.tenant_id.as_deref())?;

    let repo = AlertRepository::new(&state.db);
    let stats = repo.stats(tenant_id).await?;

    Ok(Json(stats))
}

/// Query parameters for alert stats
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub tenant_id: Option<String>,
}

/// GET /alerts/{id}
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, AppError> {
    let repo = AlertRepository::new(&state.db);
    let alert = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))?;

    Ok(Json(alert))
}

/// POST /alerts/{id}/acknowledge
///
/// Idempotent: acknowledging an alert that already left the triggered
/// state returns it unchanged.
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, AppError> {
    let repo = AlertRepository::new(&state.db);
    let alert = repo
        .acknowledge(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))?;

    Ok(Json(alert))
}

/// POST /alerts/{id}/resolve
///
/// Idempotent: resolving an already resolved alert returns it unchanged.
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, AppError> {
    let repo = AlertRepository::new(&state.db);
    let alert = repo
        .resolve(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))?;

    Ok(Json(alert))
}

fn required_tenant(tenant_id: Option<&str>) -> Result<&str, AppError> {
    tenant_id
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .ok_or_else(|| AppError::BadRequest("tenant_id query parameter is required".to_string()))
}
