//! Alert rule management endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::AlertRuleRepository;
use crate::models::{AlertRule, CreateAlertRuleRequest, UpdateAlertRuleRequest};
use crate::utils::validation::{validate_kpi_name, validate_severity, validate_tenant_id};
use crate::utils::AppError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rules", get(list_rules).post(create_rule))
        .route(
            "/rules/{id}",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
}

/// Query parameters for listing rules
#[derive(Debug, Deserialize)]
pub struct ListRulesQuery {
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// GET /rules
///
/// Lists a tenant's rules, active only by default.
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<ListRulesQuery>,
) -> Result<Json<Vec<AlertRule>>, AppError> {
    let tenant_id = query
        .tenant_id
        .as_deref()
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .ok_or_else(|| AppError::BadRequest("tenant_id query parameter is required".to_string()))?;

    let repo = AlertRuleRepository::new(&state.db);
    let rules = repo.list_by_tenant(tenant_id, query.include_inactive).await?;

    Ok(Json(rules))
}

/// POST /rules
pub async fn create_rule(
    State(state): State<AppState>,
    payload: Result<Json<CreateAlertRuleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AlertRule>), AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    validate_create_request(&req)?;

    let repo = AlertRuleRepository::new(&state.db);
    let rule = repo.create(&req).await?;

    Ok((StatusCode::CREATED, Json(rule)))
}

/// GET /rules/{id}
pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AlertRule>, AppError> {
    let repo = AlertRuleRepository::new(&state.db);
    let rule = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert rule {} not found", id)))?;

    Ok(Json(rule))
}

/// PUT /rules/{id}
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateAlertRuleRequest>, JsonRejection>,
) -> Result<Json<AlertRule>, AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    validate_update_request(&req)?;

    let repo = AlertRuleRepository::new(&state.db);
    let rule = repo
        .update(id, &req)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert rule {} not found", id)))?;

    Ok(Json(rule))
}

/// DELETE /rules/{id}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let repo = AlertRuleRepository::new(&state.db);
    let deleted = repo.delete(id).await?;

    if !deleted {
        return Err(AppError::NotFound(format!("Alert rule {} not found", id)));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn validate_create_request(req: &CreateAlertRuleRequest) -> Result<(), AppError> {
    if !validate_tenant_id(req.tenant_id.trim()) {
        return Err(AppError::BadRequest("tenant_id is required".to_string()));
    }
    if !validate_kpi_name(&req.kpi_name) {
        return Err(AppError::BadRequest(format!(
            "Invalid KPI name '{}'",
            req.kpi_name
        )));
    }
    if !req.threshold.is_finite() {
        return Err(AppError::BadRequest("threshold must be a finite number".to_string()));
    }
    if !validate_severity(&req.severity) {
        return Err(AppError::BadRequest(format!(
            "Invalid severity '{}'",
            req.severity
        )));
    }
    Ok(())
}

fn validate_update_request(req: &UpdateAlertRuleRequest) -> Result<(), AppError> {
    if let Some(kpi_name) = &req.kpi_name {
        if !validate_kpi_name(kpi_name) {
            return Err(AppError::BadRequest(format!("Invalid KPI name '{}'", kpi_name)));
        }
    }
    if let Some(threshold) = req.threshold {
        if !threshold.is_finite() {
            return Err(AppError::BadRequest("threshold must be a finite number".to_string()));
        }
    }
    if let Some(severity) = &req.severity {
        if !validate_severity(severity) {
            return Err(AppError::BadRequest(format!("Invalid severity '{}'", severity)));
        }
    }
    Ok(())
}
