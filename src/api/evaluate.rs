//! KPI evaluation endpoints
//!
//! The POST endpoint carries a fixed response contract consumed by
//! existing dashboard clients: a 400 with `{"error": ...}` when the
//! tenant is missing, `{"success": true, "alerts": [...]}` on success
//! and `{"error": ..., "details": ...}` on failure. Keep the shapes
//! stable.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::db::EvaluationRunRepository;
use crate::models::{Alert, EvaluationRun};
use crate::services::EvaluationService;
use crate::utils::AppError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/evaluate", post(run_evaluation))
        .route("/evaluate/runs", get(list_evaluation_runs))
}

/// Request body for an evaluation pass
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Successful evaluation response
#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub success: bool,
    pub alerts: Vec<Alert>,
}

/// POST /evaluate
///
/// Runs one evaluation pass for the tenant named in the request body.
/// A missing, null or blank tenant_id is a 400; an unreadable body is
/// treated the same way rather than surfacing a parser error.
pub async fn run_evaluation(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Response {
    let tenant_id = payload
        .ok()
        .and_then(|Json(req)| req.tenant_id)
        .map(|tenant| tenant.trim().to_string())
        .filter(|tenant| !tenant.is_empty());

    let Some(tenant_id) = tenant_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "tenant_id is required in the request body"})),
        )
            .into_response();
    };

    let service = EvaluationService::new(state.db.clone(), &state.config.evaluator);
    match service.evaluate_tenant(&tenant_id).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(EvaluateResponse {
                success: true,
                alerts: summary.alerts,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("KPI alert evaluation failed for tenant {}: {}", tenant_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to process KPI alerts",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Query parameters for listing evaluation runs
#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub tenant_id: Option<String>,
    pub limit: Option<i64>,
}

/// GET /evaluate/runs
///
/// Lists recent evaluation runs for a tenant, newest first.
pub async fn list_evaluation_runs(
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Vec<EvaluationRun>>, AppError> {
    let tenant_id = query
        .tenant_id
        .as_deref()
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .ok_or_else(|| AppError::BadRequest("tenant_id query parameter is required".to_string()))?;

    let limit = query.limit.unwrap_or(20).clamp(1, 500);

    let repo = EvaluationRunRepository::new(&state.db);
    let runs = repo.list_by_tenant(tenant_id, limit).await?;

    Ok(Json(runs))
}
