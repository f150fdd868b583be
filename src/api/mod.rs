//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{routing::get, Router};

use crate::AppState;

mod alerts;
mod evaluate;
mod health;
mod metrics;
mod rules;

pub use health::*;

/// Create the full API router, mounted under `/api/v1` by the server
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Evaluation endpoints
        .merge(evaluate::routes())
        // Alert rule management
        .merge(rules::routes())
        // Alert listing and lifecycle
        .merge(alerts::routes())
        // KPI metric ingestion
        .merge(metrics::routes())
}
