//! Evaluation run log models
//!
//! Every evaluator invocation writes exactly one run row, successful or
//! not, so operators can see what each pass did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome status of an evaluation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One row per evaluator invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: Uuid,
    pub tenant_id: String,
    pub status: RunStatus,
    pub rules_processed: i64,
    pub alerts_created: i64,
    pub rules_failed: i64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// New run-log payload
#[derive(Debug, Clone)]
pub struct NewEvaluationRun {
    pub tenant_id: String,
    pub status: RunStatus,
    pub rules_processed: i64,
    pub alerts_created: i64,
    pub rules_failed: i64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl NewEvaluationRun {
    pub fn completed(
        tenant_id: &str,
        rules_processed: i64,
        alerts_created: i64,
        rules_failed: i64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            status: RunStatus::Completed,
            rules_processed,
            alerts_created,
            rules_failed,
            error: None,
            started_at,
        }
    }

    pub fn failed(tenant_id: &str, error: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            status: RunStatus::Failed,
            rules_processed: 0,
            alerts_created: 0,
            rules_failed: 0,
            error: Some(error.to_string()),
            started_at,
        }
    }
}
