//! Alert models
//!
//! Alerts are created by the evaluator when a rule's condition is met.
//! The evaluator never mutates them afterwards; the lifecycle endpoints
//! move them through acknowledged/resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AlertCondition;

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Triggered => "triggered",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "triggered" => Some(AlertStatus::Triggered),
            "acknowledged" => Some(AlertStatus::Acknowledged),
            "resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }
}

impl Default for AlertStatus {
    fn default() -> Self {
        AlertStatus::Triggered
    }
}

/// Alert generated by a rule evaluation
///
/// Severity and condition are denormalized display copies of the rule
/// fields at the time the alert fired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub tenant_id: String,
    pub rule_id: Option<Uuid>,
    pub kpi_name: String,
    pub description: String,
    pub severity: String,
    pub threshold: f64,
    pub condition: String,
    pub current_value: f64,
    pub previous_value: f64,
    pub percent_change: f64,
    pub campaign_id: Option<String>,
    pub status: AlertStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// New alert payload produced by the evaluator
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub tenant_id: String,
    pub rule_id: Uuid,
    pub kpi_name: String,
    pub description: String,
    pub severity: String,
    pub threshold: f64,
    pub condition: AlertCondition,
    pub current_value: f64,
    pub previous_value: f64,
    pub percent_change: f64,
    pub campaign_id: Option<String>,
    pub message: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Alert counts grouped by status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: i64,
    pub triggered: i64,
    pub acknowledged: i64,
    pub resolved: i64,
}
