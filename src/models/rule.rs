//! Alert rule models
//!
//! This module defines tenant-authored alert rules, the threshold
//! conditions they evaluate and the look-back windows used for
//! percent-change comparisons.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// Threshold condition evaluated against a KPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCondition {
    #[serde(rename = "above", alias = ">")]
    Above,
    #[serde(rename = "below", alias = "<")]
    Below,
    #[serde(rename = "falls_by_%")]
    FallsByPercent,
    #[serde(rename = "rises_by_%")]
    RisesByPercent,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
            AlertCondition::FallsByPercent => "falls_by_%",
            AlertCondition::RisesByPercent => "rises_by_%",
        }
    }

    /// Parse a condition string. The legacy comparison aliases `>` and `<`
    /// still appear in rules created before the names were introduced.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "above" | ">" => Some(AlertCondition::Above),
            "below" | "<" => Some(AlertCondition::Below),
            "falls_by_%" => Some(AlertCondition::FallsByPercent),
            "rises_by_%" => Some(AlertCondition::RisesByPercent),
            _ => None,
        }
    }

    /// True when the measured values break the rule's threshold.
    ///
    /// `above`/`below` compare the current value against the threshold; the
    /// percent conditions compare the change against the threshold
    /// magnitude. All comparisons are strict.
    pub fn is_exceeded(&self, current: f64, percent_change: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::Above => current > threshold,
            AlertCondition::Below => current < threshold,
            AlertCondition::FallsByPercent => percent_change < -threshold,
            AlertCondition::RisesByPercent => percent_change > threshold,
        }
    }
}

/// Look-back window for historical comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareWindow {
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "90d")]
    NinetyDays,
}

impl CompareWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareWindow::Day => "day",
            CompareWindow::Week => "week",
            CompareWindow::Month => "month",
            CompareWindow::NinetyDays => "90d",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" => Some(CompareWindow::Day),
            "week" => Some(CompareWindow::Week),
            "month" => Some(CompareWindow::Month),
            "90d" => Some(CompareWindow::NinetyDays),
            _ => None,
        }
    }

    /// Parse a stored window value, falling back to the one-week default
    /// for anything unrecognized.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }

    pub fn days(&self) -> i64 {
        match self {
            CompareWindow::Day => 1,
            CompareWindow::Week => 7,
            CompareWindow::Month => 30,
            CompareWindow::NinetyDays => 90,
        }
    }

    pub fn lookback(&self) -> Duration {
        Duration::days(self.days())
    }

    /// Human label used in default alert messages
    pub fn phrase(&self) -> &'static str {
        match self {
            CompareWindow::Day => "day",
            CompareWindow::Week => "week",
            CompareWindow::Month => "month",
            CompareWindow::NinetyDays => "90 days",
        }
    }
}

impl Default for CompareWindow {
    fn default() -> Self {
        CompareWindow::Week
    }
}

// ============================================================================
// Main Models
// ============================================================================

/// Alert rule authored by a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub tenant_id: String,
    pub campaign_id: Option<String>,
    pub kpi_name: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub compare_period: CompareWindow,
    /// Free-form label (e.g. low/medium/high/critical), copied onto alerts
    pub severity: String,
    /// Optional message template with `{{value}}`, `{{previousValue}}`,
    /// `{{threshold}}` and `{{percentChange}}` placeholders
    pub message: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Request Types
// ============================================================================

/// Request to create an alert rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlertRuleRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    pub kpi_name: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    #[serde(default)]
    pub compare_period: CompareWindow,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_severity() -> String {
    "medium".to_string()
}

fn default_active() -> bool {
    true
}

/// Request to update an alert rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAlertRuleRequest {
    pub campaign_id: Option<String>,
    pub kpi_name: Option<String>,
    pub condition: Option<AlertCondition>,
    pub threshold: Option<f64>,
    pub compare_period: Option<CompareWindow>,
    pub severity: Option<String>,
    pub message: Option<String>,
    pub active: Option<bool>,
}
