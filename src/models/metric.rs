//! KPI metric models
//!
//! Current snapshots and historical entries are distinct stores with the
//! same shape. Values are kept as text because ingestion sources deliver
//! both JSON numbers and numeric strings; parsing happens at evaluation
//! time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Latest-value snapshot of a KPI series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub id: Uuid,
    pub tenant_id: String,
    pub kpi_name: String,
    pub value: String,
    pub recorded_at: DateTime<Utc>,
}

impl MetricSnapshot {
    /// Parse the stored value, returning None for non-numeric payloads
    pub fn numeric_value(&self) -> Option<f64> {
        parse_metric_value(&self.value)
    }
}

/// Historical entry of a KPI series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricHistoryEntry {
    pub id: Uuid,
    pub tenant_id: String,
    pub kpi_name: String,
    pub value: String,
    pub recorded_at: DateTime<Utc>,
}

impl MetricHistoryEntry {
    pub fn numeric_value(&self) -> Option<f64> {
        parse_metric_value(&self.value)
    }
}

/// Parse a stored metric value as a finite float
pub fn parse_metric_value(raw: &str) -> Option<f64> {
    let parsed = raw.trim().parse::<f64>().ok()?;
    parsed.is_finite().then_some(parsed)
}

// ============================================================================
// Request Types
// ============================================================================

/// Request to record a metric value (snapshot or history entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetricRequest {
    pub tenant_id: String,
    pub kpi_name: String,
    #[serde(deserialize_with = "value_as_string")]
    pub value: String,
    /// Defaults to now when omitted
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Accept the metric value as either a JSON number or a string and
/// normalize it to the stored text form.
fn value_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(serde_json::Number),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}
