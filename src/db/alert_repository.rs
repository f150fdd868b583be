//! Repository for alert database access

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_timestamp;
use crate::models::{Alert, AlertStats, AlertStatus, NewAlert};

/// Row returned from the alerts table
#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: String,
    tenant_id: String,
    rule_id: Option<String>,
    kpi_name: String,
    description: String,
    severity: String,
    threshold: f64,
    condition: String,
    current_value: f64,
    previous_value: f64,
    percent_change: f64,
    campaign_id: Option<String>,
    status: String,
    message: String,
    created_at: String,
    acknowledged_at: Option<String>,
    resolved_at: Option<String>,
}

/// Repository for alert operations
pub struct AlertRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a newly triggered alert
    pub async fn create(&self, new_alert: &NewAlert) -> Result<Alert> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO alerts (id, tenant_id, rule_id, kpi_name, description, severity,
                                threshold, condition, current_value, previous_value,
                                percent_change, campaign_id, status, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_alert.tenant_id)
        .bind(new_alert.rule_id.to_string())
        .bind(&new_alert.kpi_name)
        .bind(&new_alert.description)
        .bind(&new_alert.severity)
        .bind(new_alert.threshold)
        .bind(new_alert.condition.as_str())
        .bind(new_alert.current_value)
        .bind(new_alert.previous_value)
        .bind(new_alert.percent_change)
        .bind(&new_alert.campaign_id)
        .bind(AlertStatus::Triggered.as_str())
        .bind(&new_alert.message)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create alert")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Failed to retrieve created alert"))
    }

    /// Get an alert by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, tenant_id, rule_id, kpi_name, description, severity, threshold,
                   condition, current_value, previous_value, percent_change, campaign_id,
                   status, message, created_at, acknowledged_at, resolved_at
            FROM alerts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch alert")?;

        Ok(row.map(row_to_alert))
    }

    /// List alerts for a tenant with optional status/severity filters,
    /// newest first
    pub async fn list(
        &self,
        tenant_id: &str,
        status: Option<AlertStatus>,
        severity: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Alert>> {
        let mut sql = String::from(
            "SELECT id, tenant_id, rule_id, kpi_name, description, severity, threshold, \
             condition, current_value, previous_value, percent_change, campaign_id, \
             status, message, created_at, acknowledged_at, resolved_at \
             FROM alerts WHERE tenant_id = ?",
        );
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if severity.is_some() {
            sql.push_str(" AND severity = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, AlertRow>(&sql).bind(tenant_id);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        if let Some(severity) = severity {
            query = query.bind(severity);
        }

        let rows = query
            .bind(limit)
            .fetch_all(self.pool)
            .await
            .context("Failed to fetch alerts")?;

        Ok(rows.into_iter().map(row_to_alert).collect())
    }

    /// Mark a triggered alert as acknowledged. Acknowledging an alert that
    /// already left the triggered state is a no-op.
    pub async fn acknowledge(&self, id: Uuid) -> Result<Option<Alert>> {
        sqlx::query(
            r#"
            UPDATE alerts
            SET status = 'acknowledged', acknowledged_at = ?
            WHERE id = ? AND status = 'triggered'
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to acknowledge alert")?;

        self.get_by_id(id).await
    }

    /// Mark an alert as resolved. Resolving an already resolved alert is a
    /// no-op.
    pub async fn resolve(&self, id: Uuid) -> Result<Option<Alert>> {
        sqlx::query(
            r#"
            UPDATE alerts
            SET status = 'resolved', resolved_at = ?
            WHERE id = ? AND status IN ('triggered', 'acknowledged')
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to resolve alert")?;

        self.get_by_id(id).await
    }

    /// Alert counts by status for a tenant
    pub async fn stats(&self, tenant_id: &str) -> Result<AlertStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM alerts WHERE tenant_id = ? GROUP BY status",
        )
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch alert stats")?;

        let mut stats = AlertStats {
            total: 0,
            triggered: 0,
            acknowledged: 0,
            resolved: 0,
        };
        for (status, count) in rows {
            stats.total += count;
            match AlertStatus::from_str(&status) {
                Some(AlertStatus::Triggered) => stats.triggered += count,
                Some(AlertStatus::Acknowledged) => stats.acknowledged += count,
                Some(AlertStatus::Resolved) => stats.resolved += count,
                None => {}
            }
        }

        Ok(stats)
    }
}

fn row_to_alert(row: AlertRow) -> Alert {
    Alert {
        id: Uuid::parse_str(&row.id).unwrap_or_default(),
        tenant_id: row.tenant_id,
        rule_id: row.rule_id.and_then(|s| Uuid::parse_str(&s).ok()),
        kpi_name: row.kpi_name,
        description: row.description,
        severity: row.severity,
        threshold: row.threshold,
        condition: row.condition,
        current_value: row.current_value,
        previous_value: row.previous_value,
        percent_change: row.percent_change,
        campaign_id: row.campaign_id,
        status: AlertStatus::from_str(&row.status).unwrap_or_default(),
        message: row.message,
        created_at: parse_timestamp(&row.created_at),
        acknowledged_at: row.acknowledged_at.as_deref().map(parse_timestamp),
        resolved_at: row.resolved_at.as_deref().map(parse_timestamp),
    }
}
