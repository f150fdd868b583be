//! Repository for alert rule database access

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_timestamp;
use crate::models::{
    AlertCondition, AlertRule, CompareWindow, CreateAlertRuleRequest, UpdateAlertRuleRequest,
};

/// Row returned from the alert_rules table
#[derive(Debug, sqlx::FromRow)]
struct AlertRuleRow {
    id: String,
    tenant_id: String,
    campaign_id: Option<String>,
    kpi_name: String,
    condition: String,
    threshold: f64,
    compare_period: String,
    severity: String,
    message: Option<String>,
    active: bool,
    created_at: String,
    updated_at: String,
}

/// Repository for alert rule operations
pub struct AlertRuleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertRuleRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List rules for a tenant, newest first
    pub async fn list_by_tenant(
        &self,
        tenant_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<AlertRule>> {
        let mut sql = String::from(
            "SELECT id, tenant_id, campaign_id, kpi_name, condition, threshold, \
             compare_period, severity, message, active, created_at, updated_at \
             FROM alert_rules WHERE tenant_id = ?",
        );
        if !include_inactive {
            sql.push_str(" AND active = 1");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let rows = sqlx::query_as::<_, AlertRuleRow>(&sql)
            .bind(tenant_id)
            .fetch_all(self.pool)
            .await
            .context("Failed to fetch alert rules")?;

        rows.into_iter().map(row_to_rule).collect()
    }

    /// Load a tenant's active rules for an evaluation pass.
    ///
    /// Row conversion failures (e.g. a stored condition that no longer
    /// parses) are surfaced per rule instead of failing the whole batch,
    /// so the evaluator can count them as failed rules and keep going.
    pub async fn list_active_for_evaluation(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<Result<AlertRule>>> {
        let rows = sqlx::query_as::<_, AlertRuleRow>(
            r#"
            SELECT id, tenant_id, campaign_id, kpi_name, condition, threshold,
                   compare_period, severity, message, active, created_at, updated_at
            FROM alert_rules
            WHERE tenant_id = ? AND active = 1
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch active alert rules")?;

        Ok(rows.into_iter().map(row_to_rule).collect())
    }

    /// Tenants that currently have at least one active rule
    pub async fn distinct_tenants_with_active_rules(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT tenant_id FROM alert_rules WHERE active = 1 ORDER BY tenant_id",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch tenants with active rules")?;

        Ok(rows.into_iter().map(|(tenant_id,)| tenant_id).collect())
    }

    /// Get a rule by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<AlertRule>> {
        let row = sqlx::query_as::<_, AlertRuleRow>(
            r#"
            SELECT id, tenant_id, campaign_id, kpi_name, condition, threshold,
                   compare_period, severity, message, active, created_at, updated_at
            FROM alert_rules
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch alert rule")?;

        row.map(row_to_rule).transpose()
    }

    /// Create a new alert rule
    pub async fn create(&self, req: &CreateAlertRuleRequest) -> Result<AlertRule> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO alert_rules (id, tenant_id, campaign_id, kpi_name, condition, threshold,
                                     compare_period, severity, message, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&req.tenant_id)
        .bind(&req.campaign_id)
        .bind(&req.kpi_name)
        .bind(req.condition.as_str())
        .bind(req.threshold)
        .bind(req.compare_period.as_str())
        .bind(&req.severity)
        .bind(&req.message)
        .bind(req.active)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to create alert rule")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Failed to retrieve created alert rule"))
    }

    /// Update an alert rule. Only supplied fields change.
    pub async fn update(
        &self,
        id: Uuid,
        req: &UpdateAlertRuleRequest,
    ) -> Result<Option<AlertRule>> {
        let Some(existing) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let campaign_id = req.campaign_id.as_ref().or(existing.campaign_id.as_ref());
        let kpi_name = req.kpi_name.as_ref().unwrap_or(&existing.kpi_name);
        let condition = req.condition.unwrap_or(existing.condition);
        let threshold = req.threshold.unwrap_or(existing.threshold);
        let compare_period = req.compare_period.unwrap_or(existing.compare_period);
        let severity = req.severity.as_ref().unwrap_or(&existing.severity);
        let message = req.message.as_ref().or(existing.message.as_ref());
        let active = req.active.unwrap_or(existing.active);

        sqlx::query(
            r#"
            UPDATE alert_rules
            SET campaign_id = ?, kpi_name = ?, condition = ?, threshold = ?,
                compare_period = ?, severity = ?, message = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(campaign_id)
        .bind(kpi_name)
        .bind(condition.as_str())
        .bind(threshold)
        .bind(compare_period.as_str())
        .bind(severity)
        .bind(message)
        .bind(active)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update alert rule")?;

        self.get_by_id(id).await
    }

    /// Delete an alert rule
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alert_rules WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete alert rule")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_rule(row: AlertRuleRow) -> Result<AlertRule> {
    // Conditions must parse; a rule with an unknown condition cannot be
    // evaluated safely. Unknown compare windows fall back to a week.
    let condition = AlertCondition::from_str(&row.condition)
        .ok_or_else(|| anyhow!("Unknown alert condition '{}' on rule {}", row.condition, row.id))?;

    Ok(AlertRule {
        id: Uuid::parse_str(&row.id).unwrap_or_default(),
        tenant_id: row.tenant_id,
        campaign_id: row.campaign_id,
        kpi_name: row.kpi_name,
        condition,
        threshold: row.threshold,
        compare_period: CompareWindow::from_str_or_default(&row.compare_period),
        severity: row.severity,
        message: row.message,
        active: row.active,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}
