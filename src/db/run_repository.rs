//! Repository for evaluation run log database access

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_timestamp;
use crate::models::{EvaluationRun, NewEvaluationRun, RunStatus};

/// Row returned from the evaluation_runs table
#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: String,
    tenant_id: String,
    status: String,
    rules_processed: i64,
    alerts_created: i64,
    rules_failed: i64,
    error: Option<String>,
    started_at: String,
    finished_at: String,
}

/// Repository for evaluation run log operations
pub struct EvaluationRunRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EvaluationRunRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an evaluation run. The finish time is taken at insert.
    pub async fn insert(&self, run: &NewEvaluationRun) -> Result<EvaluationRun> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO evaluation_runs (id, tenant_id, status, rules_processed, alerts_created,
                                         rules_failed, error, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&run.tenant_id)
        .bind(run.status.as_str())
        .bind(run.rules_processed)
        .bind(run.alerts_created)
        .bind(run.rules_failed)
        .bind(&run.error)
        .bind(run.started_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to record evaluation run")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Failed to retrieve recorded evaluation run"))
    }

    /// Get a run by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<EvaluationRun>> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, tenant_id, status, rules_processed, alerts_created, rules_failed,
                   error, started_at, finished_at
            FROM evaluation_runs
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch evaluation run")?;

        Ok(row.map(row_to_run))
    }

    /// List runs for a tenant, newest first
    pub async fn list_by_tenant(&self, tenant_id: &str, limit: i64) -> Result<Vec<EvaluationRun>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, tenant_id, status, rules_processed, alerts_created, rules_failed,
                   error, started_at, finished_at
            FROM evaluation_runs
            WHERE tenant_id = ?
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch evaluation runs")?;

        Ok(rows.into_iter().map(row_to_run).collect())
    }
}

fn row_to_run(row: RunRow) -> EvaluationRun {
    EvaluationRun {
        id: Uuid::parse_str(&row.id).unwrap_or_default(),
        tenant_id: row.tenant_id,
        // Unknown statuses read back as failed rather than inventing a state
        status: RunStatus::from_str(&row.status).unwrap_or(RunStatus::Failed),
        rules_processed: row.rules_processed,
        alerts_created: row.alerts_created,
        rules_failed: row.rules_failed,
        error: row.error,
        started_at: parse_timestamp(&row.started_at),
        finished_at: parse_timestamp(&row.finished_at),
    }
}
