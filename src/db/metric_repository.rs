//! Repositories for KPI metric database access
//!
//! Snapshots and history are distinct append-only stores. The evaluator
//! reads the newest snapshot and the newest history row strictly before
//! the comparison date; ingestion only ever inserts.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_timestamp;
use crate::models::{MetricHistoryEntry, MetricSnapshot};

/// Row returned from the kpi_snapshots and kpi_history tables
#[derive(Debug, sqlx::FromRow)]
struct MetricRow {
    id: String,
    tenant_id: String,
    kpi_name: String,
    value: String,
    recorded_at: String,
}

// ============================================================================
// KPI Snapshot Repository
// ============================================================================

/// Repository for current KPI snapshot operations
pub struct KpiSnapshotRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> KpiSnapshotRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// The most recent snapshot of a KPI for a tenant
    pub async fn latest(&self, tenant_id: &str, kpi_name: &str) -> Result<Option<MetricSnapshot>> {
        let row = sqlx::query_as::<_, MetricRow>(
            r#"
            SELECT id, tenant_id, kpi_name, value, recorded_at
            FROM kpi_snapshots
            WHERE tenant_id = ? AND kpi_name = ?
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(kpi_name)
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch latest KPI snapshot")?;

        Ok(row.map(row_to_snapshot))
    }

    /// Record a new snapshot value
    pub async fn insert(
        &self,
        tenant_id: &str,
        kpi_name: &str,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<MetricSnapshot> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO kpi_snapshots (id, tenant_id, kpi_name, value, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id)
        .bind(kpi_name)
        .bind(value)
        .bind(recorded_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to record KPI snapshot")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Failed to retrieve recorded snapshot"))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<MetricSnapshot>> {
        let row = sqlx::query_as::<_, MetricRow>(
            "SELECT id, tenant_id, kpi_name, value, recorded_at FROM kpi_snapshots WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch KPI snapshot")?;

        Ok(row.map(row_to_snapshot))
    }
}

fn row_to_snapshot(row: MetricRow) -> MetricSnapshot {
    MetricSnapshot {
        id: Uuid::parse_str(&row.id).unwrap_or_default(),
        tenant_id: row.tenant_id,
        kpi_name: row.kpi_name,
        value: row.value,
        recorded_at: parse_timestamp(&row.recorded_at),
    }
}

// ============================================================================
// KPI History Repository
// ============================================================================

/// Repository for historical KPI value operations
pub struct KpiHistoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> KpiHistoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// The most recent history entry recorded strictly before the cutoff.
    ///
    /// RFC 3339 timestamps in UTC sort lexicographically, so the text
    /// comparison in SQL matches chronological order.
    pub async fn latest_before(
        &self,
        tenant_id: &str,
        kpi_name: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<MetricHistoryEntry>> {
        let row = sqlx::query_as::<_, MetricRow>(
            r#"
            SELECT id, tenant_id, kpi_name, value, recorded_at
            FROM kpi_history
            WHERE tenant_id = ? AND kpi_name = ? AND recorded_at < ?
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(kpi_name)
        .bind(cutoff.to_rfc3339())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch KPI history entry")?;

        Ok(row.map(row_to_history_entry))
    }

    /// Record a historical value
    pub async fn insert(
        &self,
        tenant_id: &str,
        kpi_name: &str,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<MetricHistoryEntry> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO kpi_history (id, tenant_id, kpi_name, value, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id)
        .bind(kpi_name)
        .bind(value)
        .bind(recorded_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to record KPI history entry")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Failed to retrieve recorded history entry"))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<MetricHistoryEntry>> {
        let row = sqlx::query_as::<_, MetricRow>(
            "SELECT id, tenant_id, kpi_name, value, recorded_at FROM kpi_history WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch KPI history entry")?;

        Ok(row.map(row_to_history_entry))
    }
}

fn row_to_history_entry(row: MetricRow) -> MetricHistoryEntry {
    MetricHistoryEntry {
        id: Uuid::parse_str(&row.id).unwrap_or_default(),
        tenant_id: row.tenant_id,
        kpi_name: row.kpi_name,
        value: row.value,
        recorded_at: parse_timestamp(&row.recorded_at),
    }
}
