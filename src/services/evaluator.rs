//! KPI alert evaluation service
//!
//! This service runs one evaluation pass for a tenant:
//! - load the tenant's active alert rules
//! - compare each rule's KPI against its latest snapshot and the
//!   historical value one compare-window back
//! - create an alert for every rule whose condition is exceeded
//! - record exactly one run-log row for the pass
//!
//! Rules are evaluated independently. A failure in one rule is counted
//! and logged without aborting the rest of the pass; only rule loading,
//! run logging and the overall timeout fail the pass as a whole.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::config::EvaluatorConfig;
use crate::db::{
    AlertRepository, AlertRuleRepository, EvaluationRunRepository, KpiHistoryRepository,
    KpiSnapshotRepository,
};
use crate::models::{Alert, AlertCondition, AlertRule, NewAlert, NewEvaluationRun};

/// Per-rule result of an evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// Condition exceeded, alert created
    Triggered,
    /// Condition not exceeded
    WithinThreshold,
    /// No usable current snapshot for the rule's KPI
    MissingSnapshot,
    /// No usable historical value at the comparison date
    MissingHistory,
    /// The rule could not be evaluated
    Failed(String),
}

/// Result of one tenant evaluation pass
#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub tenant_id: String,
    /// Active rules considered, including ones that were skipped or failed
    pub rules_processed: i64,
    pub alerts_created: i64,
    pub rules_failed: i64,
    /// One outcome per processed rule, in evaluation order
    pub outcomes: Vec<RuleOutcome>,
    /// Alerts created during the pass, in evaluation order
    pub alerts: Vec<Alert>,
}

/// KPI alert evaluation service
pub struct EvaluationService {
    pool: SqlitePool,
    timeout: Duration,
}

impl EvaluationService {
    /// Create a new evaluation service
    pub fn new(pool: SqlitePool, config: &EvaluatorConfig) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run a full evaluation pass for a tenant.
    ///
    /// Writes one `completed` run row on success or one `failed` row when
    /// the pass itself fails (rule loading error or timeout). The returned
    /// error is the pass failure; callers map it to their own surface.
    pub async fn evaluate_tenant(&self, tenant_id: &str) -> Result<EvaluationSummary> {
        if tenant_id.trim().is_empty() {
            bail!("tenant_id must not be empty");
        }

        let started_at = Utc::now();
        let run_repo = EvaluationRunRepository::new(&self.pool);

        let result = match tokio::time::timeout(self.timeout, self.evaluate_rules(tenant_id)).await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "Evaluation timed out after {}s",
                self.timeout.as_secs()
            )),
        };

        match result {
            Ok(summary) => {
                run_repo
                    .insert(&NewEvaluationRun::completed(
                        tenant_id,
                        summary.rules_processed,
                        summary.alerts_created,
                        summary.rules_failed,
                        started_at,
                    ))
                    .await?;

                info!(
                    tenant_id,
                    rules_processed = summary.rules_processed,
                    alerts_created = summary.alerts_created,
                    rules_failed = summary.rules_failed,
                    "Evaluation pass complete"
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Evaluation pass failed for tenant {}: {}", tenant_id, e);
                if let Err(log_err) = run_repo
                    .insert(&NewEvaluationRun::failed(tenant_id, &e.to_string(), started_at))
                    .await
                {
                    error!(
                        "Failed to record failed evaluation run for tenant {}: {}",
                        tenant_id, log_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Evaluate every active rule for the tenant
    async fn evaluate_rules(&self, tenant_id: &str) -> Result<EvaluationSummary> {
        let rule_repo = AlertRuleRepository::new(&self.pool);
        let loaded = rule_repo.list_active_for_evaluation(tenant_id).await?;

        let rules_processed = loaded.len() as i64;
        let mut alerts = Vec::new();
        let mut outcomes = Vec::with_capacity(loaded.len());

        for loaded_rule in loaded {
            let outcome = match loaded_rule {
                Ok(rule) => match self.evaluate_rule(&rule).await {
                    Ok((outcome, triggered)) => {
                        if let Some(alert) = triggered {
                            alerts.push(alert);
                        }
                        outcome
                    }
                    Err(e) => {
                        warn!("Rule {} ({}) failed to evaluate: {}", rule.id, rule.kpi_name, e);
                        RuleOutcome::Failed(e.to_string())
                    }
                },
                Err(e) => {
                    warn!("Skipping unreadable alert rule for tenant {}: {}", tenant_id, e);
                    RuleOutcome::Failed(e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        let alerts_created = alerts.len() as i64;
        let rules_failed = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, RuleOutcome::Failed(_)))
            .count() as i64;

        Ok(EvaluationSummary {
            tenant_id: tenant_id.to_string(),
            rules_processed,
            alerts_created,
            rules_failed,
            outcomes,
            alerts,
        })
    }

    /// Evaluate a single rule against its KPI data.
    ///
    /// Rules without a current snapshot or without a historical comparison
    /// value are skipped, not failed; a rule can only fire once both sides
    /// of the comparison exist. Values that do not parse as numbers are
    /// treated like missing data.
    async fn evaluate_rule(&self, rule: &AlertRule) -> Result<(RuleOutcome, Option<Alert>)> {
        let snapshot_repo = KpiSnapshotRepository::new(&self.pool);
        let Some(snapshot) = snapshot_repo.latest(&rule.tenant_id, &rule.kpi_name).await? else {
            debug!("Rule {} has no snapshot for {}, skipping", rule.id, rule.kpi_name);
            return Ok((RuleOutcome::MissingSnapshot, None));
        };

        let comparison_date = Utc::now() - rule.compare_period.lookback();
        let history_repo = KpiHistoryRepository::new(&self.pool);
        let Some(history) = history_repo
            .latest_before(&rule.tenant_id, &rule.kpi_name, comparison_date)
            .await?
        else {
            debug!(
                "Rule {} has no {} history for {}, skipping",
                rule.id,
                rule.compare_period.as_str(),
                rule.kpi_name
            );
            return Ok((RuleOutcome::MissingHistory, None));
        };

        let Some(current) = snapshot.numeric_value() else {
            warn!(
                "Rule {} snapshot value {:?} for {} is not numeric, skipping",
                rule.id, snapshot.value, rule.kpi_name
            );
            return Ok((RuleOutcome::MissingSnapshot, None));
        };
        let Some(previous) = history.numeric_value() else {
            warn!(
                "Rule {} history value {:?} for {} is not numeric, skipping",
                rule.id, history.value, rule.kpi_name
            );
            return Ok((RuleOutcome::MissingHistory, None));
        };

        let change = percent_change(current, previous);

        if !rule.condition.is_exceeded(current, change, rule.threshold) {
            debug!(
                "Rule {} within threshold: {} = {} ({}% change)",
                rule.id, rule.kpi_name, current, change
            );
            return Ok((RuleOutcome::WithinThreshold, None));
        }

        let description = default_message(rule, current, change);
        let message = match &rule.message {
            Some(template) => render_message(template, current, previous, rule.threshold, change),
            None => description.clone(),
        };

        let alert_repo = AlertRepository::new(&self.pool);
        let alert = alert_repo
            .create(&NewAlert {
                tenant_id: rule.tenant_id.clone(),
                rule_id: rule.id,
                kpi_name: rule.kpi_name.clone(),
                description,
                severity: rule.severity.clone(),
                threshold: rule.threshold,
                condition: rule.condition,
                current_value: current,
                previous_value: previous,
                percent_change: change,
                campaign_id: rule.campaign_id.clone(),
                message,
            })
            .await?;

        info!(
            "Alert {} triggered by rule {}: {} = {} (was {}, {}% change)",
            alert.id, rule.id, rule.kpi_name, current, previous, change
        );

        Ok((RuleOutcome::Triggered, Some(alert)))
    }
}

/// Percent change from the previous to the current value.
///
/// A zero baseline yields 0 rather than infinity, so percent-based
/// conditions never fire off a zero previous value.
fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

/// Render a custom alert message template.
///
/// Each placeholder is substituted once, at its first occurrence, with
/// the plain numeric form of the value. There is no escaping.
fn render_message(
    template: &str,
    value: f64,
    previous_value: f64,
    threshold: f64,
    percent_change: f64,
) -> String {
    template
        .replacen("{{value}}", &value.to_string(), 1)
        .replacen("{{previousValue}}", &previous_value.to_string(), 1)
        .replacen("{{threshold}}", &threshold.to_string(), 1)
        .replacen("{{percentChange}}", &percent_change.to_string(), 1)
}

/// Default human-readable sentence for a triggered rule. Also used as the
/// alert description when a custom template provides the message.
fn default_message(rule: &AlertRule, current: f64, percent_change: f64) -> String {
    match rule.condition {
        AlertCondition::Above => format!(
            "{} is {}, above the threshold of {}",
            rule.kpi_name, current, rule.threshold
        ),
        AlertCondition::Below => format!(
            "{} is {}, below the threshold of {}",
            rule.kpi_name, current, rule.threshold
        ),
        AlertCondition::FallsByPercent => format!(
            "{} fell {}% over the past {}, more than the allowed {}% drop",
            rule.kpi_name,
            -percent_change,
            rule.compare_period.phrase(),
            rule.threshold
        ),
        AlertCondition::RisesByPercent => format!(
            "{} rose {}% over the past {}, more than the allowed {}% rise",
            rule.kpi_name,
            percent_change,
            rule.compare_period.phrase(),
            rule.threshold
        ),
    }
}
