//! Background scheduler for periodic KPI evaluation sweeps
//!
//! When `evaluator.schedule` is configured, a background task wakes every
//! 30 seconds, checks whether the cron expression is due and, when it is,
//! evaluates every tenant that has at least one active rule. A sweep that
//! is still running when the next fire comes due is not stacked; the fire
//! is skipped with a warning.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::EvaluatorConfig;
use crate::db::{AlertRuleRepository, DbPool};
use crate::services::EvaluationService;

/// How often the scheduler task checks whether the schedule is due
const SCHEDULER_TICK: Duration = Duration::from_secs(30);

/// Scheduler state
#[derive(Debug, Clone)]
pub struct EvaluationSchedulerState {
    /// Whether the scheduler is running
    running: Arc<RwLock<bool>>,
    /// Whether a sweep is currently executing
    sweep_in_progress: Arc<RwLock<bool>>,
    /// Database connection pool
    pool: DbPool,
    /// Evaluator configuration
    config: EvaluatorConfig,
}

impl EvaluationSchedulerState {
    fn new(pool: DbPool, config: EvaluatorConfig) -> Self {
        Self {
            running: Arc::new(RwLock::new(true)),
            sweep_in_progress: Arc::new(RwLock::new(false)),
            pool,
            config,
        }
    }

    /// Check if the scheduler is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Evaluation scheduler stop requested");
    }
}

/// Start the background evaluation scheduler.
///
/// Fails when the configured cron expression does not parse, so a bad
/// schedule is caught at startup rather than silently never firing.
pub fn start_evaluation_scheduler(
    pool: DbPool,
    config: EvaluatorConfig,
) -> Result<EvaluationSchedulerState> {
    let expression = config
        .schedule
        .clone()
        .context("No evaluation schedule configured")?;
    let schedule = Schedule::from_str(&expression)
        .with_context(|| format!("Invalid evaluation schedule '{}'", expression))?;

    let state = EvaluationSchedulerState::new(pool, config);

    let task_state = state.clone();
    tokio::spawn(async move {
        evaluation_sweep_task(task_state, schedule).await;
    });

    info!("Evaluation scheduler started (schedule: {})", expression);
    if let Some(next) = calculate_next_run(&expression) {
        info!("Next scheduled evaluation sweep at {}", next.to_rfc3339());
    }
    Ok(state)
}

/// Scheduler task: fires evaluation sweeps when the cron schedule is due
async fn evaluation_sweep_task(state: EvaluationSchedulerState, schedule: Schedule) {
    let mut interval_timer = interval(SCHEDULER_TICK);
    let mut next_fire = schedule.upcoming(Utc).next();

    loop {
        interval_timer.tick().await;

        if !*state.running.read().await {
            info!("Evaluation scheduler task stopping");
            break;
        }

        let Some(fire_at) = next_fire else {
            warn!("Evaluation schedule has no upcoming fire times, scheduler idle");
            break;
        };
        if Utc::now() < fire_at {
            continue;
        }
        next_fire = schedule.upcoming(Utc).next();

        {
            let mut in_progress = state.sweep_in_progress.write().await;
            if *in_progress {
                warn!("Previous evaluation sweep still running, skipping this fire");
                continue;
            }
            *in_progress = true;
        }

        let sweep_state = state.clone();
        tokio::spawn(async move {
            run_sweep(&sweep_state).await;
            *sweep_state.sweep_in_progress.write().await = false;
        });
    }
}

/// Evaluate every tenant that has active rules
async fn run_sweep(state: &EvaluationSchedulerState) {
    let rule_repo = AlertRuleRepository::new(&state.pool);
    let tenants = match rule_repo.distinct_tenants_with_active_rules().await {
        Ok(tenants) => tenants,
        Err(e) => {
            error!("Failed to list tenants for evaluation sweep: {}", e);
            return;
        }
    };

    info!("Evaluation sweep starting for {} tenants", tenants.len());

    let service = EvaluationService::new(state.pool.clone(), &state.config);
    for tenant_id in tenants {
        match service.evaluate_tenant(&tenant_id).await {
            Ok(summary) => {
                debug!(
                    "Sweep evaluated tenant {}: {} rules, {} alerts",
                    tenant_id, summary.rules_processed, summary.alerts_created
                );
            }
            Err(e) => {
                // Already recorded in the run log; keep sweeping
                error!("Scheduled evaluation failed for tenant {}: {}", tenant_id, e);
            }
        }
    }

    info!("Evaluation sweep complete");
}

/// Calculate the next fire time for a cron expression
pub fn calculate_next_run(cron_expr: &str) -> Option<DateTime<Utc>> {
    let schedule = match Schedule::from_str(cron_expr) {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid cron expression '{}': {}", cron_expr, e);
            return None;
        }
    };

    schedule.upcoming(Utc).next()
}

/// Validate a cron expression
pub fn validate_cron_expression(cron_expr: &str) -> Result<(), String> {
    Schedule::from_str(cron_expr)
        .map(|_| ())
        .map_err(|e| format!("Invalid cron expression: {}", e))
}
