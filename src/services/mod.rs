//! Business logic services

pub mod evaluator;
pub mod scheduler;

pub use evaluator::{EvaluationService, EvaluationSummary, RuleOutcome};
pub use scheduler::{
    calculate_next_run, start_evaluation_scheduler, validate_cron_expression,
    EvaluationSchedulerState,
};
