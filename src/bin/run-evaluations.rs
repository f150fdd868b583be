//! CLI tool for running KPI alert evaluations
//!
//! This binary can be invoked by cron to evaluate tenants outside the
//! HTTP server, for example on hosts where the API is not exposed.
//!
//! Usage:
//!   run-evaluations [--config <path>] [--tenant <id>]... [--all]
//!
//! Options:
//!   --config        Path to configuration file (default: config/config.yaml)
//!   --tenant        Evaluate a specific tenant (may be repeated)
//!   --all           Evaluate every tenant that has at least one active rule
//!   --database-url  Override the configured database URL
//!   --verbose       Enable verbose output
//!
//! Example cron entry (run every 15 minutes):
//!   */15 * * * * /usr/local/bin/run-evaluations --config /etc/kpiwatch/config.yaml --all

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use kpiwatch::db::AlertRuleRepository;
use kpiwatch::services::EvaluationService;
use kpiwatch::AppConfig;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut tenants: Vec<String> = Vec::new();
    let mut all_tenants = false;
    let mut database_url: Option<String> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--tenant" => {
                if i + 1 < args.len() {
                    tenants.push(args[i + 1].clone());
                    i += 1;
                }
            }
            "--all" => {
                all_tenants = true;
            }
            "--database-url" => {
                if i + 1 < args.len() {
                    database_url = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("run-evaluations {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // Initialize logging
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("KPIWatch - Alert Evaluation Runner");

    // Load configuration
    let config = if let Some(path) = config_path {
        info!("Config file: {}", path.display());
        std::env::set_var("KPIWATCH_CONFIG", path.to_str().unwrap_or(""));
        AppConfig::load()?
    } else {
        info!("Using default configuration paths");
        AppConfig::load()?
    };

    // Connect to database
    let db_url = database_url.unwrap_or_else(|| config.database.url.clone());

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await?;

    info!("Connected to database: {}", db_url);

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Resolve which tenants to evaluate
    if all_tenants {
        let repo = AlertRuleRepository::new(&pool);
        for tenant_id in repo.distinct_tenants_with_active_rules().await? {
            if !tenants.contains(&tenant_id) {
                tenants.push(tenant_id);
            }
        }
    }

    if tenants.is_empty() {
        if all_tenants {
            info!("No tenants with active alert rules found");
            return Ok(());
        }
        eprintln!("No tenants specified. Use --tenant <id> or --all.");
        print_help();
        std::process::exit(1);
    }

    // Evaluate each tenant
    let evaluator = EvaluationService::new(pool.clone(), &config.evaluator);
    let mut failed = 0usize;

    info!("Evaluating {} tenant(s)", tenants.len());

    for tenant_id in &tenants {
        match evaluator.evaluate_tenant(tenant_id).await {
            Ok(summary) => {
                info!(
                    "  [OK] {}: {} rules processed, {} alerts created, {} rules failed",
                    tenant_id,
                    summary.rules_processed,
                    summary.alerts_created,
                    summary.rules_failed
                );
            }
            Err(e) => {
                failed += 1;
                error!("  [FAIL] {}: {}", tenant_id, e);
            }
        }
    }

    info!(
        "Evaluated {} tenant(s): {} successful, {} failed",
        tenants.len(),
        tenants.len() - failed,
        failed
    );

    // Exit with error code if any failed
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_help() {
    println!("KPIWatch - Alert Evaluation Runner");
    println!();
    println!("Usage:");
    println!("  run-evaluations [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <path>        Path to configuration file (default: config/config.yaml)");
    println!("  --tenant <id>          Evaluate a specific tenant (may be repeated)");
    println!("  --all                  Evaluate every tenant that has at least one active rule");
    println!("  --database-url <url>   Override the configured database URL");
    println!("  -v, --verbose          Enable verbose output");
    println!("  -V, --version          Show version information");
    println!("  -h, --help             Show this help message");
    println!();
    println!("Example cron entries:");
    println!("  # Evaluate all tenants every 15 minutes");
    println!(
        "  */15 * * * * /usr/local/bin/run-evaluations --config /etc/kpiwatch/config.yaml --all"
    );
    println!();
    println!("  # Evaluate one tenant hourly");
    println!("  0 * * * * /usr/local/bin/run-evaluations --tenant acme --database-url sqlite:///var/lib/kpiwatch/kpiwatch.db");
}
