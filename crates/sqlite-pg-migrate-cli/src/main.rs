//! sqlite-pg-migrate CLI - movie catalogue transfer from SQLite to PostgreSQL.

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{Config, MigrateError, MigrationResult, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit code when at least one table failed or did not match.
const EXIT_TABLES_FAILED: u8 = 5;

/// Exit code when the run was interrupted.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Batch transfer of the movie catalogue from SQLite to PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer all configured tables
    Run {
        /// Read every batch without writing
        #[arg(long)]
        dry_run: bool,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override SQLite database path
        #[arg(long)]
        source_path: Option<PathBuf>,

        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,
    },

    /// Validate row counts and field values between source and target
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            dry_run,
            batch_size,
            source_path,
            target_schema,
        } => {
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            if let Some(path) = source_path {
                config.source.path = path;
            }
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            config.migration.dry_run |= dry_run;

            let cancel_token = setup_signal_handler()?;
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(cancel_token).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }

            Ok(match result.status.as_str() {
                "completed" => ExitCode::SUCCESS,
                "cancelled" => ExitCode::from(EXIT_CANCELLED),
                _ => ExitCode::from(EXIT_TABLES_FAILED),
            })
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::new(config).await?;
            let results = orchestrator.validate().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for v in &results {
                    println!(
                        "  {} {}: source={} target={} ({} of {} rows differ)",
                        if v.matches { "OK      " } else { "MISMATCH" },
                        v.table,
                        v.source_rows,
                        v.target_rows,
                        v.fields.rows_mismatched,
                        v.fields.rows_compared
                    );
                    for mismatch in &v.fields.mismatches {
                        println!("      {}", mismatch);
                    }
                }
            }

            if results.iter().all(|v| v.matches) {
                println!("Validation completed successfully");
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_TABLES_FAILED))
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summary(result: &MigrationResult) {
    println!("\n{}", headline(result));
    println!("  Run ID: {}", result.run_id);
    println!("  Status: {}", result.status);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Tables: {}/{}", result.tables_success, result.tables_total);
    println!("  Rows read: {}", result.rows_read);
    println!(
        "  Rows inserted: {} ({} already present)",
        result.rows_transferred, result.rows_conflicted
    );
    println!("  Throughput: {} rows/sec", result.rows_per_second);
    for table in &result.tables {
        if let Some(ref err) = table.error {
            println!("  Failed {}: {}", table.table, err);
        }
    }
}

fn headline(result: &MigrationResult) -> &'static str {
    match (result.status.as_str(), result.dry_run) {
        ("completed", false) => "Migration completed!",
        ("completed", true) => "Dry run completed!",
        ("cancelled", _) => "Migration cancelled.",
        (_, false) => "Migration completed with errors.",
        (_, true) => "Dry run completed with errors.",
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the run on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Stopping after the current batch...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Cancel the run on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current batch...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(status: &str, dry_run: bool) -> MigrationResult {
        MigrationResult {
            run_id: "run".to_string(),
            status: status.to_string(),
            dry_run,
            duration_seconds: 0.0,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            tables_total: 5,
            tables_success: 4,
            tables_failed: 1,
            rows_read: 0,
            rows_transferred: 0,
            rows_conflicted: 0,
            rows_per_second: 0,
            failed_tables: vec!["genre".to_string()],
            tables: Vec::new(),
        }
    }

    #[test]
    fn test_headline_follows_status() {
        assert_eq!(headline(&result("completed", false)), "Migration completed!");
        assert_eq!(headline(&result("completed", true)), "Dry run completed!");
        assert_eq!(
            headline(&result("completed_with_errors", false)),
            "Migration completed with errors."
        );
        assert_eq!(headline(&result("cancelled", false)), "Migration cancelled.");
    }
}
