//! Migration orchestrator - main workflow coordinator.
//!
//! Runs the selected entity kinds in their fixed order, each in isolation:
//! a failing table is logged and recorded, and the run moves on to the
//! next one. The caller gets a [`MigrationResult`] summary either way.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::SqlValue;
use crate::error::{MigrateError, Result};
use crate::schema::{ColumnSelector, EntityKind};
use crate::source::SqliteSource;
use crate::target::{PgWriter, TargetWriter};
use crate::transfer::{TransferEngine, TransferJob, TransferStats};
use crate::verify::FieldComparison;

/// Migration orchestrator.
pub struct Orchestrator<W: TargetWriter = PgWriter> {
    config: Config,
    source: SqliteSource,
    target: W,
}

/// Final state of one table in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Outcome of one table's transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    pub table: String,
    pub status: TableStatus,
    pub stats: TransferStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: completed, completed_with_errors or cancelled.
    pub status: String,

    /// Whether batches were only read.
    pub dry_run: bool,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total tables processed.
    pub tables_total: usize,

    /// Tables successfully migrated.
    pub tables_success: usize,

    /// Tables that failed.
    pub tables_failed: usize,

    /// Total rows read from the source.
    pub rows_read: u64,

    /// Total rows inserted at the destination.
    pub rows_transferred: u64,

    /// Rows skipped because they were already present.
    pub rows_conflicted: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,

    /// List of failed table names.
    pub failed_tables: Vec<String>,

    /// Per-table outcomes in transfer order.
    pub tables: Vec<TableResult>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True when every table completed.
    pub fn is_success(&self) -> bool {
        self.status == "completed"
    }
}

/// Row count and field comparison for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableValidation {
    pub table: String,
    pub source_rows: u64,
    pub target_rows: i64,
    /// Per-row field comparison against the destination.
    pub fields: FieldComparison,
    pub matches: bool,
}

/// Connectivity of both stores.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator<PgWriter> {
    /// Open the SQLite source and connect to PostgreSQL.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = SqliteSource::open(&config.source.path)?;
        let target = PgWriter::connect(&config.target).await?;
        Ok(Self::from_parts(config, source, target))
    }
}

impl<W: TargetWriter> Orchestrator<W> {
    /// Assemble an orchestrator from an open source and a writer.
    pub fn from_parts(config: Config, source: SqliteSource, target: W) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn target(&self) -> &W {
        &self.target
    }

    /// Run the migration.
    ///
    /// Per-table failures do not abort the run; they are reported in the
    /// result. Once `cancel` fires, the table in progress stops between
    /// batches and the remaining tables are marked cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let dry_run = self.config.migration.dry_run;
        let kinds = self.config.migration.selected_kinds();

        info!(
            "Starting migration run {} ({} tables{})",
            run_id,
            kinds.len(),
            if dry_run { ", dry run" } else { "" }
        );

        let engine = TransferEngine::new(&self.source, &self.target).with_cancel(cancel.clone());
        let mut tables: Vec<TableResult> = Vec::with_capacity(kinds.len());

        for kind in kinds {
            let table = kind.table_name();
            if cancel.is_cancelled() {
                tables.push(TableResult::cancelled(table));
                continue;
            }

            let failed_parents: Vec<&str> = kind
                .parents()
                .iter()
                .map(|p| p.table_name())
                .filter(|p| {
                    tables
                        .iter()
                        .any(|t| t.table == *p && t.status == TableStatus::Failed)
                })
                .collect();
            if !failed_parents.is_empty() {
                warn!(
                    "{}: parent tables {:?} failed; rows referencing them may be rejected",
                    table, failed_parents
                );
            }

            let job = TransferJob::for_kind(kind, &self.config.migration);
            let outcome = engine.transfer(&job).await;
            let result = match outcome.error {
                None => TableResult {
                    table: table.to_string(),
                    status: TableStatus::Completed,
                    stats: outcome.stats,
                    error: None,
                },
                Some(MigrateError::Cancelled) => {
                    warn!("{}: transfer cancelled", table);
                    TableResult {
                        table: table.to_string(),
                        status: TableStatus::Cancelled,
                        stats: outcome.stats,
                        error: None,
                    }
                }
                Some(e) => {
                    error!("{}", e.format_detailed());
                    TableResult {
                        table: table.to_string(),
                        status: TableStatus::Failed,
                        stats: outcome.stats,
                        error: Some(e.to_string()),
                    }
                }
            };
            tables.push(result);
        }

        let result = summarize(run_id, dry_run, started_at, clock, tables);
        if result.tables_failed > 0 {
            warn!(
                "Migration finished with {} failed tables: {:?}",
                result.tables_failed, result.failed_tables
            );
        } else {
            info!(
                "Migration {}: {} rows inserted in {:.2}s",
                result.status, result.rows_transferred, result.duration_seconds
            );
        }
        Ok(result)
    }

    /// Validate row counts and field values between source and target.
    ///
    /// Source rows are read batch by batch and looked up at the destination
    /// by their conflict key; timestamps are compared at one-second
    /// resolution.
    pub async fn validate(&self) -> Result<Vec<TableValidation>> {
        let mut results = Vec::new();

        for kind in self.config.migration.selected_kinds() {
            let table = kind.table_name();
            let source_rows = self.source.row_count(table)?;
            let target_rows = match self.target.get_row_count(table).await {
                Ok(count) => count,
                Err(e) => {
                    warn!("{}: could not count destination rows: {}", table, e);
                    0
                }
            };
            let fields = self.compare_fields(kind).await?;

            let counts_match = i64::try_from(source_rows).is_ok_and(|n| n == target_rows);
            let matches = counts_match && fields.is_clean();
            if matches {
                info!("{}: {} rows (match)", table, source_rows);
            } else {
                warn!(
                    "{}: source={} target={}, {} of {} rows differ (MISMATCH)",
                    table, source_rows, target_rows, fields.rows_mismatched, fields.rows_compared
                );
            }

            results.push(TableValidation {
                table: table.to_string(),
                source_rows,
                target_rows,
                fields,
                matches,
            });
        }

        Ok(results)
    }

    async fn compare_fields(&self, kind: EntityKind) -> Result<FieldComparison> {
        let table = kind.table_name();
        let key = self.config.target.conflict_column.as_str();
        let selector = ColumnSelector::for_kind(kind, self.config.migration.column_mode);
        let mut comparison = FieldComparison::default();

        let mut scan = self.source.scan(table, &selector)?;
        for batch in scan.batches(self.config.migration.batch_size_for(table))? {
            let batch = batch?;
            let keys: Vec<String> = batch
                .iter()
                .filter_map(|row| row.get(key).and_then(SqlValue::key_text))
                .collect();
            let stored = match self.target.fetch_by_key(table, &keys).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("{}: could not read back destination rows: {}", table, e);
                    Vec::new()
                }
            };
            comparison.add_batch(&batch, &stored, key);
        }

        Ok(comparison)
    }

    /// Probe both stores.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.source.test_connection();
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.health_check().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        Ok(HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            target_connected: target.is_ok(),
            target_latency_ms,
            healthy: source.is_ok() && target.is_ok(),
            source_error: source.err().map(|e| e.to_string()),
            target_error: target.err().map(|e| e.to_string()),
        })
    }
}

impl TableResult {
    /// A table that was never started because the run was cancelled.
    fn cancelled(table: &str) -> Self {
        Self {
            table: table.to_string(),
            status: TableStatus::Cancelled,
            stats: TransferStats::default(),
            error: None,
        }
    }
}

fn summarize(
    run_id: String,
    dry_run: bool,
    started_at: DateTime<Utc>,
    clock: Instant,
    tables: Vec<TableResult>,
) -> MigrationResult {
    let duration_seconds = clock.elapsed().as_secs_f64();
    let count = |status| tables.iter().filter(|t| t.status == status).count();
    let tables_success = count(TableStatus::Completed);
    let tables_failed = count(TableStatus::Failed);
    let cancelled = count(TableStatus::Cancelled) > 0;

    let rows_read: u64 = tables.iter().map(|t| t.stats.rows_read).sum();
    let rows_transferred: u64 = tables.iter().map(|t| t.stats.rows_inserted).sum();
    let rows_conflicted: u64 = tables.iter().map(|t| t.stats.rows_conflicted).sum();
    let rows_per_second = if duration_seconds > 0.0 {
        (rows_transferred as f64 / duration_seconds) as u64
    } else {
        0
    };

    let status = if cancelled {
        "cancelled"
    } else if tables_failed > 0 {
        "completed_with_errors"
    } else {
        "completed"
    };

    MigrationResult {
        run_id,
        status: status.to_string(),
        dry_run,
        duration_seconds,
        started_at,
        completed_at: Utc::now(),
        tables_total: tables.len(),
        tables_success,
        tables_failed,
        rows_read,
        rows_transferred,
        rows_conflicted,
        rows_per_second,
        failed_tables: tables
            .iter()
            .filter(|t| t.status == TableStatus::Failed)
            .map(|t| t.table.clone())
            .collect(),
        tables,
    }
}
