//! Per-table transfer engine.
//!
//! Streams one table's batches from the SQLite source into the destination
//! writer, strictly one batch at a time: fetch, write, commit, repeat. The
//! next batch is not read until the previous one is committed.

use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::schema::{ColumnSelector, EntityKind};
use crate::source::SqliteSource;
use crate::target::TargetWriter;

/// Transfer job for a single entity kind.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Entity kind, which also names the source and destination table.
    pub kind: EntityKind,

    /// Rows per batch.
    pub batch_size: usize,

    /// Columns requested from the source.
    pub selector: ColumnSelector,

    /// Read without writing.
    pub dry_run: bool,
}

impl TransferJob {
    /// Build the job for `kind` from the migration settings.
    pub fn for_kind(kind: EntityKind, config: &MigrationConfig) -> Self {
        Self {
            kind,
            batch_size: config.batch_size_for(kind.table_name()),
            selector: ColumnSelector::for_kind(kind, config.column_mode),
            dry_run: config.dry_run,
        }
    }

    pub fn table(&self) -> &'static str {
        self.kind.table_name()
    }
}

/// Statistics from a transfer job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferStats {
    /// Batches read (and, unless dry run, committed).
    pub batches: usize,

    /// Rows fetched from the source.
    pub rows_read: u64,

    /// Rows inserted at the destination.
    pub rows_inserted: u64,

    /// Rows skipped because their id already existed.
    pub rows_conflicted: u64,

    /// Empty rows skipped without a statement.
    pub rows_skipped: u64,

    /// Wall time of the job.
    #[serde(rename = "duration_seconds", serialize_with = "serialize_secs")]
    pub duration: Duration,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Moves tables from the source to the destination.
pub struct TransferEngine<'a, W: TargetWriter + ?Sized> {
    source: &'a SqliteSource,
    target: &'a W,
    cancel: CancellationToken,
}

impl<'a, W: TargetWriter + ?Sized> TransferEngine<'a, W> {
    pub fn new(source: &'a SqliteSource, target: &'a W) -> Self {
        Self {
            source,
            target,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between batches once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute a transfer job.
    ///
    /// Any failure is reported as [`MigrateError::Transfer`] naming the
    /// table and the 1-based batch number at which it happened. Batches
    /// committed before the failure stay committed; use [`Self::transfer`]
    /// to keep their counts.
    pub async fn execute(&self, job: &TransferJob) -> Result<TransferStats> {
        self.transfer(job).await.into_result()
    }

    /// Execute a transfer job, returning the counts of the batches that
    /// completed alongside the error that stopped it, if any.
    pub async fn transfer(&self, job: &TransferJob) -> TransferOutcome {
        let start = Instant::now();
        let table = job.table();

        info!(
            "{}: starting transfer (batch size {}{})",
            table,
            job.batch_size,
            if job.dry_run { ", dry run" } else { "" }
        );

        let mut stats = TransferStats::default();
        let result = self.copy_batches(job, &mut stats).await;
        stats.duration = start.elapsed();

        match &result {
            Ok(()) => info!(
                "{}: {} rows read in {} batches, {} inserted, {} already present ({:.2}s)",
                table,
                stats.rows_read,
                stats.batches,
                stats.rows_inserted,
                stats.rows_conflicted,
                stats.duration.as_secs_f64()
            ),
            Err(MigrateError::Cancelled) => {
                info!("{}: cancelled after {} batches", table, stats.batches)
            }
            Err(_) => info!(
                "{}: stopped after {} committed batches ({} rows inserted)",
                table, stats.batches, stats.rows_inserted
            ),
        }

        TransferOutcome {
            stats,
            error: result.err(),
        }
    }

    /// Fetch, write and commit batches until the scan runs dry. `stats`
    /// only counts batches that completed.
    async fn copy_batches(&self, job: &TransferJob, stats: &mut TransferStats) -> Result<()> {
        let table = job.table();
        let fail = |batch: usize, e: MigrateError| MigrateError::transfer(table, batch, e.to_string());

        let mut scan = self
            .source
            .scan(table, &job.selector)
            .map_err(|e| fail(1, e))?;
        let mut batches = scan.batches(job.batch_size).map_err(|e| fail(1, e))?;

        loop {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let number = stats.batches + 1;
            let batch = match batches.next() {
                Some(batch) => batch.map_err(|e| fail(number, e))?,
                None => return Ok(()),
            };

            if job.dry_run {
                debug!("{}: batch {} read ({} rows, not written)", table, number, batch.len());
                stats.batches = number;
                stats.rows_read += batch.len() as u64;
                continue;
            }

            let written = self
                .target
                .save_batch(table, &batch)
                .await
                .map_err(|e| fail(number, e))?;
            stats.batches = number;
            stats.rows_read += batch.len() as u64;
            stats.rows_inserted += written.inserted;
            stats.rows_conflicted += written.conflicts;
            stats.rows_skipped += written.skipped_empty;
            debug!(
                "{}: batch {} committed ({} rows, {} inserted)",
                table,
                number,
                batch.len(),
                written.inserted
            );
        }
    }
}

/// What a transfer job got done, and why it stopped early.
#[derive(Debug)]
pub struct TransferOutcome {
    /// Counts for the batches that completed.
    pub stats: TransferStats,

    /// The error that stopped the job, `None` if every batch went through.
    pub error: Option<MigrateError>,
}

impl TransferOutcome {
    /// Drop the partial counts and keep only the error, if any.
    pub fn into_result(self) -> Result<TransferStats> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.stats),
        }
    }
}
