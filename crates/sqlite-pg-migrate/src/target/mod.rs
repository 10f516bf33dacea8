//! Destination writer.
//!
//! [`TargetWriter`] is the seam between the transfer engine and the
//! destination store. [`PgWriter`] is the PostgreSQL implementation; every
//! row goes through a conflict-skip insert built by [`build_insert_sql`],
//! so re-running a transfer never duplicates rows.

mod postgres;
mod tls;

#[cfg(test)]
pub(crate) mod memory;

pub use postgres::PgWriter;
pub use tls::{SslMode, TlsBuilder};

use async_trait::async_trait;
use serde::Serialize;

use crate::core::identifier::{qualify, quote_ident};
use crate::core::Row;
use crate::error::{BoxError, MigrateError, Result};

/// Outcome of writing one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    /// Insert statements executed.
    pub attempted: u64,
    /// Rows actually inserted.
    pub inserted: u64,
    /// Rows skipped because their key already existed.
    pub conflicts: u64,
    /// Empty rows skipped without a statement.
    pub skipped_empty: u64,
}

impl WriteStats {
    /// Add another batch's counts to this one.
    pub fn merge(&mut self, other: &WriteStats) {
        self.attempted += other.attempted;
        self.inserted += other.inserted;
        self.conflicts += other.conflicts;
        self.skipped_empty += other.skipped_empty;
    }
}

/// Trait for destination stores.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Insert a batch of rows into `table` and commit once.
    ///
    /// Rows whose conflict key already exists are skipped silently. The
    /// batch is atomic: if any row fails, nothing from it is kept.
    async fn save_batch(&self, table: &str, rows: &[Row]) -> Result<WriteStats>;

    /// Row count of a destination table.
    async fn get_row_count(&self, table: &str) -> Result<i64>;

    /// Read back the rows of `table` whose conflict column, as text, is one
    /// of `keys`. Order is unspecified.
    async fn fetch_by_key(&self, table: &str, keys: &[String]) -> Result<Vec<Row>>;

    /// Check that the destination answers.
    async fn health_check(&self) -> Result<()>;

    /// Database type identifier.
    fn db_type(&self) -> &str;
}

/// Build the conflict-skip insert for one row.
///
/// The column list follows the row's key order and the placeholders are
/// numbered to match, so the row's values can be bound positionally.
/// Returns `None` for an empty row.
pub fn build_insert_sql(
    schema: &str,
    table: &str,
    conflict_column: &str,
    row: &Row,
) -> Result<Option<String>> {
    if row.is_empty() {
        return Ok(None);
    }

    let columns = row
        .columns()
        .map(quote_ident)
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let placeholders = (1..=row.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(Some(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
        qualify(schema, table)?,
        columns,
        placeholders,
        quote_ident(conflict_column)?
    )))
}

/// Executes one prepared insert inside an open batch transaction.
#[async_trait]
pub trait StatementRunner: Send {
    /// Run `sql` with the row's values bound positionally; returns the
    /// number of rows affected.
    async fn run_insert(&mut self, sql: &str, row: &Row) -> std::result::Result<u64, BoxError>;
}

/// Insert `rows` one statement at a time through `runner`.
///
/// Empty rows are counted and skipped. The first failing row stops the
/// batch with [`MigrateError::Write`]; rows after it are never executed
/// and the caller must not commit.
pub async fn write_rows<R: StatementRunner>(
    runner: &mut R,
    schema: &str,
    table: &str,
    conflict_column: &str,
    rows: &[Row],
) -> Result<WriteStats> {
    let mut stats = WriteStats::default();
    for row in rows {
        let Some(sql) = build_insert_sql(schema, table, conflict_column, row)? else {
            stats.skipped_empty += 1;
            continue;
        };

        let result = runner.run_insert(&sql, row).await;
        let affected = result.map_err(|source| MigrateError::Write {
            params: format!("{:?}", row.values().collect::<Vec<_>>()),
            statement: sql,
            source,
        })?;

        stats.attempted += 1;
        if affected == 0 {
            stats.conflicts += 1;
        } else {
            stats.inserted += affected;
        }
    }
    Ok(stats)
}
