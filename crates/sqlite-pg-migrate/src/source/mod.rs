//! SQLite source reader.
//!
//! Reads one table at a time as a lazy sequence of bounded batches. A scan
//! is prepared once per table ([`SqliteSource::scan`]) and then executed
//! into a [`Batches`] iterator; each `next()` pulls at most `batch_size`
//! rows from the open cursor, so memory stays bounded by one batch.

use std::iter::FusedIterator;
use std::path::Path;

use rusqlite::{ffi, Connection, OpenFlags, Rows, Statement};
use tracing::debug;

use crate::core::identifier::quote_ident;
use crate::core::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::schema::{ColumnSelector, ResolvedSelector};

/// Read-only access to the SQLite database.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Open the database file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("Opened SQLite source {}", path.display());
        Ok(Self { conn })
    }

    /// Wrap a connection owned by the caller.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Check that the database can be queried.
    pub fn test_connection(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Column names of a table in declaration order. Empty if the table
    /// does not exist.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table)?);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|source| query_error(table, source))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|source| query_error(table, source))?;
        Ok(columns)
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| query_error(table, source))?;
        Ok(count.max(0) as u64)
    }

    /// Prepare a full scan of `table`.
    ///
    /// The selector is resolved against the table's actual columns before
    /// the query is built, so the statement only names columns that exist.
    pub fn scan(&self, table: &str, selector: &ColumnSelector) -> Result<TableScan<'_>> {
        let available = self.table_columns(table)?;
        if available.is_empty() {
            return Err(query_error(
                table,
                rusqlite::Error::SqliteFailure(
                    ffi::Error::new(ffi::SQLITE_ERROR),
                    Some(format!("no such table: {}", table)),
                ),
            ));
        }

        let selector = selector.resolve(&available)?;
        let sql = format!(
            "SELECT {} FROM {}",
            selector.select_list()?,
            quote_ident(table)?
        );
        let stmt = self
            .conn
            .prepare(&sql)
            .map_err(|source| query_error(table, source))?;
        let columns = stmt.column_names().into_iter().map(String::from).collect();
        debug!("Prepared scan of {}: {}", table, sql);

        Ok(TableScan {
            table: table.to_string(),
            sql,
            columns,
            selector,
            stmt,
        })
    }
}

/// A prepared, not yet executed, table scan.
pub struct TableScan<'conn> {
    table: String,
    sql: String,
    columns: Vec<String>,
    selector: ResolvedSelector,
    stmt: Statement<'conn>,
}

impl TableScan<'_> {
    /// Table being scanned.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The select statement.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Columns the statement returns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Execute the scan and stream its rows in batches of `batch_size`.
    pub fn batches(&mut self, batch_size: usize) -> Result<Batches<'_>> {
        if batch_size == 0 {
            return Err(MigrateError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        let rows = self
            .stmt
            .query([])
            .map_err(|source| query_error(&self.table, source))?;

        Ok(Batches {
            table: &self.table,
            columns: &self.columns,
            selector: &self.selector,
            rows,
            batch_size,
            exhausted: false,
        })
    }
}

/// Lazy, single-pass sequence of row batches.
///
/// Ends at the first fetch that yields no rows, or right after yielding an
/// error. Once ended it stays ended.
pub struct Batches<'stmt> {
    table: &'stmt str,
    columns: &'stmt [String],
    selector: &'stmt ResolvedSelector,
    rows: Rows<'stmt>,
    batch_size: usize,
    exhausted: bool,
}

impl Batches<'_> {
    fn fetch(&mut self) -> Result<Batch> {
        let table = self.table;
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            let Some(row) = self
                .rows
                .next()
                .map_err(|source| query_error(table, source))?
            else {
                break;
            };
            let raw = convert_row(table, self.columns, row)?;
            batch.push(self.selector.shape(raw)?);
        }
        Ok(batch)
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.fetch() {
            Ok(batch) if batch.is_empty() => {
                self.exhausted = true;
                None
            }
            Ok(batch) => Some(Ok(batch)),
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Batches<'_> {}

fn convert_row(table: &str, columns: &[String], row: &rusqlite::Row<'_>) -> Result<Row> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let value = row
                .get_ref(idx)
                .map_err(|source| query_error(table, source))?;
            let value = SqlValue::from_sqlite(value).map_err(|e| {
                MigrateError::invalid_row(
                    table,
                    format!("column '{}' is not valid UTF-8: {}", name, e),
                )
            })?;
            Ok((name.as_str(), value))
        })
        .collect()
}

fn query_error(table: &str, source: rusqlite::Error) -> MigrateError {
    MigrateError::SourceQuery {
        table: table.to_string(),
        source,
    }
}
