//! In-memory destination used by the engine and orchestrator tests.
//!
//! Batches go through the same [`write_rows`] loop as [`super::PgWriter`];
//! a batch's rows are staged and only become visible when the whole batch
//! succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{write_rows, StatementRunner, TargetWriter, WriteStats};
use crate::core::Row;
use crate::error::{BoxError, MigrateError, Result};

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    /// (table, rows in batch) per commit, in order.
    commits: Vec<(String, usize)>,
    /// Batches received per table, committed or not.
    batches: HashMap<String, usize>,
    statements: usize,
}

/// Records committed rows and applies conflict-skip on `id`.
#[derive(Default)]
pub(crate) struct MemoryWriter {
    state: Mutex<State>,
    failing: HashSet<String>,
    /// (table, batch) -> 1-based statement that fails.
    failing_rows: HashMap<(String, usize), usize>,
}

/// One open batch: a private copy of the table plus the statements run.
struct MemoryTx {
    staged: Vec<Row>,
    statements: usize,
    fail_at: Option<usize>,
}

#[async_trait]
impl StatementRunner for MemoryTx {
    async fn run_insert(&mut self, _sql: &str, row: &Row) -> std::result::Result<u64, BoxError> {
        self.statements += 1;
        if self.fail_at == Some(self.statements) {
            return Err("violates foreign key constraint".into());
        }
        let duplicate = row
            .get("id")
            .is_some_and(|id| self.staged.iter().any(|r| r.get("id") == Some(id)));
        if duplicate {
            return Ok(0);
        }
        self.staged.push(row.clone());
        Ok(1)
    }
}

impl MemoryWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every batch written to `table` fails before any row is executed.
    pub(crate) fn failing_on(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    /// The `row`-th statement of the `batch`-th batch written to `table` fails
    /// (both 1-based).
    pub(crate) fn failing_at(mut self, table: &str, batch: usize, row: usize) -> Self {
        self.failing_rows.insert((table.to_string(), batch), row);
        self
    }

    pub(crate) fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    pub(crate) fn commits(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().commits.clone()
    }

    pub(crate) fn statements(&self) -> usize {
        self.state.lock().unwrap().statements
    }
}

#[async_trait]
impl TargetWriter for MemoryWriter {
    async fn save_batch(&self, table: &str, rows: &[Row]) -> Result<WriteStats> {
        if self.failing.contains(table) {
            return Err(MigrateError::pool(
                "connection reset",
                format!("writing batch to {}", table),
            ));
        }

        let mut tx = {
            let mut state = self.state.lock().unwrap();
            let batch = state.batches.entry(table.to_string()).or_default();
            *batch += 1;
            let fail_at = self.failing_rows.get(&(table.to_string(), *batch)).copied();
            MemoryTx {
                staged: state.tables.get(table).cloned().unwrap_or_default(),
                statements: 0,
                fail_at,
            }
        };

        let result = write_rows(&mut tx, "content", table, "id", rows).await;

        let mut state = self.state.lock().unwrap();
        state.statements += tx.statements;
        let stats = result?;
        state.tables.insert(table.to_string(), tx.staged);
        state.commits.push((table.to_string(), rows.len()));
        Ok(stats)
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        Ok(self.rows(table).len() as i64)
    }

    async fn fetch_by_key(&self, table: &str, keys: &[String]) -> Result<Vec<Row>> {
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|row| {
                row.get("id")
                    .and_then(|id| id.key_text())
                    .is_some_and(|id| keys.contains(&id))
            })
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlValue;

    fn genre(id: &str, name: &str) -> Row {
        [("id", SqlValue::from(id)), ("name", SqlValue::from(name))]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_failing_row_rolls_back_its_batch() {
        let writer = MemoryWriter::new().failing_at("genre", 2, 2);
        writer
            .save_batch("genre", &[genre("a", "Drama")])
            .await
            .unwrap();

        let batch = [genre("b", "Comedy"), genre("c", "Horror"), genre("d", "Noir")];
        let err = writer.save_batch("genre", &batch).await.unwrap_err();

        assert!(matches!(err, MigrateError::Write { .. }));
        // rows "b" and "c" were executed, "d" never was
        assert_eq!(writer.statements(), 3);
        assert_eq!(writer.rows("genre"), vec![genre("a", "Drama")]);
        assert_eq!(writer.commits(), vec![("genre".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_fetch_by_key_returns_matching_rows() {
        let writer = MemoryWriter::new();
        writer
            .save_batch("genre", &[genre("a", "Drama"), genre("b", "Comedy")])
            .await
            .unwrap();
        let rows = writer
            .fetch_by_key("genre", &["b".to_string(), "z".to_string()])
            .await
            .unwrap();
        assert_eq!(rows, vec![genre("b", "Comedy")]);
    }
}
