//! PostgreSQL destination writer.
//!
//! Holds a single long-lived connection (a deadpool pool of size one).
//! Each batch runs in its own transaction: one cached prepared insert per
//! distinct column set, one execute per row, one commit per batch. The
//! per-row loop itself is [`write_rows`]; this module supplies the
//! transaction it runs against.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Transaction};
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

use super::tls::{SslMode, TlsBuilder};
use super::{write_rows, StatementRunner, TargetWriter, WriteStats};
use crate::config::TargetConfig;
use crate::core::identifier::{qualify, quote_ident};
use crate::core::{Row, SqlValue};
use crate::error::{BoxError, MigrateError, Result};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL writer.
pub struct PgWriter {
    pool: Pool,
    schema: String,
    conflict_column: String,
}

impl PgWriter {
    /// Connect to the destination described by `config` and test the connection.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = config.pg_config();
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let mgr = match TlsBuilder::new(ssl_mode).build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };
        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let writer = Self::from_pool(pool, &config.schema, &config.conflict_column);
        writer.health_check().await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );
        Ok(writer)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool, schema: &str, conflict_column: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
            conflict_column: conflict_column.to_string(),
        }
    }

    /// Destination schema.
    pub fn schema(&self) -> &str {
        &self.schema
    }
}

#[async_trait]
impl TargetWriter for PgWriter {
    async fn save_batch(&self, table: &str, rows: &[Row]) -> Result<WriteStats> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("writing batch to {}", table)))?;
        let mut tx = client.transaction().await?;

        // An early return drops `tx` uncommitted, which rolls the batch back.
        let stats = write_rows(&mut tx, &self.schema, table, &self.conflict_column, rows).await?;

        tx.commit().await?;
        debug!(
            "{}: committed {} rows ({} inserted, {} conflicts, {} empty)",
            table,
            rows.len(),
            stats.inserted,
            stats.conflicts,
            stats.skipped_empty
        );
        Ok(stats)
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("counting rows in {}", table)))?;
        let sql = format!("SELECT COUNT(*) FROM {}", qualify(&self.schema, table)?);
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    async fn fetch_by_key(&self, table: &str, keys: &[String]) -> Result<Vec<Row>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("reading back rows from {}", table)))?;
        let sql = format!(
            "SELECT * FROM {} WHERE {}::text = ANY($1)",
            qualify(&self.schema, table)?,
            quote_ident(&self.conflict_column)?
        );
        let rows = client.query(&sql, &[&keys]).await?;

        Ok(rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| (col.name().to_string(), SqlValue::from_pg(row, idx)))
                    .collect()
            })
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL target connection"))?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}

#[async_trait]
impl<'a> StatementRunner for Transaction<'a> {
    async fn run_insert(&mut self, sql: &str, row: &Row) -> std::result::Result<u64, BoxError> {
        let stmt = self.prepare_cached(sql).await?;
        let params: Vec<&(dyn ToSql + Sync)> =
            row.values().map(|v| v as &(dyn ToSql + Sync)).collect();
        Ok(tokio_postgres::Transaction::execute(self, &stmt, &params).await?)
    }
}
