//! # sqlite-pg-migrate
//!
//! Batch transfer of the movie catalogue from SQLite into PostgreSQL.
//!
//! Five tables (`film_work`, `genre`, `person`, `genre_film_work`,
//! `person_film_work`) are read in bounded batches and written with
//! conflict-skip inserts, one transaction per batch:
//!
//! - **Record schema** describing each table's fields, types and defaults
//! - **Streaming reads** that never hold more than one batch in memory
//! - **Idempotent writes** via `ON CONFLICT (id) DO NOTHING`
//! - **Per-table isolation** so one failing table does not stop the others
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sqlite_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod source;
pub mod target;
pub mod transfer;
pub mod verify;

// Re-exports for convenient access
pub use crate::core::{Batch, Row, SqlValue};
pub use config::{ColumnMode, Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    HealthCheckResult, MigrationResult, Orchestrator, TableResult, TableStatus, TableValidation,
};
pub use schema::{ColumnSelector, EntityKind, EntitySchema};
pub use source::SqliteSource;
pub use target::{PgWriter, TargetWriter, WriteStats};
pub use transfer::{TransferEngine, TransferJob, TransferOutcome, TransferStats};
