//! Error types for the migration library.

use thiserror::Error;

/// Boxed cause of a failed destination statement.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] rusqlite::Error),

    /// Query or fetch against a specific source table failed
    #[error("Source read failed for table {table}: {source}")]
    SourceQuery {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A source row does not satisfy the record schema
    #[error("Invalid row in table {table}: {message}")]
    InvalidRow { table: String, message: String },

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A single row insert failed at the destination
    #[error("Failed to execute {statement} with params {params}: {source}")]
    Write {
        statement: String,
        params: String,
        #[source]
        source: BoxError,
    },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table} at batch {batch}: {message}")]
    Transfer {
        table: String,
        batch: usize,
        message: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, batch: usize, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            batch,
            message: message.into(),
        }
    }

    /// Create an InvalidRow error
    pub fn invalid_row(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::InvalidRow {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Io(_) => 2,
            MigrateError::Source(_) | MigrateError::SourceQuery { .. } => 3,
            MigrateError::Target(_) | MigrateError::Pool { .. } | MigrateError::Write { .. } => 4,
            MigrateError::Transfer { .. } | MigrateError::InvalidRow { .. } => 5,
            MigrateError::Cancelled => 130,
            MigrateError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_names_table_and_batch() {
        let err = MigrateError::transfer("genre", 3, "boom");
        assert_eq!(
            err.to_string(),
            "Transfer failed for table genre at batch 3: boom"
        );
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_format_detailed_includes_cause_chain() {
        let err = MigrateError::SourceQuery {
            table: "person".into(),
            source: rusqlite::Error::InvalidQuery,
        };
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Source read failed for table person"));
        assert!(detailed.contains("Caused by:"));
    }

    #[test]
    fn test_write_error_names_statement_and_params() {
        let err = MigrateError::Write {
            statement: "INSERT INTO \"content\".\"genre\" (\"id\") VALUES ($1)".into(),
            params: "[Text(\"not-a-uuid\")]".into(),
            source: "invalid input syntax for type uuid".into(),
        };
        let message = err.to_string();
        assert!(message.contains("INSERT INTO \"content\".\"genre\""));
        assert!(message.contains("not-a-uuid"));
        assert!(message.ends_with("invalid input syntax for type uuid"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_config_error_exit_code() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 2);
        assert_eq!(MigrateError::Cancelled.exit_code(), 130);
    }
}
