//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::schema::EntityKind;
use crate::target::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.r#type != "sqlite" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'sqlite', got '{}'",
            config.source.r#type
        )));
    }
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }
    if config.target.schema.is_empty() {
        return Err(MigrateError::Config("target.schema cannot be empty".into()));
    }
    if config.target.conflict_column.is_empty() {
        return Err(MigrateError::Config(
            "target.conflict_column cannot be empty".into(),
        ));
    }
    SslMode::parse(&config.target.ssl_mode)?;

    // Migration validation
    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    for (table, size) in &config.migration.batch_sizes {
        if EntityKind::from_table(table).is_none() {
            return Err(MigrateError::Config(format!(
                "migration.batch_sizes: unknown table '{}'",
                table
            )));
        }
        if *size == 0 {
            return Err(MigrateError::Config(format!(
                "migration.batch_sizes.{} must be at least 1",
                table
            )));
        }
    }
    for table in &config.migration.tables {
        if EntityKind::from_table(table).is_none() {
            return Err(MigrateError::Config(format!(
                "migration.tables: unknown table '{}'",
                table
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                r#type: "sqlite".to_string(),
                path: "db.sqlite".into(),
            },
            target: TargetConfig {
                r#type: "postgres".to_string(),
                host: "127.0.0.1".to_string(),
                port: 5432,
                database: "movies_database".to_string(),
                user: "app".to_string(),
                password: "password".to_string(),
                schema: "content".to_string(),
                conflict_column: "id".to_string(),
                ssl_mode: "disable".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_path() {
        let mut config = valid_config();
        config.source.path = "".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_source_type() {
        let mut config = valid_config();
        config.source.r#type = "mssql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_target_type() {
        let mut config = valid_config();
        config.target.r#type = "mysql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_batch_size_override_for_unknown_table_rejected() {
        let mut config = valid_config();
        config.migration.batch_sizes.insert("movies".into(), 50);
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.migration.batch_sizes.insert("genre".into(), 0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_table_selection_rejected() {
        let mut config = valid_config();
        config.migration.tables = vec!["genre".into(), "studio".into()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode_rejected() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
