//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// Build a tokio-postgres configuration.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        if !self.password.is_empty() {
            pg_config.password(&self.password);
        }
        pg_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
source:
  path: db.sqlite
target:
  host: 127.0.0.1
  database: movies_database
  user: app
  password: 123qwe
"#;

    #[test]
    fn test_minimal_yaml_applies_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.source.r#type, "sqlite");
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "content");
        assert_eq!(config.target.conflict_column, "id");
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.migration.batch_size, 10);
        assert_eq!(config.migration.column_mode, ColumnMode::Schema);
        assert_eq!(config.migration.selected_kinds(), EntityKind::ALL.to_vec());
    }

    #[test]
    fn test_batch_size_overrides() {
        let yaml = format!(
            "{}migration:\n  batch_size: 100\n  batch_sizes:\n    person_film_work: 500\n",
            MINIMAL
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.migration.batch_size_for("genre"), 100);
        assert_eq!(config.migration.batch_size_for("person_film_work"), 500);
    }

    #[test]
    fn test_selected_kinds_keep_dependency_order() {
        let yaml = format!(
            "{}migration:\n  tables: [person_film_work, film_work, person]\n  column_mode: all\n",
            MINIMAL
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(
            config.migration.selected_kinds(),
            vec![
                EntityKind::FilmWork,
                EntityKind::Person,
                EntityKind::PersonFilmWork
            ]
        );
        assert_eq!(config.migration.column_mode, ColumnMode::All);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.target.database, "movies_database");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, crate::error::MigrateError::Io(_)));
    }

    #[test]
    fn test_missing_required_field_is_yaml_error() {
        let err = Config::from_yaml("source:\n  path: db.sqlite\n").unwrap_err();
        assert!(matches!(err, crate::error::MigrateError::Yaml(_)));
    }
}
