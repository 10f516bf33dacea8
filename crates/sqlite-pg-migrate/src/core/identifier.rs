//! Identifier validation and quoting for dynamically built SQL.
//!
//! Table, schema and column names cannot be bound as statement parameters,
//! only values can. Every identifier that ends up in generated SQL (on
//! either side of the migration) goes through this module: it is validated
//! for suspicious content, wrapped in double quotes, and embedded quotes are
//! doubled. Both SQLite and PostgreSQL use the same quoting rules.

use crate::error::{MigrateError, Result};

/// Maximum identifier length (PostgreSQL truncates at 63 bytes).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers longer than PostgreSQL allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier for PostgreSQL or SQLite.
///
/// ```ignore
/// assert_eq!(quote_ident("genre")?, "\"genre\"");
/// assert_eq!(quote_ident("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a table name with its schema: `"schema"."table"`.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_simple() {
        assert_eq!(quote_ident("film_work").unwrap(), "\"film_work\"");
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(
            quote_ident("x\"; DROP TABLE genre; --").unwrap(),
            "\"x\"\"; DROP TABLE genre; --\""
        );
    }

    #[test]
    fn test_qualify() {
        assert_eq!(
            qualify("content", "person_film_work").unwrap(),
            "\"content\".\"person_film_work\""
        );
    }

    #[test]
    fn test_rejects_empty_null_and_long() {
        assert!(quote_ident("").is_err());
        assert!(quote_ident("gen\0re").is_err());
        assert!(quote_ident(&"a".repeat(64)).is_err());
        assert!(quote_ident(&"a".repeat(63)).is_ok());
    }
}
