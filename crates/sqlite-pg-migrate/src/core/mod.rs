//! Core value types shared by the source reader and the target writer.
//!
//! - [`value`]: the [`SqlValue`] cell type and its PostgreSQL encoding
//! - [`row`]: the ordered [`Row`] mapping that flows through the pipeline
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod row;
pub mod value;

pub use row::Row;
pub use value::{parse_date, parse_timestamp, SqlValue};

/// A bounded, ordered list of rows fetched and written in one round trip.
pub type Batch = Vec<Row>;
