//! SQL value types for moving cells from SQLite into PostgreSQL.
//!
//! SQLite stores most of the movie catalogue as TEXT (UUIDs, timestamps,
//! dates), while the destination columns are strongly typed. [`SqlValue`]
//! implements [`ToSql`] by looking at the parameter type the server inferred
//! for the column and converting the value to it, so a row can be inserted
//! unchanged whether or not it went through schema coercion.

use bytes::BytesMut;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use uuid::Uuid;

use crate::error::BoxError;


/// Timestamp layouts with an explicit offset, tried in order.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Timestamp layouts without an offset; parsed values are taken as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL. The destination type is inferred by the server.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 64-bit signed integer (SQLite INTEGER).
    I64(i64),

    /// 64-bit floating point (SQLite REAL).
    F64(f64),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID value.
    Uuid(Uuid),

    /// Date without time component.
    Date(NaiveDate),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),
}

impl SqlValue {
    /// Convert a raw SQLite value, keeping its storage class.
    pub fn from_sqlite(value: ValueRef<'_>) -> std::result::Result<Self, std::str::Utf8Error> {
        Ok(match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::I64(v),
            ValueRef::Real(v) => SqlValue::F64(v),
            ValueRef::Text(bytes) => SqlValue::Text(std::str::from_utf8(bytes)?.to_string()),
            ValueRef::Blob(bytes) => SqlValue::Bytes(bytes.to_vec()),
        })
    }

    /// Read column `idx` of a PostgreSQL result row.
    ///
    /// NULLs and types outside the catalogue's column set come back as
    /// [`SqlValue::Null`] and text respectively.
    pub fn from_pg(row: &tokio_postgres::Row, idx: usize) -> Self {
        let ty = row.columns()[idx].type_();
        let value = match *ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(idx).ok().flatten().map(SqlValue::Bool),
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .ok()
                .flatten()
                .map(|v| SqlValue::I64(v.into())),
            Type::INT4 => row
                .try_get::<_, Option<i32>>(idx)
                .ok()
                .flatten()
                .map(|v| SqlValue::I64(v.into())),
            Type::INT8 => row.try_get::<_, Option<i64>>(idx).ok().flatten().map(SqlValue::I64),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .ok()
                .flatten()
                .map(|v| SqlValue::F64(v.into())),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).ok().flatten().map(SqlValue::F64),
            Type::UUID => row.try_get::<_, Option<Uuid>>(idx).ok().flatten().map(SqlValue::Uuid),
            Type::DATE => row
                .try_get::<_, Option<NaiveDate>>(idx)
                .ok()
                .flatten()
                .map(SqlValue::Date),
            Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(idx)
                .ok()
                .flatten()
                .map(SqlValue::DateTime),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<FixedOffset>>>(idx)
                .ok()
                .flatten()
                .map(SqlValue::DateTimeOffset),
            Type::BYTEA => row
                .try_get::<_, Option<Vec<u8>>>(idx)
                .ok()
                .flatten()
                .map(SqlValue::Bytes),
            _ => row
                .try_get::<_, Option<String>>(idx)
                .ok()
                .flatten()
                .map(SqlValue::Text),
        };
        value.unwrap_or(SqlValue::Null)
    }

    /// Text form of a key value (`id` and friends), if it has one.
    pub fn key_text(&self) -> Option<String> {
        match self {
            SqlValue::Uuid(u) => Some(u.to_string()),
            SqlValue::Text(s) => Some(s.trim().to_string()),
            SqlValue::I64(v) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::I64(_) => "integer",
            SqlValue::F64(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "blob",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Date(_) => "date",
            SqlValue::DateTime(_) => "timestamp",
            SqlValue::DateTimeOffset(_) => "timestamptz",
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Parse a timestamp as written by SQLite or an ISO 8601 producer.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.ffffff][+HH[:MM]]`, the `T`-separated form
/// and RFC 3339. Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    None
}

/// Parse a calendar date, also accepting a full timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|dt| dt.date_naive()))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "yes" | "y" | "on" => Some(true),
        "f" | "false" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn conversion_error(value: &str, ty: &Type) -> BoxError {
    format!("cannot convert {:?} to {}", value, ty).into()
}

/// Encode text into whatever type the destination column has.
fn encode_text(s: &str, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::UUID => Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamp(s)
            .ok_or_else(|| conversion_error(s, ty))?
            .to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)
            .ok_or_else(|| conversion_error(s, ty))?
            .naive_utc()
            .to_sql(ty, out),
        Type::DATE => parse_date(s)
            .ok_or_else(|| conversion_error(s, ty))?
            .to_sql(ty, out),
        Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::BOOL => parse_bool(s)
            .ok_or_else(|| conversion_error(s, ty))?
            .to_sql(ty, out),
        _ if <&str as ToSql>::accepts(ty) => s.to_sql(ty, out),
        _ => Err(conversion_error(s, ty)),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => match *ty {
                Type::BOOL => v.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => SqlValue::I64(i64::from(*v)).to_sql(ty, out),
                _ => encode_text(&v.to_string(), ty, out),
            },
            SqlValue::I64(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::INT8 => v.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                Type::BOOL => (*v != 0).to_sql(ty, out),
                _ => encode_text(&v.to_string(), ty, out),
            },
            SqlValue::F64(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => v.to_sql(ty, out),
                _ => encode_text(&v.to_string(), ty, out),
            },
            SqlValue::Text(s) => encode_text(s, ty, out),
            SqlValue::Bytes(b) => match *ty {
                Type::BYTEA => b.as_slice().to_sql(ty, out),
                _ => encode_text(std::str::from_utf8(b)?, ty, out),
            },
            SqlValue::Uuid(u) => match *ty {
                Type::UUID => u.to_sql(ty, out),
                _ => encode_text(&u.to_string(), ty, out),
            },
            SqlValue::Date(d) => match *ty {
                Type::DATE => d.to_sql(ty, out),
                _ => encode_text(&d.format("%Y-%m-%d").to_string(), ty, out),
            },
            SqlValue::DateTime(dt) => match *ty {
                Type::TIMESTAMP => dt.to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ => encode_text(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(), ty, out),
            },
            SqlValue::DateTimeOffset(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.to_sql(ty, out),
                Type::TIMESTAMP => dt.naive_utc().to_sql(ty, out),
                Type::DATE => dt.date_naive().to_sql(ty, out),
                _ => encode_text(&dt.to_rfc3339(), ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
