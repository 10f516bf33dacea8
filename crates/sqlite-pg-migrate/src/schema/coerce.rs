//! Per-field value coercion.

use chrono::DateTime;
use uuid::Uuid;

use super::{FieldDefault, FieldSpec, FieldType};
use crate::core::{parse_date, parse_timestamp, SqlValue};

/// Coerce one field of a raw row.
///
/// `Ok(None)` means the field is left out of the shaped row: it was not
/// selected from the source and has no default.
pub(super) fn field_value(
    field: &FieldSpec,
    raw: Option<&SqlValue>,
) -> Result<Option<SqlValue>, String> {
    match raw {
        None | Some(SqlValue::Null) => match field.default {
            FieldDefault::GenerateUuid => Ok(Some(SqlValue::Uuid(Uuid::new_v4()))),
            FieldDefault::Float(v) => Ok(Some(SqlValue::F64(v))),
            FieldDefault::None if field.required => {
                Err(format!("required field '{}' is missing or NULL", field.name))
            }
            FieldDefault::None => Ok(raw.cloned()),
        },
        Some(value) => convert(field.ty, value).map(Some).ok_or_else(|| {
            format!(
                "field '{}' expects {:?}, got {} value {:?}",
                field.name,
                field.ty,
                value.kind(),
                value
            )
        }),
    }
}

fn convert(ty: FieldType, value: &SqlValue) -> Option<SqlValue> {
    match (ty, value) {
        (FieldType::Uuid, SqlValue::Uuid(u)) => Some(SqlValue::Uuid(*u)),
        (FieldType::Uuid, SqlValue::Text(s)) => Uuid::parse_str(s.trim()).ok().map(SqlValue::Uuid),
        (FieldType::Uuid, SqlValue::Bytes(b)) => Uuid::from_slice(b).ok().map(SqlValue::Uuid),

        (FieldType::Text, SqlValue::Text(s)) => Some(SqlValue::Text(s.clone())),
        (FieldType::Text, SqlValue::I64(v)) => Some(SqlValue::Text(v.to_string())),
        (FieldType::Text, SqlValue::F64(v)) => Some(SqlValue::Text(v.to_string())),
        (FieldType::Text, SqlValue::Uuid(u)) => Some(SqlValue::Text(u.to_string())),
        (FieldType::Text, SqlValue::Bytes(b)) => {
            String::from_utf8(b.clone()).ok().map(SqlValue::Text)
        }

        (FieldType::Float, SqlValue::F64(v)) => Some(SqlValue::F64(*v)),
        (FieldType::Float, SqlValue::I64(v)) => Some(SqlValue::F64(*v as f64)),
        (FieldType::Float, SqlValue::Text(s)) => s.trim().parse().ok().map(SqlValue::F64),

        (FieldType::Date, SqlValue::Date(d)) => Some(SqlValue::Date(*d)),
        (FieldType::Date, SqlValue::DateTime(dt)) => Some(SqlValue::Date(dt.date())),
        (FieldType::Date, SqlValue::DateTimeOffset(dt)) => Some(SqlValue::Date(dt.date_naive())),
        (FieldType::Date, SqlValue::Text(s)) => parse_date(s).map(SqlValue::Date),

        (FieldType::Timestamp, SqlValue::DateTimeOffset(dt)) => {
            Some(SqlValue::DateTimeOffset(*dt))
        }
        (FieldType::Timestamp, SqlValue::DateTime(dt)) => {
            Some(SqlValue::DateTimeOffset(dt.and_utc().fixed_offset()))
        }
        (FieldType::Timestamp, SqlValue::Text(s)) => {
            parse_timestamp(s).map(SqlValue::DateTimeOffset)
        }
        // Unix epoch seconds
        (FieldType::Timestamp, SqlValue::I64(secs)) => DateTime::from_timestamp(*secs, 0)
            .map(|dt| SqlValue::DateTimeOffset(dt.fixed_offset())),

        _ => None,
    }
}
