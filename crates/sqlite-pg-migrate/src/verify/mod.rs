//! Field-level comparison of source rows against the destination.
//!
//! Values are compared after normalization: timestamps at one-second
//! resolution regardless of offset, UUIDs by value whether stored as text
//! or natively, and dates and floats by value.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::{parse_date, parse_timestamp, Row, SqlValue};

/// Differences kept for display per table.
const MAX_REPORTED: usize = 10;

/// Running result of comparing one table, batch by batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldComparison {
    /// Source rows looked up at the destination.
    pub rows_compared: u64,

    /// Rows missing at the destination or with at least one differing field.
    pub rows_mismatched: u64,

    /// The first differences found, one line per row.
    pub mismatches: Vec<String>,
}

impl FieldComparison {
    /// Compare one source batch against the destination rows fetched for
    /// its keys.
    pub fn add_batch(&mut self, source: &[Row], target: &[Row], key: &str) {
        let stored: HashMap<String, &Row> = target
            .iter()
            .filter_map(|row| Some((row.get(key)?.key_text()?, row)))
            .collect();

        for row in source {
            self.rows_compared += 1;
            let Some(id) = row.get(key).and_then(SqlValue::key_text) else {
                self.record(format!("row without a {} value", key));
                continue;
            };
            let Some(found) = stored.get(&id) else {
                self.record(format!("{}={}: missing at destination", key, id));
                continue;
            };

            let differing: Vec<&str> = row
                .iter()
                .filter(|(column, value)| {
                    !found
                        .get(column)
                        .is_some_and(|stored| values_match(value, stored))
                })
                .map(|(column, _)| column)
                .collect();
            if !differing.is_empty() {
                self.record(format!("{}={}: {} differ", key, id, differing.join(", ")));
            }
        }
    }

    /// True when every compared row matched.
    pub fn is_clean(&self) -> bool {
        self.rows_mismatched == 0
    }

    fn record(&mut self, mismatch: String) {
        self.rows_mismatched += 1;
        if self.mismatches.len() < MAX_REPORTED {
            self.mismatches.push(mismatch);
        }
    }
}

/// Whether a source value and the stored value are the same datum.
pub fn values_match(source: &SqlValue, stored: &SqlValue) -> bool {
    match (source, stored) {
        (SqlValue::DateTimeOffset(a), SqlValue::DateTimeOffset(b)) => a.timestamp() == b.timestamp(),
        (SqlValue::DateTimeOffset(a), SqlValue::DateTime(b))
        | (SqlValue::DateTime(b), SqlValue::DateTimeOffset(a)) => {
            a.timestamp() == b.and_utc().timestamp()
        }
        (SqlValue::DateTime(a), SqlValue::DateTime(b)) => {
            a.and_utc().timestamp() == b.and_utc().timestamp()
        }
        (SqlValue::Text(s), SqlValue::DateTimeOffset(b))
        | (SqlValue::DateTimeOffset(b), SqlValue::Text(s)) => {
            parse_timestamp(s).is_some_and(|a| a.timestamp() == b.timestamp())
        }
        (SqlValue::Text(s), SqlValue::Date(d)) | (SqlValue::Date(d), SqlValue::Text(s)) => {
            parse_date(s) == Some(*d)
        }
        (SqlValue::Text(s), SqlValue::Uuid(u)) | (SqlValue::Uuid(u), SqlValue::Text(s)) => {
            uuid::Uuid::parse_str(s.trim()).is_ok_and(|parsed| parsed == *u)
        }
        (SqlValue::I64(i), SqlValue::F64(f)) | (SqlValue::F64(f), SqlValue::I64(i)) => {
            *i as f64 == *f
        }
        _ => source == stored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ts(s: &str) -> SqlValue {
        SqlValue::DateTimeOffset(parse_timestamp(s).unwrap())
    }

    #[test]
    fn test_timestamps_compare_at_second_resolution() {
        assert!(values_match(
            &ts("2021-06-16 20:14:09.221838+00"),
            &ts("2021-06-16 20:14:09+00")
        ));
        assert!(values_match(
            &ts("2021-06-16 20:14:09.9+00"),
            &ts("2021-06-16 23:14:09+03")
        ));
        assert!(!values_match(
            &ts("2021-06-16 20:14:09+00"),
            &ts("2021-06-16 20:14:10+00")
        ));
    }

    #[test]
    fn test_uuid_text_matches_native_uuid() {
        let id = Uuid::new_v4();
        assert!(values_match(&SqlValue::from(id.to_string()), &SqlValue::Uuid(id)));
        assert!(!values_match(&SqlValue::from("not-a-uuid"), &SqlValue::Uuid(id)));
    }

    #[test]
    fn test_null_only_matches_null() {
        assert!(values_match(&SqlValue::Null, &SqlValue::Null));
        assert!(!values_match(&SqlValue::Null, &SqlValue::from("")));
    }

    #[test]
    fn test_comparison_reports_missing_and_differing_rows() {
        let source: Vec<Row> = ["a", "b", "c"]
            .iter()
            .map(|id| {
                [("id", SqlValue::from(*id)), ("name", SqlValue::from("Drama"))]
                    .into_iter()
                    .collect()
            })
            .collect();
        let target: Vec<Row> = vec![
            [("id", SqlValue::from("a")), ("name", SqlValue::from("Drama"))]
                .into_iter()
                .collect(),
            [("id", SqlValue::from("b")), ("name", SqlValue::from("Comedy"))]
                .into_iter()
                .collect(),
        ];

        let mut comparison = FieldComparison::default();
        comparison.add_batch(&source, &target, "id");

        assert_eq!(comparison.rows_compared, 3);
        assert_eq!(comparison.rows_mismatched, 2);
        assert_eq!(
            comparison.mismatches,
            vec![
                "id=b: name differ".to_string(),
                "id=c: missing at destination".to_string()
            ]
        );
        assert!(!comparison.is_clean());
    }
}
