//! Ordered row-mappings.

use indexmap::IndexMap;

use super::value::SqlValue;

/// One source row: an ordered mapping of column name to value.
///
/// Column names and values live in the same map, so an insert statement's
/// column list and its parameter list are always built from one snapshot
/// and cannot drift apart positionally. There are no mutators; a row is
/// built once from an iterator and then only read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: IndexMap<String, SqlValue>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells.get(column)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.cells.values()
    }

    /// `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_column_order() {
        let row: Row = [
            ("name", SqlValue::from("Comedy")),
            ("id", SqlValue::from("b92ef010-5e4c-4fd0-99d6-41b6456272cd")),
            ("description", SqlValue::Null),
        ]
        .into_iter()
        .collect();

        assert_eq!(row.columns().collect::<Vec<_>>(), ["name", "id", "description"]);
        assert_eq!(row.values().next(), Some(&SqlValue::from("Comedy")));
        assert_eq!(row.get("description"), Some(&SqlValue::Null));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_empty_row() {
        let row = Row::new();
        assert!(row.is_empty());
        assert_eq!(row.columns().count(), 0);
    }

    #[test]
    fn test_duplicate_column_keeps_last_value_in_first_position() {
        let row: Row = [
            ("id", SqlValue::I64(1)),
            ("name", SqlValue::from("a")),
            ("id", SqlValue::I64(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(row.columns().collect::<Vec<_>>(), ["id", "name"]);
        assert_eq!(row.get("id"), Some(&SqlValue::I64(2)));
    }
}
