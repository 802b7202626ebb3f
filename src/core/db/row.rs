/// Row Module
///
/// Named result rows shared by every driver.
use super::value::{FromValue, Value};
use crate::core::{DbError, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// One result row: column names in cursor description order, paired with values.
///
/// Column names are shared via `Arc` by every row of the same result set.
/// Duplicate names are kept as-is; a lookup by name returns the last column
/// carrying that name.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl RowRecord {
    /// Creates a record; `values` must line up with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        RowRecord { columns, values }
    }

    /// Builds a standalone record from name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        RowRecord::new(columns.into(), values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names in result-set order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in result-set order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Value at a column position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value for a column name, or `None` if the row has no such column.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|c| c == name)
            .map(|i| &self.values[i])
    }

    /// Like [`RowRecord::get`], but a missing column is an error.
    pub fn try_get(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| DbError::FieldNotFound(name.to_string()))
    }

    /// Looks up a column and converts it to `T`.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.try_get(name)?)
    }

    /// Iterates `(column, value)` pairs in result-set order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl<'a> IntoIterator for &'a RowRecord {
    type Item = (&'a str, &'a Value);
    type IntoIter = std::iter::Zip<
        std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>,
        std::slice::Iter<'a, Value>,
    >;

    fn into_iter(self) -> Self::IntoIter {
        let as_str: fn(&'a String) -> &'a str = String::as_str;
        self.columns.iter().map(as_str).zip(self.values.iter())
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let row = RowRecord::from_pairs([("loginName", Value::from("eva")), ("id", Value::from(7))]);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("loginName"), Some(&Value::Text("eva".into())));
        assert_eq!(row.get_as::<i64>("id").unwrap(), 7);
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let row = RowRecord::from_pairs([("a", 1)]);
        match row.try_get("b") {
            Err(DbError::FieldNotFound(name)) => assert_eq!(name, "b"),
            other => panic!("Expected FieldNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_column_names_last_wins() {
        let row = RowRecord::from_pairs([("id", 1), ("name", 2), ("id", 3)]);

        assert_eq!(row.columns(), &["id", "name", "id"]);
        assert_eq!(row.get("id"), Some(&Value::Integer(3)));
        assert_eq!(row.get_index(0), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let row = RowRecord::from_pairs([("z", Value::from(1)), ("a", Value::Null)]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"z":1,"a":null}"#);
    }

    #[test]
    fn test_iteration_order() {
        let row = RowRecord::from_pairs([("b", 2), ("a", 1)]);
        let names: Vec<&str> = (&row).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
