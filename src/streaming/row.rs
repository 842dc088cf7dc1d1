//! Row materialization
//!
//! A `Row` is the externally visible form of a data record: either the
//! positional field list, or header names paired with values by ordinal.

use std::collections::HashSet;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::tokenizer::Record;

/// A decoded data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// Positional field values (header mode off)
    Fields(Vec<String>),
    /// Column name to value, in column order. `None` marks a missing field.
    Named(Vec<(String, Option<String>)>),
}

impl Row {
    /// Pair a record's fields with header names.
    ///
    /// Short records are padded with `None`. Fields beyond the header are
    /// kept under their 0-based ordinal rendered as a decimal key. Keys are
    /// unique within the row, see [`column_keys`].
    pub fn named(headers: &[String], record: &Record) -> Self {
        let values = record.to_strings();
        let width = headers.len().max(values.len());
        let mut values = values.into_iter();

        let pairs = column_keys(headers, width)
            .into_iter()
            .map(|key| (key, values.next()))
            .collect();

        Row::Named(pairs)
    }

    pub fn positional(record: &Record) -> Self {
        Row::Fields(record.to_strings())
    }

    /// Value under column `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Row::Fields(_) => None,
            Row::Named(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.as_deref()),
        }
    }

    /// Value at ordinal `index`
    pub fn field(&self, index: usize) -> Option<&str> {
        match self {
            Row::Fields(fields) => fields.get(index).map(String::as_str),
            Row::Named(pairs) => pairs.get(index).and_then(|(_, v)| v.as_deref()),
        }
    }

    /// Number of positions, including padded ones
    pub fn len(&self) -> usize {
        match self {
            Row::Fields(fields) => fields.len(),
            Row::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in column order; missing fields become empty strings
    pub fn values(&self) -> Vec<&str> {
        match self {
            Row::Fields(fields) => fields.iter().map(String::as_str).collect(),
            Row::Named(pairs) => pairs
                .iter()
                .map(|(_, v)| v.as_deref().unwrap_or(""))
                .collect(),
        }
    }

    /// True when every present value is whitespace
    pub fn is_blank(&self) -> bool {
        self.values().iter().all(|v| v.trim().is_empty())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Row::Fields(fields) => {
                let mut seq = serializer.serialize_seq(Some(fields.len()))?;
                for field in fields {
                    seq.serialize_element(field)?;
                }
                seq.end()
            }
            Row::Named(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Unique keys for the first `width` columns.
///
/// Columns past the header use their 0-based ordinal. A key already taken by
/// an earlier column gets `_{ordinal}` appended until it is free, so
/// `a,a` becomes `a,a_1` and an extra third field under header `2,b` is keyed
/// `2_2`.
pub fn column_keys(headers: &[String], width: usize) -> Vec<String> {
    let mut taken = HashSet::with_capacity(width);

    (0..width)
        .map(|i| {
            let mut key = headers.get(i).cloned().unwrap_or_else(|| i.to_string());
            while taken.contains(&key) {
                key = format!("{}_{}", key, i);
            }
            taken.insert(key.clone());
            key
        })
        .collect()
}

/// Normalize a header name: trim, lowercase, non-alphanumerics to `_`
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_named_exact_width() {
        let row = Row::named(&headers(&["a", "b"]), &Record::from_fields(["1", "2"]));
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("b"), Some("2"));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_named_short_row_padded() {
        let row = Row::named(&headers(&["a", "b", "c"]), &Record::from_fields(["x", "y"]));
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("c"), None);
        assert_eq!(
            row,
            Row::Named(vec![
                ("a".to_string(), Some("x".to_string())),
                ("b".to_string(), Some("y".to_string())),
                ("c".to_string(), None),
            ])
        );
    }

    #[test]
    fn test_named_long_row_keeps_extras() {
        let row = Row::named(&headers(&["a"]), &Record::from_fields(["1", "2", "3"]));
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("1"), Some("2"));
        assert_eq!(row.get("2"), Some("3"));
    }

    #[test]
    fn test_extra_key_never_shadows_header() {
        let row = Row::named(&headers(&["2", "b"]), &Record::from_fields(["x", "y", "z"]));
        assert_eq!(row.get("2"), Some("x"));
        assert_eq!(row.get("2_2"), Some("z"));

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"2":"x","b":"y","2_2":"z"}"#);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_headers_get_distinct_keys() {
        let row = Row::named(&headers(&["a", "a"]), &Record::from_fields(["1", "2"]));
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("a_1"), Some("2"));

        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&row).unwrap()).unwrap();
        assert_eq!(parsed, serde_json::json!({"a": "1", "a_1": "2"}));
    }

    #[test]
    fn test_column_keys() {
        assert_eq!(column_keys(&headers(&["a", "b"]), 3), ["a", "b", "2"]);
        assert_eq!(column_keys(&headers(&["a", "a", "a_1"]), 3), ["a", "a_1", "a_1_2"]);
        assert!(column_keys(&[], 0).is_empty());
    }

    #[test]
    fn test_positional_access() {
        let row = Row::positional(&Record::from_fields(["p", "q"]));
        assert_eq!(row.field(1), Some("q"));
        assert_eq!(row.get("p"), None);
        assert_eq!(row.values(), vec!["p", "q"]);
    }

    #[test]
    fn test_blank_detection() {
        assert!(Row::positional(&Record::from_fields([" ", ""])).is_blank());
        assert!(!Row::positional(&Record::from_fields([" ", "x"])).is_blank());
    }

    #[test]
    fn test_serialization_preserves_order() {
        let row = Row::named(&headers(&["z", "a"]), &Record::from_fields(["1"]));
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"z":"1","a":null}"#);

        let row = Row::positional(&Record::from_fields(["1", "2"]));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"["1","2"]"#);
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  First Name "), "first_name");
        assert_eq!(normalize_header("Amount ($)"), "amount____");
        assert_eq!(normalize_header("user_id"), "user_id");
    }
}
