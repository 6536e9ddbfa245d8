// JSON codec: pretty-printed array of flat objects
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::{Record, RowSet};
use crate::state::{DbError, DbResult};

/// One row serialized as an object whose keys keep column order
struct OrderedRow<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (index, column) in self.columns.iter().enumerate() {
            map.serialize_entry(column, self.values.get(index).unwrap_or(&Value::Null))?;
        }
        map.end()
    }
}

pub fn encode(rows: &RowSet) -> DbResult<String> {
    let ordered: Vec<OrderedRow> = rows
        .rows
        .iter()
        .map(|values| OrderedRow {
            columns: &rows.columns,
            values,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&ordered)?)
}

/// Parse a top-level array of objects
pub fn decode(content: &str) -> DbResult<Vec<Record>> {
    let value: Value = serde_json::from_str(content.trim_start_matches('\u{feff}'))
        .map_err(|e| DbError::Format(format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        _ => return Err(DbError::Format("expected a top-level JSON array".to_string())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(DbError::Format(format!("element {} is not an object", index))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_keeps_column_order_and_numbers() {
        let rows = RowSet {
            columns: vec!["title".to_string(), "size".to_string(), "id".to_string()],
            rows: vec![vec![json!("Login"), json!(3), Value::Null]],
        };
        assert_eq!(
            encode(&rows).unwrap(),
            "[\n  {\n    \"title\": \"Login\",\n    \"size\": 3,\n    \"id\": null\n  }\n]"
        );
    }

    #[test]
    fn test_encode_empty() {
        let rows = RowSet {
            columns: vec!["title".to_string()],
            rows: Vec::new(),
        };
        assert_eq!(encode(&rows).unwrap(), "[]");
    }

    #[test]
    fn test_decode_requires_array() {
        assert!(matches!(decode(r#"{"title": "A"}"#), Err(DbError::Format(_))));
        assert!(matches!(decode("not json"), Err(DbError::Format(_))));
        assert!(matches!(decode("[1, 2]"), Err(DbError::Format(_))));
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_records() {
        let records = decode(r#"[{"title": "A", "steps": [{"action": "x"}]}]"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["title"], json!("A"));
    }
}
