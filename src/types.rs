/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored record: a flat JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Identity field carried by every stored record
pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Write operations flowing through services and the observer pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Read the identity of a document
pub fn doc_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Read a string field of a document
pub fn doc_str<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

/// Convert an arbitrary JSON payload into a document, rejecting non-objects
pub fn into_document(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Turn an f64 into a JSON number, preferring an integer representation
/// when the value has no fractional part.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_value_prefers_integers() {
        assert_eq!(number_value(10000.0), json!(10000));
        assert_eq!(number_value(7.5), json!(7.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn into_document_rejects_arrays() {
        assert!(into_document(json!([1, 2])).is_none());
        assert!(into_document(json!({ "a": 1 })).is_some());
    }
}
