use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::filter_where::{compare_values, validate_field_name, FilterWhere};
use super::types::{SortDirection, SortKey};
use crate::types::{Document, ID_FIELD};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse `sort=a,-b`: ascending by `a`, then descending by `b`
    pub fn parse(spec: &str) -> Result<Vec<SortKey>, FilterError> {
        let mut out = Vec::new();
        for part in spec.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (field, direction) = match trimmed.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (trimmed, SortDirection::Asc),
            };
            validate_field_name(field)?;
            out.push(SortKey { field: field.to_string(), direction });
        }
        Ok(out)
    }

    /// Append the identity tie-break so equal sort values page deterministically
    pub fn with_tie_break(mut keys: Vec<SortKey>) -> Vec<SortKey> {
        if !keys.iter().any(|k| k.field == ID_FIELD) {
            keys.push(SortKey::asc(ID_FIELD));
        }
        keys
    }

    pub fn generate(keys: &[SortKey]) -> Result<String, FilterError> {
        if keys.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            validate_field_name(&key.field)?;
            let nulls = match key.direction {
                SortDirection::Asc => "NULLS FIRST",
                SortDirection::Desc => "NULLS LAST",
            };
            parts.push(format!(
                "{} {} {}",
                FilterWhere::json_field(&key.field),
                key.direction.to_sql(),
                nulls
            ));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// Compare two documents by the sort keys. Missing values sort lowest.
    pub fn compare(keys: &[SortKey], a: &Document, b: &Document) -> Ordering {
        for key in keys {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            let ordering = total_order(left, right);
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn total_order(a: &Value, b: &Value) -> Ordering {
    compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}
