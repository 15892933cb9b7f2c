use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::types::{Condition, FilterOp, FilterSet};
use crate::types::Document;

/// Parse one query-string key into its field and optional bracket operator.
///
/// `tuition` -> (`tuition`, None), `tuition[gte]` -> (`tuition`, Some(Gte)).
/// Only the key is inspected; values are never scanned for operator keywords.
pub fn parse_key(key: &str) -> Result<(String, Option<FilterOp>), FilterError> {
    let Some(open) = key.find('[') else {
        validate_field_name(key)?;
        return Ok((key.to_string(), None));
    };

    let field = &key[..open];
    let op = key[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| FilterError::MalformedKey(key.to_string()))?;
    if op.is_empty() || op.contains('[') || op.contains(']') {
        return Err(FilterError::MalformedKey(key.to_string()));
    }

    validate_field_name(field)?;
    let op = FilterOp::from_suffix(op).ok_or_else(|| FilterError::UnsupportedOperator {
        field: field.to_string(),
        op: op.to_string(),
    })?;
    Ok((field.to_string(), Some(op)))
}

/// Field names are plain identifiers; they are inlined into SQL as jsonb keys.
pub fn validate_field_name(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidField(name.to_string()));
    }
    Ok(())
}

/// Compiles a `FilterSet` to a jsonb WHERE fragment, or evaluates it in memory
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Generate a WHERE fragment against the `data` jsonb column. Placeholders
    /// continue numbering after `starting_param_index`.
    pub fn generate(filter: &FilterSet, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut sql_conditions = Vec::with_capacity(filter.conditions.len());
        for condition in &filter.conditions {
            sql_conditions.push(filter_where.build_sql_condition(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        Ok((where_clause, filter_where.param_values))
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> Result<String, FilterError> {
        validate_field_name(&condition.field)?;
        let column = Self::json_field(&condition.field);

        Ok(match condition.op {
            FilterOp::Eq => {
                if condition.value.is_null() {
                    format!("({column} IS NULL OR {column} = 'null'::jsonb)")
                } else {
                    let p = self.param(condition.value.clone());
                    format!(
                        "({column} = {p} OR (jsonb_typeof({column}) = 'array' AND {column} @> jsonb_build_array({p})))"
                    )
                }
            }
            FilterOp::Gt => format!("{} > {}", column, self.param(condition.value.clone())),
            FilterOp::Gte => format!("{} >= {}", column, self.param(condition.value.clone())),
            FilterOp::Lt => format!("{} < {}", column, self.param(condition.value.clone())),
            FilterOp::Lte => format!("{} <= {}", column, self.param(condition.value.clone())),
            FilterOp::In => match &condition.value {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(_) => {
                    let p = self.param(condition.value.clone());
                    format!(
                        "EXISTS (SELECT 1 FROM jsonb_array_elements({p}) AS v(value) WHERE {column} = v.value OR (jsonb_typeof({column}) = 'array' AND {column} @> jsonb_build_array(v.value)))"
                    )
                }
                other => {
                    return Err(FilterError::InvalidValue {
                        field: condition.field.clone(),
                        value: other.to_string(),
                    })
                }
            },
        })
    }

    pub fn json_field(field: &str) -> String {
        format!("data->'{}'", field)
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    /// Evaluate the filter against a document
    pub fn matches(filter: &FilterSet, doc: &Document) -> bool {
        filter.conditions.iter().all(|c| Self::matches_condition(c, doc))
    }

    fn matches_condition(condition: &Condition, doc: &Document) -> bool {
        let actual = doc.get(&condition.field).unwrap_or(&Value::Null);
        let ordering = || compare_values(actual, &condition.value);
        match condition.op {
            FilterOp::Eq => value_matches(actual, &condition.value),
            FilterOp::In => condition
                .value
                .as_array()
                .map(|values| values.iter().any(|v| value_matches(actual, v)))
                .unwrap_or(false),
            FilterOp::Gt => ordering() == Some(Ordering::Greater),
            FilterOp::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => ordering() == Some(Ordering::Less),
            FilterOp::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// Equality where an array-valued field matches any of its elements
fn value_matches(actual: &Value, expected: &Value) -> bool {
    if let Value::Array(items) = actual {
        if !expected.is_array() {
            return items.iter().any(|item| json_eq(item, expected));
        }
    }
    json_eq(actual, expected)
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two JSON scalars of the same type; None across types
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn parses_plain_and_bracket_keys() {
        assert_eq!(parse_key("tuition").unwrap(), ("tuition".to_string(), None));
        assert_eq!(
            parse_key("tuition[lte]").unwrap(),
            ("tuition".to_string(), Some(FilterOp::Lte))
        );
        assert_eq!(
            parse_key("careers[in]").unwrap(),
            ("careers".to_string(), Some(FilterOp::In))
        );
    }

    #[test]
    fn rejects_unknown_operators() {
        assert_eq!(
            parse_key("tuition[regex]").unwrap_err(),
            FilterError::UnsupportedOperator { field: "tuition".into(), op: "regex".into() }
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in ["tuition[", "tuition[]", "tuition[gt]x", "tuition[gt][lt]", "[gt]", "a b", "tuition]"] {
            assert!(parse_key(key).is_err(), "expected error for {key}");
        }
    }

    #[test]
    fn operator_keywords_in_field_names_are_not_operators() {
        // A field literally named `gte` stays a plain equality filter
        assert_eq!(parse_key("gte").unwrap(), ("gte".to_string(), None));
    }

    #[test]
    fn generates_parameterised_jsonb_sql() {
        let filter = FilterSet::new()
            .and(Condition::new("tuition", FilterOp::Gte, json!(1000)))
            .and(Condition::new("tuition", FilterOp::Lte, json!(5000)))
            .and(Condition::eq("bootcamp", "b1"));

        let (sql, params) = FilterWhere::generate(&filter, 1).unwrap();
        assert_eq!(
            sql,
            "data->'tuition' >= $2 AND data->'tuition' <= $3 AND \
             (data->'bootcamp' = $4 OR (jsonb_typeof(data->'bootcamp') = 'array' AND data->'bootcamp' @> jsonb_build_array($4)))"
        );
        assert_eq!(params, vec![json!(1000), json!(5000), json!("b1")]);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let filter = FilterSet::new().and(Condition::new("careers", FilterOp::In, json!([])));
        let (sql, params) = FilterWhere::generate(&filter, 0).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
        assert!(!FilterWhere::matches(&filter, &doc(json!({ "careers": ["Other"] }))));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let (sql, _) = FilterWhere::generate(&FilterSet::new(), 0).unwrap();
        assert_eq!(sql, "1=1");
        assert!(FilterWhere::matches(&FilterSet::new(), &doc(json!({}))));
    }

    #[test]
    fn in_memory_range_and_membership() {
        let filter = FilterSet::new()
            .and(Condition::new("tuition", FilterOp::Gte, json!(1000)))
            .and(Condition::new("tuition", FilterOp::Lte, json!(5000)));

        assert!(FilterWhere::matches(&filter, &doc(json!({ "tuition": 1000 }))));
        assert!(FilterWhere::matches(&filter, &doc(json!({ "tuition": 5000.0 }))));
        assert!(!FilterWhere::matches(&filter, &doc(json!({ "tuition": 5001 }))));
        assert!(!FilterWhere::matches(&filter, &doc(json!({}))));

        let careers = FilterSet::new().and(Condition::new(
            "careers",
            FilterOp::In,
            json!(["Business", "UI/UX"]),
        ));
        assert!(FilterWhere::matches(&careers, &doc(json!({ "careers": ["Other", "UI/UX"] }))));
        assert!(!FilterWhere::matches(&careers, &doc(json!({ "careers": ["Other"] }))));
    }

    #[test]
    fn equality_on_array_field_means_contains() {
        let filter = FilterSet::eq("careers", "Business");
        assert!(FilterWhere::matches(&filter, &doc(json!({ "careers": ["Business", "Other"] }))));
        assert!(!FilterWhere::matches(&filter, &doc(json!({ "careers": ["Other"] }))));
    }
}
