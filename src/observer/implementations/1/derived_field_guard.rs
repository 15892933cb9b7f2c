// Ring 1: rejects caller payloads that try to set system-maintained fields
use async_trait::async_trait;

use crate::models::{schema_for, FieldErrors};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{InputValidationObserver, Observer, ObserverRing};
use crate::types::Operation;

#[derive(Default)]
pub struct DerivedFieldGuard;

impl Observer for DerivedFieldGuard {
    fn name(&self) -> &'static str {
        "DerivedFieldGuard"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema_for(schema).is_some_and(|s| !s.derived.is_empty())
    }
}

#[async_trait]
impl InputValidationObserver for DerivedFieldGuard {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let Some(schema) = schema_for(&ctx.schema_name) else {
            return Ok(());
        };

        let errors: FieldErrors = ctx
            .record
            .keys()
            .filter(|field| schema.is_derived(field))
            .map(|field| (field.to_string(), format!("{} is computed and cannot be set", field)))
            .collect();

        if errors.is_empty() {
            return Ok(());
        }
        let mut fields: Vec<&str> = errors.keys().map(String::as_str).collect();
        fields.sort_unstable();
        Err(ObserverError::validation(
            format!("Read-only fields cannot be set: {}", fields.join(", ")),
            errors,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{bootcamp, course};
    use serde_json::json;

    fn ctx(op: Operation, schema: &str, value: serde_json::Value) -> ObserverContext {
        ObserverContext::new(op, schema, value.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn rejects_derived_fields_on_bootcamps() {
        let guard = DerivedFieldGuard;
        let mut c = ctx(Operation::Update, bootcamp::COLLECTION, json!({ "averageCost": 10, "name": "x" }));
        match guard.execute(&mut c).await.unwrap_err() {
            ObserverError::Validation { field_errors, .. } => {
                assert_eq!(field_errors.len(), 1);
                assert!(field_errors.contains_key("averageCost"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut ok = ctx(Operation::Create, bootcamp::COLLECTION, json!({ "name": "x" }));
        assert!(guard.execute(&mut ok).await.is_ok());
    }

    #[test]
    fn only_schemas_with_derived_fields() {
        let guard = DerivedFieldGuard;
        assert!(guard.applies_to_schema(bootcamp::COLLECTION));
        assert!(!guard.applies_to_schema(course::COLLECTION));
        assert!(!guard.applies_to_operation(Operation::Delete));
    }
}
