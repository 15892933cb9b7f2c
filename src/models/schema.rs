use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};

/// Storage type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    StringArray,
    /// Identity of a record in the named collection
    Reference(&'static str),
}

/// Default applied to a missing field on create
#[derive(Debug, Clone, Copy)]
pub enum FieldDefault {
    Bool(bool),
    Str(&'static str),
}

impl FieldDefault {
    fn to_value(self) -> Value {
        match self {
            FieldDefault::Bool(b) => Value::Bool(b),
            FieldDefault::Str(s) => Value::String(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: Option<&'static str>,
    pub enum_values: &'static [&'static str],
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_length: Option<usize>,
    pub default: Option<FieldDefault>,
    pub trim: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: None,
            enum_values: &[],
            min: None,
            max: None,
            max_length: None,
            default: None,
            trim: false,
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub const fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub const fn reference(name: &'static str, collection: &'static str) -> Self {
        Self::new(name, FieldKind::Reference(collection))
    }

    pub const fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.enum_values = values;
        self
    }

    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub const fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub const fn default_to(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }
}

/// Fixed-width RFC3339 so timestamps order correctly as strings
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Field-level validation failures, keyed by field name
pub type FieldErrors = HashMap<String, String>;

/// Static description of a collection: fields, unique indexes, derived and hidden fields
#[derive(Debug)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    /// Each entry is a compound unique index
    pub unique: &'static [&'static [&'static str]],
    /// Fields maintained by the system, never by a caller
    pub derived: &'static [&'static str],
    /// Fields never returned to a caller
    pub hidden: &'static [&'static str],
}

impl CollectionSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(&name)
    }

    pub fn is_derived(&self, name: &str) -> bool {
        self.derived.contains(&name)
    }

    /// Prepare a new document for insertion: drop unknown keys, trim strings,
    /// apply defaults and stamp identity and timestamps.
    pub fn prepare_create(&self, mut doc: Document) -> Document {
        self.retain_known(&mut doc);
        self.trim_strings(&mut doc);

        for field in self.fields {
            if let Some(default) = field.default {
                doc.entry(field.name.to_string()).or_insert_with(|| default.to_value());
            }
        }

        let id = match doc.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) if Uuid::parse_str(id).is_ok() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let now = Value::String(timestamp());
        doc.insert(ID_FIELD.to_string(), Value::String(id));
        doc.insert(CREATED_AT_FIELD.to_string(), now.clone());
        doc.insert(UPDATED_AT_FIELD.to_string(), now);
        doc
    }

    /// Merge a patch onto an existing document. Identity and creation time are
    /// never overwritten.
    pub fn merge_update(&self, existing: &Document, mut patch: Document) -> Document {
        patch.remove(ID_FIELD);
        patch.remove(CREATED_AT_FIELD);
        self.retain_known(&mut patch);
        self.trim_strings(&mut patch);

        let mut merged = existing.clone();
        for (key, value) in patch {
            merged.insert(key, value);
        }
        merged.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(timestamp()),
        );
        merged
    }

    /// Validate a complete document against the schema
    pub fn validate(&self, doc: &Document) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        for field in self.fields {
            let value = doc.get(field.name).filter(|v| !v.is_null());

            let value = match value {
                Some(v) => v,
                None => {
                    if let Some(message) = field.required {
                        errors.insert(field.name.to_string(), message.to_string());
                    }
                    continue;
                }
            };

            if let Err(message) = Self::validate_value(field, value) {
                errors.insert(field.name.to_string(), message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_value(field: &FieldSpec, value: &Value) -> Result<(), String> {
        match field.kind {
            FieldKind::String | FieldKind::Reference(_) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{} must be a string", field.name))?;
                if s.is_empty() && field.required.is_some() {
                    return Err(field.required.unwrap_or("Field is required").to_string());
                }
                if let Some(max) = field.max_length {
                    if s.chars().count() > max {
                        return Err(format!("{} can not be more than {} characters", field.name, max));
                    }
                }
                if !field.enum_values.is_empty() && !field.enum_values.contains(&s) {
                    return Err(format!(
                        "`{}` is not a valid value for {}; expected one of: {}",
                        s,
                        field.name,
                        field.enum_values.join(", ")
                    ));
                }
                Ok(())
            }
            FieldKind::Number => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| format!("{} must be a number", field.name))?;
                if let Some(min) = field.min {
                    if n < min {
                        return Err(format!("{} must be at least {}", field.name, min));
                    }
                }
                if let Some(max) = field.max {
                    if n > max {
                        return Err(format!("{} can not be more than {}", field.name, max));
                    }
                }
                Ok(())
            }
            FieldKind::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("{} must be a boolean", field.name))
                }
            }
            FieldKind::StringArray => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("{} must be an array of strings", field.name))?;
                if items.is_empty() && field.required.is_some() {
                    return Err(field.required.unwrap_or("Field is required").to_string());
                }
                for item in items {
                    let s = item
                        .as_str()
                        .ok_or_else(|| format!("{} must be an array of strings", field.name))?;
                    if !field.enum_values.is_empty() && !field.enum_values.contains(&s) {
                        return Err(format!("`{}` is not a valid value for {}", s, field.name));
                    }
                }
                Ok(())
            }
        }
    }

    /// Collect the unique-index key of a document, or None when any part is missing
    pub fn unique_key(&self, index: &[&str], doc: &Document) -> Option<Vec<Value>> {
        index
            .iter()
            .map(|f| doc.get(*f).filter(|v| !v.is_null()).cloned())
            .collect()
    }

    /// Remove hidden fields before a document leaves the service layer
    pub fn strip_hidden(&self, doc: &mut Document) {
        for field in self.hidden {
            doc.remove(*field);
        }
    }

    fn retain_known(&self, doc: &mut Document) {
        doc.retain(|key, _| {
            key == ID_FIELD
                || key == CREATED_AT_FIELD
                || key == UPDATED_AT_FIELD
                || self.field(key).is_some()
        });
    }

    fn trim_strings(&self, doc: &mut Document) {
        for field in self.fields.iter().filter(|f| f.trim) {
            if let Some(Value::String(s)) = doc.get_mut(field.name) {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    *s = trimmed.to_string();
                }
            }
        }
    }
}
