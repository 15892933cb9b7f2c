use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::filter::{FilterSet, FindOptions};
use crate::models::FieldErrors;
use crate::types::{Document, ID_FIELD};

/// Errors raised by a document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Store unavailable: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn validation(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        StoreError::Validation { message: message.into(), field_errors }
    }

    /// Validation failure on a unique index
    pub fn duplicate(fields: &[&str]) -> Self {
        let message = format!("Duplicate value for {}", fields.join(", "));
        let field_errors = fields
            .iter()
            .map(|f| (f.to_string(), format!("{} already exists", f)))
            .collect();
        StoreError::Validation { message, field_errors }
    }

    pub fn from_field_errors(errors: FieldErrors) -> Self {
        let mut messages: Vec<&str> = errors.values().map(String::as_str).collect();
        messages.sort_unstable();
        StoreError::Validation { message: messages.join(", "), field_errors: errors }
    }

    pub fn is_connection(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::Sqlx(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// One row of a grouped average
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAverage {
    pub key: Value,
    pub average: f64,
}

/// Collection-oriented document store. Writes are validated against the
/// collection schema; unique indexes are enforced by the store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn find_one(&self, collection: &str, filter: &FilterSet) -> Result<Option<Document>, StoreError>;

    async fn find(
        &self,
        collection: &str,
        filter: &FilterSet,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &FilterSet) -> Result<u64, StoreError>;

    async fn create(&self, collection: &str, data: Document) -> Result<Document, StoreError>;

    /// Merge `patch` onto the stored record. None when the record does not exist.
    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Remove every matching record, returning how many were removed
    async fn delete_many(&self, collection: &str, filter: &FilterSet) -> Result<u64, StoreError>;

    /// Mean of `avg_field` per distinct `group_key` over matching records.
    /// Records missing the averaged field are ignored; empty when nothing matches.
    async fn aggregate_group_by(
        &self,
        collection: &str,
        filter: &FilterSet,
        group_key: &str,
        avg_field: &str,
    ) -> Result<Vec<GroupAverage>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Keep only the selected fields (identity always survives)
pub fn project(doc: Document, select: Option<&[String]>) -> Document {
    match select {
        None => doc,
        Some(fields) => doc
            .into_iter()
            .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|f| f == key))
            .collect(),
    }
}
