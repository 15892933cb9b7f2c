use thiserror::Error;

use crate::database::store::StoreError;
use crate::models::FieldErrors;

/// Observer system errors with structured error types
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ObserverError {
    pub fn validation(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        ObserverError::Validation { message: message.into(), field_errors }
    }
}
