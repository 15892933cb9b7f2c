use thiserror::Error;

use crate::database::store::StoreError;

/// Malformed query parameters, detected before any store access
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Malformed query parameter: {0}")]
    MalformedKey(String),

    #[error("Unsupported operator `{op}` on field `{field}`")]
    UnsupportedOperator { field: String, op: String },

    #[error("Invalid value `{value}` for field `{field}`")]
    InvalidValue { field: String, value: String },

    #[error("Field `{0}` cannot be queried")]
    ForbiddenField(String),
}

/// Failure of a translated read: either the plan or its execution
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
