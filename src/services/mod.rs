pub mod auth_service;
pub mod bootcamp_service;
pub mod child_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use bootcamp_service::BootcampService;
pub use child_service::{ChildKind, ChildService, COURSES, REVIEWS};
pub use user_service::UserService;

use thiserror::Error;

use crate::auth::{AuthError, AuthUser};
use crate::database::store::StoreError;
use crate::filter::TranslateError;
use crate::observer::ObserverError;
use crate::types::{doc_str, Document};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    /// The caller is authenticated but lacks rights over the resource
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Observer(#[from] ObserverError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Only the record's owner or an admin may change it
pub(crate) fn ensure_owner(actor: &AuthUser, record: &Document, action: &str) -> ServiceResult<()> {
    if actor.is_admin() || doc_str(record, "user") == Some(actor.id.as_str()) {
        return Ok(());
    }
    Err(ServiceError::Forbidden(format!(
        "User {} is not authorized to {}",
        actor.id, action
    )))
}

pub(crate) fn not_found(what: &str, id: &str) -> ServiceError {
    ServiceError::NotFound(format!("{} not found with id of {}", what, id))
}
