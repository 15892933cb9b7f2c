use serde_json::Value;
use tracing::info;

use super::{not_found, ServiceResult};
use crate::auth::{hash_password, validate_password_strength, AuthUser, Role};
use crate::database::StoreError;
use crate::filter::AdvancedResults;
use crate::models::{user, FieldErrors};
use crate::state::AppState;
use crate::types::{doc_id, Document};

const PASSWORD_FIELD: &str = "password";

/// Replace a plaintext `password` in the payload with its hash. A payload
/// without a password is left alone.
pub(crate) fn hash_password_field(doc: &mut Document) -> ServiceResult<()> {
    let Some(value) = doc.get(PASSWORD_FIELD) else {
        return Ok(());
    };
    let Some(plain) = value.as_str() else {
        return Err(password_error("Password must be a string".to_string()).into());
    };
    validate_password_strength(plain).map_err(password_error)?;
    let hashed = hash_password(plain)?;
    doc.insert(PASSWORD_FIELD.to_string(), Value::String(hashed));
    Ok(())
}

fn password_error(message: String) -> StoreError {
    let mut fields = FieldErrors::new();
    fields.insert(PASSWORD_FIELD.to_string(), message.clone());
    StoreError::validation(message, fields)
}

pub(crate) fn public_user(mut doc: Document) -> Document {
    user::SCHEMA.strip_hidden(&mut doc);
    doc
}

/// Account administration. Every operation is admin-only.
pub struct UserService<'a> {
    state: &'a AppState,
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, actor: &AuthUser, params: &[(String, String)]) -> ServiceResult<AdvancedResults> {
        actor.require_role(&[Role::Admin])?;
        let options = self.state.list_options(&user::SCHEMA);
        Ok(self
            .state
            .translator
            .translate(params, user::COLLECTION, &options)
            .await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: &str) -> ServiceResult<Document> {
        actor.require_role(&[Role::Admin])?;
        self.find(id).await.map(public_user)
    }

    pub async fn create(&self, actor: &AuthUser, mut payload: Document) -> ServiceResult<Document> {
        actor.require_role(&[Role::Admin])?;
        hash_password_field(&mut payload)?;
        let created = self.state.store.create(user::COLLECTION, payload).await?;
        info!("User {} created by admin {}", doc_id(&created).unwrap_or_default(), actor.id);
        Ok(public_user(created))
    }

    pub async fn update(&self, actor: &AuthUser, id: &str, mut patch: Document) -> ServiceResult<Document> {
        actor.require_role(&[Role::Admin])?;
        hash_password_field(&mut patch)?;
        self.state
            .store
            .update_by_id(user::COLLECTION, id, patch)
            .await?
            .map(public_user)
            .ok_or_else(|| not_found("User", id))
    }

    pub async fn delete(&self, actor: &AuthUser, id: &str) -> ServiceResult<()> {
        actor.require_role(&[Role::Admin])?;
        if !self.state.store.delete_by_id(user::COLLECTION, id).await? {
            return Err(not_found("User", id));
        }
        info!("User {} deleted by admin {}", id, actor.id);
        Ok(())
    }

    async fn find(&self, id: &str) -> ServiceResult<Document> {
        self.state
            .store
            .find_by_id(user::COLLECTION, id)
            .await?
            .ok_or_else(|| not_found("User", id))
    }
}
