use serde_json::Value;
use tracing::{info, warn};

use super::user_service::{hash_password_field, public_user};
use super::{not_found, ServiceError, ServiceResult};
use crate::auth::{verify_password, AuthError, AuthUser, Role};
use crate::database::StoreError;
use crate::filter::FilterSet;
use crate::models::{user, FieldErrors};
use crate::state::AppState;
use crate::types::{doc_id, doc_str, Document};

/// Registration, login and self-service account changes
pub struct AuthService<'a> {
    state: &'a AppState,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Create an account and return a token for it. Admin accounts cannot
    /// be self-registered.
    pub async fn register(&self, payload: Document) -> ServiceResult<String> {
        let mut account = Document::new();
        for field in ["name", "email", "password", "role"] {
            if let Some(value) = payload.get(field) {
                account.insert(field.to_string(), value.clone());
            }
        }

        if doc_str(&account, "role") == Some(Role::Admin.as_str()) {
            let mut fields = FieldErrors::new();
            fields.insert("role".to_string(), "Role admin cannot be registered".to_string());
            return Err(StoreError::validation("Role admin cannot be registered", fields).into());
        }
        hash_password_field(&mut account)?;

        let created = self.state.store.create(user::COLLECTION, account).await?;
        let (id, role) = identity(&created)?;
        info!("Registered user {} as {}", id, role.as_str());
        Ok(self.state.keys.issue(&id, role)?)
    }

    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> ServiceResult<String> {
        let (Some(email), Some(password)) = (email.filter(|e| !e.is_empty()), password.filter(|p| !p.is_empty())) else {
            return Err(ServiceError::BadRequest("Please provide an email and password".to_string()));
        };

        let account = self
            .state
            .store
            .find_one(user::COLLECTION, &FilterSet::eq("email", email.trim()))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = doc_str(&account, "password").ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, hash)? {
            warn!("Failed login for {}", email);
            return Err(AuthError::InvalidCredentials.into());
        }

        let (id, role) = identity(&account)?;
        Ok(self.state.keys.issue(&id, role)?)
    }

    pub async fn me(&self, actor: &AuthUser) -> ServiceResult<Document> {
        self.find(&actor.id).await.map(public_user)
    }

    /// Only name and email may be changed here
    pub async fn update_details(&self, actor: &AuthUser, payload: Document) -> ServiceResult<Document> {
        let patch: Document = payload
            .into_iter()
            .filter(|(key, _)| key == "name" || key == "email")
            .collect();

        self.state
            .store
            .update_by_id(user::COLLECTION, &actor.id, patch)
            .await?
            .map(public_user)
            .ok_or_else(|| not_found("User", &actor.id))
    }

    /// Change the caller's password after checking the current one; returns a fresh token
    pub async fn update_password(&self, actor: &AuthUser, current: &str, new_password: &str) -> ServiceResult<String> {
        let account = self.find(&actor.id).await?;
        let hash = doc_str(&account, "password").unwrap_or_default();
        if hash.is_empty() || !verify_password(current, hash)? {
            return Err(AuthError::IncorrectPassword.into());
        }

        let mut patch = Document::new();
        patch.insert("password".to_string(), Value::String(new_password.to_string()));
        hash_password_field(&mut patch)?;

        let updated = self
            .state
            .store
            .update_by_id(user::COLLECTION, &actor.id, patch)
            .await?
            .ok_or_else(|| not_found("User", &actor.id))?;
        let (id, role) = identity(&updated)?;
        Ok(self.state.keys.issue(&id, role)?)
    }

    async fn find(&self, id: &str) -> ServiceResult<Document> {
        self.state
            .store
            .find_by_id(user::COLLECTION, id)
            .await?
            .ok_or_else(|| not_found("User", id))
    }
}

fn identity(account: &Document) -> ServiceResult<(String, Role)> {
    let id = doc_id(account)
        .ok_or_else(|| StoreError::Serialization("user record has no id".to_string()))?
        .to_string();
    let role = doc_str(account, "role").and_then(Role::parse).unwrap_or(Role::User);
    Ok((id, role))
}
