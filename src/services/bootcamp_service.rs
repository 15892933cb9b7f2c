use serde_json::Value;
use tracing::info;

use super::{ensure_owner, not_found, ServiceError, ServiceResult};
use crate::auth::{AuthUser, Role};
use crate::filter::{AdvancedResults, FilterSet};
use crate::models::{bootcamp, course, review};
use crate::observer::ObserverContext;
use crate::state::AppState;
use crate::types::{doc_id, Document, Operation};

/// Bootcamp CRUD. Owns cascade deletion of a bootcamp's courses and reviews.
pub struct BootcampService<'a> {
    state: &'a AppState,
}

impl<'a> BootcampService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, params: &[(String, String)]) -> ServiceResult<AdvancedResults> {
        let options = self.state.list_options(&bootcamp::SCHEMA);
        Ok(self
            .state
            .translator
            .translate(params, bootcamp::COLLECTION, &options)
            .await?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Document> {
        self.state
            .store
            .find_by_id(bootcamp::COLLECTION, id)
            .await?
            .ok_or_else(|| not_found("Bootcamp", id))
    }

    pub async fn create(&self, actor: &AuthUser, mut payload: Document) -> ServiceResult<Document> {
        actor.require_role(&[Role::Publisher, Role::Admin])?;

        // Publishers may own a single bootcamp; admins are unrestricted
        if !actor.is_admin() {
            let owned = self
                .state
                .store
                .find_one(bootcamp::COLLECTION, &FilterSet::eq("user", actor.id.clone()))
                .await?;
            if owned.is_some() {
                return Err(ServiceError::BadRequest(format!(
                    "The user with ID {} has already published a bootcamp",
                    actor.id
                )));
            }
        }

        payload.remove("slug");
        payload.insert("user".to_string(), Value::String(actor.id.clone()));
        if let Some(Value::String(name)) = payload.get("name") {
            let slug = bootcamp::slugify(name);
            payload.insert("slug".to_string(), Value::String(slug));
        }

        let mut ctx = ObserverContext::new(Operation::Create, bootcamp::COLLECTION, payload);
        self.state.pipeline.run_sync(&mut ctx).await?;

        let created = self.state.store.create(bootcamp::COLLECTION, ctx.record).await?;
        info!("Bootcamp {} created by {}", doc_id(&created).unwrap_or_default(), actor.id);
        Ok(created)
    }

    pub async fn update(&self, actor: &AuthUser, id: &str, mut patch: Document) -> ServiceResult<Document> {
        let existing = self.get(id).await?;
        ensure_owner(actor, &existing, &format!("update bootcamp {}", id))?;

        // Ownership and slug are not caller-editable
        patch.remove("user");
        patch.remove("slug");
        if let Some(Value::String(name)) = patch.get("name") {
            let slug = bootcamp::slugify(name);
            patch.insert("slug".to_string(), Value::String(slug));
        }

        let mut ctx = ObserverContext::new(Operation::Update, bootcamp::COLLECTION, patch).with_previous(existing);
        self.state.pipeline.run_sync(&mut ctx).await?;

        self.state
            .store
            .update_by_id(bootcamp::COLLECTION, id, ctx.record)
            .await?
            .ok_or_else(|| not_found("Bootcamp", id))
    }

    /// Delete a bootcamp together with its courses and reviews
    pub async fn delete(&self, actor: &AuthUser, id: &str) -> ServiceResult<()> {
        let existing = self.get(id).await?;
        ensure_owner(actor, &existing, &format!("delete bootcamp {}", id))?;

        let children = FilterSet::eq("bootcamp", id.to_string());
        let courses = self.state.store.delete_many(course::COLLECTION, &children).await?;
        let reviews = self.state.store.delete_many(review::COLLECTION, &children).await?;

        if !self.state.store.delete_by_id(bootcamp::COLLECTION, id).await? {
            return Err(not_found("Bootcamp", id));
        }
        info!(
            "Bootcamp {} deleted with {} courses and {} reviews",
            id, courses, reviews
        );
        Ok(())
    }
}
