use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ensure_owner, not_found, ServiceResult};
use crate::auth::{AuthUser, Role};
use crate::filter::{AdvancedResults, Condition, FilterSet, Populate};
use crate::models::{bootcamp, course, review, CollectionSchema};
use crate::observer::ObserverContext;
use crate::state::AppState;
use crate::types::{doc_id, doc_str, Document, Operation};

/// A collection whose records belong to a bootcamp
#[derive(Debug)]
pub struct ChildKind {
    pub schema: &'static CollectionSchema,
    /// Display name used in messages
    pub what: &'static str,
    pub create_roles: &'static [Role],
    /// Creating requires owning the parent bootcamp (admins excepted)
    pub must_own_parent: bool,
}

pub static COURSES: ChildKind = ChildKind {
    schema: &course::SCHEMA,
    what: "Course",
    create_roles: &[Role::Publisher, Role::Admin],
    must_own_parent: true,
};

pub static REVIEWS: ChildKind = ChildKind {
    schema: &review::SCHEMA,
    what: "Review",
    create_roles: &[Role::User, Role::Admin],
    must_own_parent: false,
};

const BOOTCAMP_FIELD: &str = "bootcamp";

const BOOTCAMP_SUMMARY: Populate = Populate {
    field: BOOTCAMP_FIELD,
    collection: bootcamp::COLLECTION,
    select: &["name", "description"],
};

/// CRUD over courses or reviews. Every committed write is handed to the
/// observer pipeline so the parent's aggregates follow.
pub struct ChildService<'a> {
    state: &'a AppState,
    kind: &'static ChildKind,
}

impl<'a> ChildService<'a> {
    pub fn new(state: &'a AppState, kind: &'static ChildKind) -> Self {
        Self { state, kind }
    }

    pub fn courses(state: &'a AppState) -> Self {
        Self::new(state, &COURSES)
    }

    pub fn reviews(state: &'a AppState) -> Self {
        Self::new(state, &REVIEWS)
    }

    fn collection(&self) -> &'static str {
        self.kind.schema.name
    }

    /// All records, paginated, or every record of one bootcamp when
    /// `bootcamp_id` is given (paged only if the caller asks)
    pub async fn list(&self, params: &[(String, String)], bootcamp_id: Option<&str>) -> ServiceResult<AdvancedResults> {
        let mut options = self.state.list_options(self.kind.schema);
        match bootcamp_id {
            Some(id) => {
                self.parent(id).await?;
                options = options
                    .with_base_filter(Condition::eq(BOOTCAMP_FIELD, id))
                    .unpaginated_by_default();
            }
            None => options = options.with_populate(BOOTCAMP_SUMMARY),
        }
        Ok(self
            .state
            .translator
            .translate(params, self.collection(), &options)
            .await?)
    }

    /// One record with its bootcamp summary embedded
    pub async fn get(&self, id: &str) -> ServiceResult<Document> {
        let mut record = self.find(id).await?;
        let embedded = match doc_str(&record, BOOTCAMP_FIELD) {
            Some(parent_id) => self
                .state
                .store
                .find_by_id(bootcamp::COLLECTION, parent_id)
                .await?
                .map(|parent| {
                    json!({
                        "id": parent_id,
                        "name": parent.get("name").cloned().unwrap_or(Value::Null),
                        "description": parent.get("description").cloned().unwrap_or(Value::Null),
                    })
                })
                .unwrap_or(Value::Null),
            None => Value::Null,
        };
        record.insert(BOOTCAMP_FIELD.to_string(), embedded);
        Ok(record)
    }

    pub async fn create(&self, actor: &AuthUser, bootcamp_id: &str, mut payload: Document) -> ServiceResult<Document> {
        // Parent existence is checked before anything is written
        let parent = self.parent(bootcamp_id).await?;
        actor.require_role(self.kind.create_roles)?;
        if self.kind.must_own_parent {
            ensure_owner(
                actor,
                &parent,
                &format!("add a {} to bootcamp {}", self.kind.what.to_lowercase(), bootcamp_id),
            )?;
        }

        payload.insert(BOOTCAMP_FIELD.to_string(), Value::String(bootcamp_id.to_string()));
        payload.insert("user".to_string(), Value::String(actor.id.clone()));

        let mut ctx = ObserverContext::new(Operation::Create, self.collection(), payload);
        self.state.pipeline.run_sync(&mut ctx).await?;

        let created = self.state.store.create(self.collection(), ctx.record).await?;
        debug!(
            "{} {} created for bootcamp {}",
            self.kind.what,
            doc_id(&created).unwrap_or_default(),
            bootcamp_id
        );

        self.state
            .pipeline
            .notify(ObserverContext::new(Operation::Create, self.collection(), created.clone()))
            .await;
        Ok(created)
    }

    pub async fn update(&self, actor: &AuthUser, id: &str, mut patch: Document) -> ServiceResult<Document> {
        let existing = self.find(id).await?;
        ensure_owner(
            actor,
            &existing,
            &format!("update {} {}", self.kind.what.to_lowercase(), id),
        )?;

        patch.remove(BOOTCAMP_FIELD);
        patch.remove("user");

        let mut ctx = ObserverContext::new(Operation::Update, self.collection(), patch).with_previous(existing.clone());
        self.state.pipeline.run_sync(&mut ctx).await?;

        let updated = self
            .state
            .store
            .update_by_id(self.collection(), id, ctx.record)
            .await?
            .ok_or_else(|| not_found(self.kind.what, id))?;

        self.state
            .pipeline
            .notify(ObserverContext::new(Operation::Update, self.collection(), updated.clone()).with_previous(existing))
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &AuthUser, id: &str) -> ServiceResult<()> {
        let existing = self.find(id).await?;
        ensure_owner(
            actor,
            &existing,
            &format!("delete {} {}", self.kind.what.to_lowercase(), id),
        )?;

        if !self.state.store.delete_by_id(self.collection(), id).await? {
            return Err(not_found(self.kind.what, id));
        }
        self.state
            .pipeline
            .notify(ObserverContext::new(Operation::Delete, self.collection(), existing))
            .await;
        Ok(())
    }

    /// Remove every record of one bootcamp. The bootcamp's aggregates are
    /// recomputed once, not once per removed record.
    pub async fn delete_for_bootcamp(&self, actor: &AuthUser, bootcamp_id: &str) -> ServiceResult<u64> {
        let parent = self.parent(bootcamp_id).await?;
        ensure_owner(
            actor,
            &parent,
            &format!("delete {}s of bootcamp {}", self.kind.what.to_lowercase(), bootcamp_id),
        )?;

        let removed = self
            .state
            .store
            .delete_many(self.collection(), &FilterSet::eq(BOOTCAMP_FIELD, bootcamp_id))
            .await?;
        info!("Removed {} {}s of bootcamp {}", removed, self.kind.what.to_lowercase(), bootcamp_id);

        if removed > 0 {
            let mut marker = Document::new();
            marker.insert(BOOTCAMP_FIELD.to_string(), Value::String(bootcamp_id.to_string()));
            self.state
                .pipeline
                .notify(ObserverContext::new(Operation::Delete, self.collection(), marker))
                .await;
        }
        Ok(removed)
    }

    async fn find(&self, id: &str) -> ServiceResult<Document> {
        self.state
            .store
            .find_by_id(self.collection(), id)
            .await?
            .ok_or_else(|| not_found(self.kind.what, id))
    }

    async fn parent(&self, bootcamp_id: &str) -> ServiceResult<Document> {
        self.state
            .store
            .find_by_id(bootcamp::COLLECTION, bootcamp_id)
            .await?
            .ok_or_else(|| not_found("Bootcamp", bootcamp_id))
    }
}
