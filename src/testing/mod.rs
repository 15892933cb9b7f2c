// Fixtures for service and observer tests, backed by the in-memory store

use std::sync::Arc;

use serde_json::{json, Value};

use crate::auth::{AuthUser, Role};
use crate::config::AppConfig;
use crate::database::{DocumentStore, MemoryStore};
use crate::models::user;
use crate::state::AppState;
use crate::types::{doc_id, Document};

/// State over a fresh memory store; recomputes are awaited so assertions
/// can read derived fields straight after a write
pub fn test_state() -> AppState {
    let mut config = AppConfig::development();
    config.aggregate.await_recompute = true;
    config.security.jwt_secret = "test-secret".to_string();
    AppState::new(Arc::new(MemoryStore::new()), &config)
}

/// Insert a user directly (no password hashing) and return it as a caller
pub async fn seed_user(state: &AppState, name: &str, role: Role) -> AuthUser {
    let created = state
        .store
        .create(
            user::COLLECTION,
            document(json!({
                "name": name,
                "email": format!("{}@example.com", name.to_lowercase()),
                "role": role.as_str(),
                "password": "not-a-real-hash"
            })),
        )
        .await
        .expect("seed user");
    AuthUser {
        id: doc_id(&created).expect("user id").to_string(),
        role,
    }
}

pub fn document(value: Value) -> Document {
    value.as_object().cloned().unwrap_or_default()
}

pub fn bootcamp_payload(name: &str) -> Document {
    document(json!({
        "name": name,
        "description": "Full stack web development",
        "careers": ["Web Development", "UI/UX"],
        "housing": true
    }))
}

pub fn course_payload(title: &str, tuition: i64) -> Document {
    document(json!({
        "title": title,
        "description": "Learn things",
        "weeks": "8",
        "tuition": tuition,
        "minimumSkill": "beginner"
    }))
}

pub fn review_payload(rating: i64) -> Document {
    document(json!({
        "title": "Great bootcamp",
        "text": "Learned a lot",
        "rating": rating
    }))
}
