use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::JwtKeys;
use crate::config::{AppConfig, StoreBackend};
use crate::database::{DocumentStore, MemoryStore, PgStore, StoreError};
use crate::filter::{QueryTranslator, TranslateOptions};
use crate::models::CollectionSchema;
use crate::observer::{register_all, AggregateMaintainer, ObserverPipeline};

/// Shared handles for request handlers, services and the CLI
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub pipeline: Arc<ObserverPipeline>,
    pub maintainer: Arc<AggregateMaintainer>,
    pub translator: QueryTranslator,
    pub keys: JwtKeys,
    default_limit: u64,
    max_limit: u64,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        let maintainer = Arc::new(AggregateMaintainer::new(
            store.clone(),
            Duration::from_millis(config.aggregate.recompute_timeout_ms),
        ));
        let pipeline = register_all(maintainer.clone(), config.aggregate.await_recompute);

        Self {
            translator: QueryTranslator::new(store.clone()),
            store,
            pipeline: Arc::new(pipeline),
            maintainer,
            keys: JwtKeys::new(config.security.jwt_secret.clone(), config.security.jwt_expiry_hours),
            default_limit: config.query.default_limit,
            max_limit: config.query.max_limit,
        }
    }

    /// Connect the configured store backend and build the state around it
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn DocumentStore> = match config.database.backend {
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Postgres => {
                let url = config
                    .database
                    .url
                    .as_deref()
                    .ok_or_else(|| StoreError::Connection("DATABASE_URL is not set".to_string()))?;
                let store = PgStore::connect(
                    url,
                    config.database.max_connections,
                    Duration::from_secs(config.database.connection_timeout),
                )
                .await?;
                store.migrate().await?;
                Arc::new(store)
            }
        };
        Ok(Self::new(store, config))
    }

    /// List options for a collection with the configured page limits
    pub fn list_options(&self, schema: &'static CollectionSchema) -> TranslateOptions {
        TranslateOptions::for_schema(schema).with_limits(self.default_limit, self.max_limit)
    }
}
