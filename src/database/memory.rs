use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{project, DocumentStore, GroupAverage, StoreError};
use crate::filter::{FilterOrder, FilterSet, FilterWhere, FindOptions};
use crate::models::{schema_for, CollectionSchema};
use crate::types::{doc_id, Document};

type Collection = BTreeMap<String, Document>;

/// In-process store used for development and tests
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn schema(collection: &str) -> Result<&'static CollectionSchema, StoreError> {
        schema_for(collection).ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    /// Reject a document that collides with another record on any unique index
    fn check_unique(schema: &CollectionSchema, records: &Collection, doc: &Document) -> Result<(), StoreError> {
        let id = doc_id(doc);
        for index in schema.unique {
            let Some(key) = schema.unique_key(index, doc) else {
                continue;
            };
            let collides = records
                .values()
                .filter(|other| doc_id(other) != id)
                .any(|other| schema.unique_key(index, other).as_ref() == Some(&key));
            if collides {
                return Err(StoreError::duplicate(index));
            }
        }
        Ok(())
    }

    fn matching<'a>(records: Option<&'a Collection>, filter: &'a FilterSet) -> impl Iterator<Item = &'a Document> {
        records
            .into_iter()
            .flat_map(|c| c.values())
            .filter(move |doc| FilterWhere::matches(filter, doc))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Self::schema(collection)?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn find_one(&self, collection: &str, filter: &FilterSet) -> Result<Option<Document>, StoreError> {
        Self::schema(collection)?;
        let collections = self.collections.read().await;
        let found = Self::matching(collections.get(collection), filter).next().cloned();
        Ok(found)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &FilterSet,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        Self::schema(collection)?;
        let collections = self.collections.read().await;
        let mut found: Vec<&Document> = Self::matching(collections.get(collection), filter).collect();

        if !options.sort.is_empty() {
            found.sort_by(|a, b| FilterOrder::compare(&options.sort, a, b));
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| project(doc.clone(), options.select.as_deref()))
            .collect())
    }

    async fn count(&self, collection: &str, filter: &FilterSet) -> Result<u64, StoreError> {
        Self::schema(collection)?;
        let collections = self.collections.read().await;
        Ok(Self::matching(collections.get(collection), filter).count() as u64)
    }

    async fn create(&self, collection: &str, data: Document) -> Result<Document, StoreError> {
        let schema = Self::schema(collection)?;
        let doc = schema.prepare_create(data);
        schema.validate(&doc).map_err(StoreError::from_field_errors)?;

        let id = doc_id(&doc)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Query("Document has no identity".to_string()))?;

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        if records.contains_key(&id) {
            return Err(StoreError::duplicate(&["id"]));
        }
        Self::check_unique(schema, records, &doc)?;
        records.insert(id.clone(), doc.clone());

        debug!("Created {}/{}", collection, id);
        Ok(doc)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let schema = Self::schema(collection)?;
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(existing) = records.get(id) else {
            return Ok(None);
        };

        let merged = schema.merge_update(existing, patch);
        schema.validate(&merged).map_err(StoreError::from_field_errors)?;
        Self::check_unique(schema, records, &merged)?;
        records.insert(id.to_string(), merged.clone());

        debug!("Updated {}/{}", collection, id);
        Ok(Some(merged))
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        Self::schema(collection)?;
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn delete_many(&self, collection: &str, filter: &FilterSet) -> Result<u64, StoreError> {
        Self::schema(collection)?;
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|_, doc| !FilterWhere::matches(filter, doc));
        Ok((before - records.len()) as u64)
    }

    async fn aggregate_group_by(
        &self,
        collection: &str,
        filter: &FilterSet,
        group_key: &str,
        avg_field: &str,
    ) -> Result<Vec<GroupAverage>, StoreError> {
        Self::schema(collection)?;
        let collections = self.collections.read().await;

        // group key rendered as JSON text -> (key, sum, count)
        let mut groups: BTreeMap<String, (Value, f64, u64)> = BTreeMap::new();
        for doc in Self::matching(collections.get(collection), filter) {
            let Some(value) = doc.get(avg_field).and_then(Value::as_f64) else {
                continue;
            };
            let key = doc.get(group_key).cloned().unwrap_or(Value::Null);
            let entry = groups.entry(key.to_string()).or_insert((key, 0.0, 0));
            entry.1 += value;
            entry.2 += 1;
        }

        Ok(groups
            .into_values()
            .map(|(key, sum, count)| GroupAverage { key, average: sum / count as f64 })
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
