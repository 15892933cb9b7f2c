use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::error::TranslateError;
use super::filter::{QueryPlan, TranslateOptions};
use super::types::{Condition, FilterOp, FilterSet, FindOptions, Pagination, Populate};
use crate::database::store::DocumentStore;
use crate::models::schema_for;
use crate::types::{doc_id, Document, ID_FIELD};

/// Paginated list output shared by every list endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AdvancedResults {
    pub success: bool,
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<Document>,
}

/// Turns raw query parameters into a bounded read and runs it against the store
#[derive(Clone)]
pub struct QueryTranslator {
    store: Arc<dyn DocumentStore>,
}

impl QueryTranslator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Build the plan (no store access on failure) then execute it
    pub async fn translate(
        &self,
        params: &[(String, String)],
        collection: &str,
        options: &TranslateOptions,
    ) -> Result<AdvancedResults, TranslateError> {
        let plan = QueryPlan::from_params(params, options)?;
        debug!(
            "Query plan for {}: {} conditions, sort {:?}, page {} limit {:?}",
            collection,
            plan.filter.conditions.len(),
            plan.sort,
            plan.page,
            plan.limit
        );
        self.execute(&plan, collection, options).await
    }

    pub async fn execute(
        &self,
        plan: &QueryPlan,
        collection: &str,
        options: &TranslateOptions,
    ) -> Result<AdvancedResults, TranslateError> {
        let find_options = plan.find_options();
        let (total, mut data) = tokio::try_join!(
            self.store.count(collection, &plan.filter),
            self.store.find(collection, &plan.filter, &find_options),
        )?;

        if let Some(schema) = options.schema.or_else(|| schema_for(collection)) {
            for doc in &mut data {
                schema.strip_hidden(doc);
            }
        }

        for populate in &options.populate {
            self.populate(&mut data, populate).await?;
        }

        Ok(AdvancedResults {
            success: true,
            count: data.len(),
            pagination: match plan.limit {
                Some(limit) => Pagination::compute(plan.page, limit, total),
                None => Pagination::single_page(total),
            },
            data,
        })
    }

    /// Replace a reference field with an embedded object holding the selected
    /// fields of the referenced record, or null when it no longer exists.
    async fn populate(&self, data: &mut [Document], populate: &Populate) -> Result<(), TranslateError> {
        let mut ids: Vec<Value> = Vec::new();
        for doc in data.iter() {
            if let Some(Value::String(id)) = doc.get(populate.field) {
                let id = Value::String(id.clone());
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(());
        }

        let mut select: Vec<String> = vec![ID_FIELD.to_string()];
        select.extend(populate.select.iter().map(|f| f.to_string()));

        let filter = FilterSet::new().and(Condition::new(ID_FIELD, FilterOp::In, Value::Array(ids)));
        let options = FindOptions { select: Some(select), ..FindOptions::default() };
        let related = self.store.find(populate.collection, &filter, &options).await?;

        let by_id: HashMap<String, Document> = related
            .into_iter()
            .filter_map(|doc| doc_id(&doc).map(str::to_string).map(|id| (id, doc)))
            .collect();

        for doc in data.iter_mut() {
            let Some(Value::String(id)) = doc.get(populate.field) else {
                continue;
            };
            let embedded = by_id
                .get(id)
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null);
            doc.insert(populate.field.to_string(), embedded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::models::{bootcamp, course, user};
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn seed_courses(store: &MemoryStore, bootcamp_id: &str, tuitions: &[i64]) {
        for (i, tuition) in tuitions.iter().enumerate() {
            let doc = json!({
                "title": format!("Course {i}"),
                "description": "A course",
                "weeks": "8",
                "tuition": tuition,
                "minimumSkill": "beginner",
                "bootcamp": bootcamp_id,
                "user": "u1"
            });
            store
                .create(course::COLLECTION, doc.as_object().cloned().unwrap())
                .await
                .unwrap();
        }
    }

    fn course_options() -> TranslateOptions {
        TranslateOptions::for_schema(&course::SCHEMA)
    }

    #[tokio::test]
    async fn pagination_metadata_for_23_records() {
        let store = Arc::new(MemoryStore::new());
        seed_courses(&store, "b1", &[1000; 23]).await;
        let translator = QueryTranslator::new(store);

        let first = translator
            .translate(&params(&[("limit", "10")]), course::COLLECTION, &course_options())
            .await
            .unwrap();
        assert_eq!(first.count, 10);
        assert_eq!(serde_json::to_value(&first.pagination).unwrap(), json!({ "next": { "page": 2, "limit": 10 } }));

        let last = translator
            .translate(&params(&[("limit", "10"), ("page", "3")]), course::COLLECTION, &course_options())
            .await
            .unwrap();
        assert_eq!(last.count, 3);
        assert_eq!(serde_json::to_value(&last.pagination).unwrap(), json!({ "prev": { "page": 2, "limit": 10 } }));
    }

    #[tokio::test]
    async fn unpaginated_listing_returns_every_match() {
        let store = Arc::new(MemoryStore::new());
        seed_courses(&store, "b1", &[1000; 30]).await;
        seed_courses(&store, "b2", &[1000; 2]).await;
        let translator = QueryTranslator::new(store);

        let options = course_options()
            .with_base_filter(Condition::eq("bootcamp", "b1"))
            .unpaginated_by_default();
        let all = translator.translate(&[], course::COLLECTION, &options).await.unwrap();
        assert_eq!(all.count, 30);
        assert_eq!(serde_json::to_value(&all.pagination).unwrap(), json!({}));

        let paged = translator
            .translate(&params(&[("limit", "10")]), course::COLLECTION, &options)
            .await
            .unwrap();
        assert_eq!(paged.count, 10);
    }

    #[tokio::test]
    async fn selecting_only_hidden_fields_returns_bare_identity() {
        let store = Arc::new(MemoryStore::new());
        store
            .create(
                user::COLLECTION,
                json!({ "name": "Jo", "email": "jo@example.com", "password": "hash" })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        let translator = QueryTranslator::new(store);

        let results = translator
            .translate(
                &params(&[("select", "password")]),
                user::COLLECTION,
                &TranslateOptions::for_schema(&user::SCHEMA),
            )
            .await
            .unwrap();
        assert_eq!(results.count, 1);
        let keys: Vec<&str> = results.data[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id"]);
    }

    #[tokio::test]
    async fn concatenated_pages_cover_every_record_once() {
        let store = Arc::new(MemoryStore::new());
        // Many equal sort values so only the tie-break keeps pages stable
        let tuitions: Vec<i64> = (0..17).map(|i| (i % 3) * 100).collect();
        seed_courses(&store, "b1", &tuitions).await;
        let translator = QueryTranslator::new(store.clone());

        let mut seen = Vec::new();
        for page in 1..=4 {
            let page = page.to_string();
            let result = translator
                .translate(
                    &params(&[("sort", "tuition"), ("limit", "5"), ("page", page.as_str())]),
                    course::COLLECTION,
                    &course_options(),
                )
                .await
                .unwrap();
            seen.extend(result.data);
        }

        assert_eq!(seen.len(), 17);
        let mut ids: Vec<&str> = seen.iter().filter_map(doc_id).collect();
        let tuitions: Vec<f64> = seen.iter().filter_map(|d| d["tuition"].as_f64()).collect();
        assert!(tuitions.windows(2).all(|w| w[0] <= w[1]));
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 17);
    }

    #[tokio::test]
    async fn range_filter_is_inclusive() {
        let store = Arc::new(MemoryStore::new());
        seed_courses(&store, "b1", &[500, 1000, 3000, 5000, 9000]).await;
        let translator = QueryTranslator::new(store);

        let result = translator
            .translate(
                &params(&[("tuition[gte]", "1000"), ("tuition[lte]", "5000"), ("sort", "tuition")]),
                course::COLLECTION,
                &course_options(),
            )
            .await
            .unwrap();

        let tuitions: Vec<i64> = result.data.iter().filter_map(|d| d["tuition"].as_i64()).collect();
        assert_eq!(tuitions, vec![1000, 3000, 5000]);
    }

    #[tokio::test]
    async fn malformed_operator_fails_before_store_access() {
        let translator = QueryTranslator::new(Arc::new(MemoryStore::new()));
        let err = translator
            .translate(&params(&[("tuition[regex]", "1")]), course::COLLECTION, &course_options())
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Filter(_)));
    }

    #[tokio::test]
    async fn empty_result_has_no_links() {
        let translator = QueryTranslator::new(Arc::new(MemoryStore::new()));
        let result = translator
            .translate(&[], course::COLLECTION, &course_options())
            .await
            .unwrap();
        assert_eq!(result.count, 0);
        assert!(result.data.is_empty());
        assert_eq!(result.pagination, Pagination::default());
    }

    #[tokio::test]
    async fn populate_embeds_selected_parent_fields() {
        let store = Arc::new(MemoryStore::new());
        let camp = store
            .create(
                bootcamp::COLLECTION,
                json!({
                    "name": "Devworks",
                    "description": "Full stack",
                    "careers": ["Web Development"],
                    "user": "u1"
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .await
            .unwrap();
        let camp_id = doc_id(&camp).unwrap().to_string();
        seed_courses(&store, &camp_id, &[1000]).await;
        seed_courses(&store, "missing", &[2000]).await;

        let options = course_options().with_populate(Populate {
            field: "bootcamp",
            collection: bootcamp::COLLECTION,
            select: &["name", "description"],
        });
        let result = QueryTranslator::new(store)
            .translate(&params(&[("sort", "tuition")]), course::COLLECTION, &options)
            .await
            .unwrap();

        assert_eq!(
            result.data[0]["bootcamp"],
            json!({ "id": camp_id, "name": "Devworks", "description": "Full stack" })
        );
        assert_eq!(result.data[1]["bootcamp"], Value::Null);
    }
}
