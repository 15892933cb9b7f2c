use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{project, DocumentStore, GroupAverage, StoreError};
use crate::filter::filter_where::validate_field_name;
use crate::filter::{FilterOrder, FilterSet, FilterWhere, FindOptions, MAX_OFFSET};
use crate::models::{schema_for, CollectionSchema, COLLECTIONS};
use crate::types::{doc_id, Document};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed store: every collection lives in one jsonb `documents` table
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32, timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!("Connected to Postgres (max {} connections)", max_connections);
        Ok(Self { pool })
    }

    /// Create the documents table and one partial unique index per schema index
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in migration_statements() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        info!("Document store schema is up to date");
        Ok(())
    }

    fn schema(collection: &str) -> Result<&'static CollectionSchema, StoreError> {
        schema_for(collection).ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    /// Map a unique-index violation back to the schema fields it covers
    fn map_write_error(schema: &CollectionSchema, error: sqlx::Error) -> StoreError {
        let Some(db_error) = error.as_database_error() else {
            return StoreError::Sqlx(error);
        };
        if db_error.code().as_deref() != Some(UNIQUE_VIOLATION) {
            return StoreError::Sqlx(error);
        }
        let constraint = db_error.constraint().unwrap_or_default();
        match schema
            .unique
            .iter()
            .find(|index| unique_index_name(schema.name, index) == constraint)
        {
            Some(index) => StoreError::duplicate(index),
            None => StoreError::duplicate(&["id"]),
        }
    }
}

pub fn migration_statements() -> Vec<String> {
    let mut statements = vec![
        "CREATE TABLE IF NOT EXISTS documents (\
            collection TEXT NOT NULL, \
            id UUID NOT NULL, \
            data JSONB NOT NULL, \
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
            PRIMARY KEY (collection, id))"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS documents_collection_created_at ON documents (collection, created_at)"
            .to_string(),
    ];
    for schema in COLLECTIONS {
        for index in schema.unique {
            let columns: Vec<String> = index.iter().map(|f| format!("(data->>'{}')", f)).collect();
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents ({}) WHERE collection = '{}'",
                unique_index_name(schema.name, index),
                columns.join(", "),
                schema.name
            ));
        }
    }
    statements
}

fn unique_index_name(collection: &str, fields: &[&str]) -> String {
    format!("documents_{}_{}_unique", collection, fields.join("_")).to_lowercase()
}

/// `SELECT` for a bounded, ordered read. `$1` is the collection name.
pub fn select_sql(filter: &FilterSet, options: &FindOptions) -> Result<(String, Vec<Value>), StoreError> {
    let (where_clause, params) = where_sql(filter)?;
    let mut sql = format!("SELECT data FROM documents WHERE collection = $1 AND ({})", where_clause);

    let order = FilterOrder::generate(&options.sort).map_err(|e| StoreError::Query(e.to_string()))?;
    if !order.is_empty() {
        sql.push(' ');
        sql.push_str(&order);
    }
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {}", limit.min(MAX_OFFSET)));
    }
    if options.skip > 0 {
        sql.push_str(&format!(" OFFSET {}", options.skip.min(MAX_OFFSET)));
    }
    Ok((sql, params))
}

pub fn count_sql(filter: &FilterSet) -> Result<(String, Vec<Value>), StoreError> {
    let (where_clause, params) = where_sql(filter)?;
    Ok((
        format!("SELECT COUNT(*) AS count FROM documents WHERE collection = $1 AND ({})", where_clause),
        params,
    ))
}

pub fn delete_sql(filter: &FilterSet) -> Result<(String, Vec<Value>), StoreError> {
    let (where_clause, params) = where_sql(filter)?;
    Ok((
        format!("DELETE FROM documents WHERE collection = $1 AND ({})", where_clause),
        params,
    ))
}

pub fn aggregate_sql(
    filter: &FilterSet,
    group_key: &str,
    avg_field: &str,
) -> Result<(String, Vec<Value>), StoreError> {
    for field in [group_key, avg_field] {
        validate_field_name(field).map_err(|e| StoreError::Query(e.to_string()))?;
    }
    let (where_clause, params) = where_sql(filter)?;
    let key = FilterWhere::json_field(group_key);
    let avg = FilterWhere::json_field(avg_field);
    Ok((
        format!(
            "SELECT {key} AS key, AVG(({avg})::float8) AS average FROM documents \
             WHERE collection = $1 AND ({where_clause}) AND jsonb_typeof({avg}) = 'number' \
             GROUP BY {key} ORDER BY {key}"
        ),
        params,
    ))
}

fn where_sql(filter: &FilterSet) -> Result<(String, Vec<Value>), StoreError> {
    FilterWhere::generate(filter, 1).map_err(|e| StoreError::Query(e.to_string()))
}

fn bind_all<'q>(
    collection: &'q str,
    params: Vec<Value>,
    sql: &'q str,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql).bind(collection);
    for param in params {
        query = query.bind(Json(param));
    }
    query
}

fn row_document(row: &PgRow) -> Result<Document, StoreError> {
    let Json(doc) = row.try_get::<Json<Document>, _>("data")?;
    Ok(doc)
}

fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Self::schema(collection)?;
        let Some(uuid) = parse_id(id) else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_document).transpose()
    }

    async fn find_one(&self, collection: &str, filter: &FilterSet) -> Result<Option<Document>, StoreError> {
        let options = FindOptions { limit: Some(1), ..FindOptions::default() };
        Ok(self.find(collection, filter, &options).await?.into_iter().next())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &FilterSet,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        Self::schema(collection)?;
        let (sql, params) = select_sql(filter, options)?;
        debug!("find {}: {}", collection, sql);

        let rows = bind_all(collection, params, &sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row_document(row).map(|doc| project(doc, options.select.as_deref())))
            .collect()
    }

    async fn count(&self, collection: &str, filter: &FilterSet) -> Result<u64, StoreError> {
        Self::schema(collection)?;
        let (sql, params) = count_sql(filter)?;
        let row = bind_all(collection, params, &sql).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn create(&self, collection: &str, data: Document) -> Result<Document, StoreError> {
        let schema = Self::schema(collection)?;
        let doc = schema.prepare_create(data);
        schema.validate(&doc).map_err(StoreError::from_field_errors)?;

        let id = doc_id(&doc)
            .and_then(parse_id)
            .ok_or_else(|| StoreError::Query("Document has no identity".to_string()))?;

        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(schema, e))?;

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
        let Some(uuid) = parse_id(id) else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
            .bind(collection)
            .bind(uuid)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let existing = row_document(&row)?;
        let merged = schema.merge_update(&existing, patch);
        schema.validate(&merged).map_err(StoreError::from_field_errors)?;

        sqlx::query("UPDATE documents SET data = $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(uuid)
            .bind(Json(&merged))
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_write_error(schema, e))?;
        tx.commit().await?;

        debug!("Updated {}/{}", collection, id);
        Ok(Some(merged))
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        Self::schema(collection)?;
        let Some(uuid) = parse_id(id) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, collection: &str, filter: &FilterSet) -> Result<u64, StoreError> {
        Self::schema(collection)?;
        let (sql, params) = delete_sql(filter)?;
        let result = bind_all(collection, params, &sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn aggregate_group_by(
        &self,
        collection: &str,
        filter: &FilterSet,
        group_key: &str,
        avg_field: &str,
    ) -> Result<Vec<GroupAverage>, StoreError> {
        Self::schema(collection)?;
        let (sql, params) = aggregate_sql(filter, group_key, avg_field)?;
        let rows = bind_all(collection, params, &sql).fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key: Option<Json<Value>> = row.try_get("key")?;
            let average: Option<f64> = row.try_get("average")?;
            if let Some(average) = average {
                out.push(GroupAverage {
                    key: key.map(|Json(v)| v).unwrap_or(Value::Null),
                    average,
                });
            }
        }
        Ok(out)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Condition, FilterOp, SortKey};
    use serde_json::json;

    #[test]
    fn select_sql_orders_and_pages() {
        let filter = FilterSet::new().and(Condition::new("tuition", FilterOp::Gte, json!(1000)));
        let options = FindOptions {
            select: None,
            sort: vec![SortKey::desc("createdAt"), SortKey::asc("id")],
            skip: 20,
            limit: Some(10),
        };
        let (sql, params) = select_sql(&filter, &options).unwrap();
        assert_eq!(
            sql,
            "SELECT data FROM documents WHERE collection = $1 AND (data->'tuition' >= $2) \
             ORDER BY data->'createdAt' DESC NULLS LAST, data->'id' ASC NULLS FIRST LIMIT 10 OFFSET 20"
        );
        assert_eq!(params, vec![json!(1000)]);
    }

    #[test]
    fn select_sql_keeps_offset_within_bigint() {
        let options = FindOptions { skip: u64::MAX, limit: Some(10), ..FindOptions::default() };
        let (sql, _) = select_sql(&FilterSet::new(), &options).unwrap();
        assert!(sql.ends_with(&format!("LIMIT 10 OFFSET {}", i64::MAX)));
    }

    #[test]
    fn count_sql_ignores_pagination() {
        let (sql, params) = count_sql(&FilterSet::new()).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS count FROM documents WHERE collection = $1 AND (1=1)");
        assert!(params.is_empty());
    }

    #[test]
    fn aggregate_sql_groups_by_reference() {
        let (sql, params) = aggregate_sql(&FilterSet::eq("bootcamp", "b1"), "bootcamp", "tuition").unwrap();
        assert!(sql.starts_with("SELECT data->'bootcamp' AS key, AVG((data->'tuition')::float8) AS average"));
        assert!(sql.contains("jsonb_typeof(data->'tuition') = 'number'"));
        assert!(sql.ends_with("GROUP BY data->'bootcamp' ORDER BY data->'bootcamp'"));
        assert_eq!(params, vec![json!("b1")]);
    }

    #[test]
    fn aggregate_sql_rejects_injected_fields() {
        assert!(aggregate_sql(&FilterSet::new(), "bootcamp", "x'); DROP TABLE documents; --").is_err());
    }

    #[test]
    fn migration_creates_partial_unique_indexes() {
        let statements = migration_statements();
        assert!(statements.iter().any(|s| s
            == "CREATE UNIQUE INDEX IF NOT EXISTS documents_reviews_bootcamp_user_unique ON documents \
                ((data->>'bootcamp'), (data->>'user')) WHERE collection = 'reviews'"));
        assert!(statements.iter().any(|s| s.contains("documents_users_email_unique")));
    }
}
