use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::filter::FilterSet;
use crate::models::{bootcamp, course, review, user, COLLECTIONS};
use crate::services::user_service::hash_password_field;
use crate::state::AppState;
use crate::types::{doc_id, Document, ID_FIELD};

/// Seed files in load order; references can only point at earlier files
const SEED_FILES: &[(&str, &str)] = &[
    (user::COLLECTION, "users.json"),
    (bootcamp::COLLECTION, "bootcamps.json"),
    (course::COLLECTION, "courses.json"),
    (review::COLLECTION, "reviews.json"),
];

const REFERENCE_FIELDS: &[&str] = &["user", "bootcamp"];

#[derive(Subcommand)]
pub enum SeedCommands {
    #[command(about = "Import users, bootcamps, courses and reviews from a data directory")]
    Import {
        #[arg(help = "Directory holding users.json, bootcamps.json, courses.json, reviews.json")]
        dir: PathBuf,
    },

    #[command(about = "Delete every record in every collection")]
    Destroy,
}

pub async fn handle(cmd: SeedCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let result = async {
        let state = AppState::from_config(config::config())
            .await
            .context("failed to open the document store")?;
        match cmd {
            SeedCommands::Import { dir } => import(&state, &dir).await,
            SeedCommands::Destroy => destroy(&state).await,
        }
    }
    .await;

    match result {
        Ok(summary) => output_success(&output_format, summary.message(), Some(summary.counts)),
        Err(e) => {
            output_error(&output_format, &format!("{:#}", e))?;
            Err(e)
        }
    }
}

struct Summary {
    imported: bool,
    counts: Value,
}

impl Summary {
    fn message(&self) -> &'static str {
        if self.imported {
            "Data imported"
        } else {
            "Data destroyed"
        }
    }
}

/// Load the seed files in dependency order. Source identifiers that are not
/// UUIDs are replaced, and references are rewritten to the new identities.
async fn import(state: &AppState, dir: &Path) -> anyhow::Result<Summary> {
    if !dir.is_dir() {
        bail!("seed directory {} does not exist", dir.display());
    }

    let mut identities: HashMap<String, String> = HashMap::new();
    let mut counts = serde_json::Map::new();

    for (collection, file) in SEED_FILES {
        let path = dir.join(file);
        if !path.exists() {
            debug!("No {} in {}; skipping", file, dir.display());
            continue;
        }
        let records = read_records(&path)?;
        let total = records.len();

        for mut record in records {
            let source_id = record
                .remove("_id")
                .or_else(|| record.get(ID_FIELD).cloned())
                .and_then(|v| v.as_str().map(str::to_string));

            for field in REFERENCE_FIELDS {
                if let Some(Value::String(reference)) = record.get(*field) {
                    if let Some(mapped) = identities.get(reference) {
                        record.insert(field.to_string(), Value::String(mapped.clone()));
                    }
                }
            }
            prepare(collection, &mut record)?;

            let created = state
                .store
                .create(collection, record)
                .await
                .with_context(|| format!("failed to import {} record {:?}", collection, source_id))?;
            if let (Some(source), Some(id)) = (source_id, doc_id(&created)) {
                identities.insert(source, id.to_string());
            }
        }

        info!("Imported {} {}", total, collection);
        counts.insert(collection.to_string(), json!(total));
    }

    let recomputed = state.maintainer.recompute_all().await?;
    counts.insert("recomputed".to_string(), json!(recomputed));

    Ok(Summary { imported: true, counts: Value::Object(counts) })
}

/// Collection-specific fixups the services would otherwise apply
fn prepare(collection: &str, record: &mut Document) -> anyhow::Result<()> {
    match collection {
        c if c == user::COLLECTION => {
            hash_password_field(record).map_err(|e| anyhow::anyhow!("{}", e))?;
        }
        c if c == bootcamp::COLLECTION => {
            for field in bootcamp::SCHEMA.derived {
                record.remove(*field);
            }
            if let Some(Value::String(name)) = record.get("name") {
                let slug = bootcamp::slugify(name);
                record.insert("slug".to_string(), Value::String(slug));
            }
        }
        _ => {}
    }
    Ok(())
}

fn read_records(path: &Path) -> anyhow::Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))?;
    let Value::Array(items) = value else {
        bail!("{} must contain a JSON array", path.display());
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => bail!("{} contains a non-object entry", path.display()),
        })
        .collect()
}

async fn destroy(state: &AppState) -> anyhow::Result<Summary> {
    let mut counts = serde_json::Map::new();
    for schema in COLLECTIONS {
        let removed = state.store.delete_many(schema.name, &FilterSet::new()).await?;
        info!("Deleted {} {}", removed, schema.name);
        counts.insert(schema.name.to_string(), json!(removed));
    }
    Ok(Summary { imported: false, counts: Value::Object(counts) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DocumentStore;
    use crate::testing::test_state;

    fn write(dir: &Path, file: &str, body: Value) {
        std::fs::write(dir.join(file), serde_json::to_string(&body).unwrap()).unwrap();
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bootcamp-seed-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn import_rewrites_references_and_recomputes() {
        let state = test_state();
        let dir = scratch_dir("import");
        write(&dir, "users.json", json!([
            { "_id": "u1", "name": "Pub", "email": "pub@example.com", "role": "publisher", "password": "123456" }
        ]));
        write(&dir, "bootcamps.json", json!([
            { "_id": "b1", "name": "Devworks Bootcamp", "description": "Web", "careers": ["Web Development"], "user": "u1" }
        ]));
        write(&dir, "courses.json", json!([
            { "title": "A", "description": "a", "weeks": "4", "tuition": 1000, "minimumSkill": "beginner", "bootcamp": "b1", "user": "u1" },
            { "title": "B", "description": "b", "weeks": "4", "tuition": 2000, "minimumSkill": "advanced", "bootcamp": "b1", "user": "u1" }
        ]));

        let summary = import(&state, &dir).await.unwrap();
        assert_eq!(summary.counts["courses"], json!(2));

        let bootcamps = state
            .store
            .find(bootcamp::COLLECTION, &FilterSet::new(), &Default::default())
            .await
            .unwrap();
        assert_eq!(bootcamps.len(), 1);
        assert_eq!(bootcamps[0]["slug"], json!("devworks-bootcamp"));
        assert_eq!(bootcamps[0]["averageCost"], json!(1500));
        assert_ne!(bootcamps[0]["user"], json!("u1"));

        destroy(&state).await.unwrap();
        assert_eq!(state.store.count(course::COLLECTION, &FilterSet::new()).await.unwrap(), 0);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let state = test_state();
        assert!(import(&state, Path::new("/nonexistent/seed/dir")).await.is_err());
    }
}
