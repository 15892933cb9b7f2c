// Ring 7: keeps denormalized averages on a parent in step with its children
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::database::store::DocumentStore;
use crate::filter::{FilterSet, FindOptions};
use crate::models::{bootcamp, course, review};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{AggregationObserver, Observer, ObserverRing};
use crate::types::{doc_id, doc_str, number_value, Document, Operation};

type LockKey = (String, String);

/// Rounding applied to a mean before it is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    None,
    /// Round up to the next multiple of ten
    CeilTens,
}

impl Rounding {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Rounding::None => value,
            Rounding::CeilTens => (value / 10.0).ceil() * 10.0,
        }
    }
}

/// One derived field: the mean of `source` over the children of a parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateRule {
    pub child: &'static str,
    pub parent: &'static str,
    /// Child field holding the parent identity
    pub reference: &'static str,
    pub source: &'static str,
    pub target: &'static str,
    pub rounding: Rounding,
}

pub const AVERAGE_COST: AggregateRule = AggregateRule {
    child: course::COLLECTION,
    parent: bootcamp::COLLECTION,
    reference: "bootcamp",
    source: "tuition",
    target: bootcamp::AVERAGE_COST,
    rounding: Rounding::CeilTens,
};

pub const AVERAGE_RATING: AggregateRule = AggregateRule {
    child: review::COLLECTION,
    parent: bootcamp::COLLECTION,
    reference: "bootcamp",
    source: "rating",
    target: bootcamp::AVERAGE_RATING,
    rounding: Rounding::None,
};

pub struct AggregateMaintainer {
    store: Arc<dyn DocumentStore>,
    rules: Vec<AggregateRule>,
    timeout: Duration,
    // One lock per (target, parent) so recomputes of the same field never interleave
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl AggregateMaintainer {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self::with_rules(store, timeout, vec![AVERAGE_COST, AVERAGE_RATING])
    }

    pub fn with_rules(store: Arc<dyn DocumentStore>, timeout: Duration, rules: Vec<AggregateRule>) -> Self {
        Self {
            store,
            rules,
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Recompute every derived field fed by the mutated child. Reached from
    /// the pipeline's async ring, which owns the detached task, the timeout
    /// and the error boundary.
    pub async fn on_child_mutated(&self, ctx: &ObserverContext) -> Result<(), ObserverError> {
        let mut failures = Vec::new();
        for rule in self.rules.iter().filter(|rule| rule.child == ctx.schema_name) {
            for parent_id in Self::affected_parents(rule, ctx) {
                if let Err(e) = self.recompute(rule, &parent_id).await {
                    failures.push(format!("{}/{} {}: {}", rule.parent, parent_id, rule.target, e));
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ObserverError::Aggregation(failures.join("; ")))
        }
    }

    /// Parents whose derived field may have changed because of this write
    pub fn affected_parents(rule: &AggregateRule, ctx: &ObserverContext) -> Vec<String> {
        let current = doc_str(&ctx.record, rule.reference).map(str::to_string);

        if ctx.operation != Operation::Update {
            return current.into_iter().collect();
        }
        let Some(previous) = &ctx.previous else {
            return current.into_iter().collect();
        };

        let old_parent = doc_str(previous, rule.reference).map(str::to_string);
        let moved = old_parent != current;
        let source_changed = previous.get(rule.source) != ctx.record.get(rule.source);
        if !moved && !source_changed {
            return vec![];
        }

        let mut parents: Vec<String> = current.into_iter().collect();
        if moved {
            parents.extend(old_parent);
        }
        parents
    }

    /// Recompute one parent's derived field from the live child set and store it.
    /// Returns the stored value; None when no children remain (stored as null).
    pub async fn recompute(&self, rule: &AggregateRule, parent_id: &str) -> Result<Option<f64>, ObserverError> {
        let key: LockKey = (rule.target.to_string(), parent_id.to_string());
        let lock = self.locks.lock().await.entry(key.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().await;
            self.store_average(rule, parent_id).await
        };

        self.release(&key, lock).await;
        result
    }

    /// Drop the per-parent lock once no other recompute holds or awaits it
    async fn release(&self, key: &LockKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // the table and this caller are the only holders
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    async fn store_average(&self, rule: &AggregateRule, parent_id: &str) -> Result<Option<f64>, ObserverError> {
        let filter = FilterSet::eq(rule.reference, parent_id);
        let rows = self
            .store
            .aggregate_group_by(rule.child, &filter, rule.reference, rule.source)
            .await?;

        let parent_key = Value::String(parent_id.to_string());
        let value = rows
            .into_iter()
            .find(|row| row.key == parent_key)
            .map(|row| rule.rounding.apply(row.average));

        let mut patch = Document::new();
        patch.insert(rule.target.to_string(), value.map(number_value).unwrap_or(Value::Null));

        match self.store.update_by_id(rule.parent, parent_id, patch).await? {
            Some(_) => debug!("{}/{} {} = {:?}", rule.parent, parent_id, rule.target, value),
            None => debug!("{}/{} no longer exists; {} not stored", rule.parent, parent_id, rule.target),
        }
        Ok(value)
    }

    /// Recompute every rule for every parent, e.g. after a bulk import
    pub async fn recompute_all(&self) -> Result<usize, ObserverError> {
        let mut updated = 0;
        for rule in &self.rules {
            let parents = self
                .store
                .find(rule.parent, &FilterSet::new(), &FindOptions::default())
                .await?;
            for parent in &parents {
                if let Some(id) = doc_id(parent) {
                    self.recompute(rule, id).await?;
                    updated += 1;
                }
            }
        }
        info!("Recomputed {} derived fields", updated);
        Ok(updated)
    }
}

impl Observer for AggregateMaintainer {
    fn name(&self) -> &'static str {
        "AggregateMaintainer"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Aggregation
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        self.rules.iter().any(|rule| rule.child == schema)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl AggregationObserver for AggregateMaintainer {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError> {
        self.on_child_mutated(ctx).await
    }
}
