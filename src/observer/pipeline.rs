// Observer pipeline: synchronous rings run inline before the write,
// asynchronous rings run detached after it

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::models::FieldErrors;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{AggregationObserver, ObserverBox, ObserverRing};

pub struct ObserverPipeline {
    // Observer registry by ring, iterated in ring order
    observers: BTreeMap<ObserverRing, Vec<ObserverBox>>,

    // Wait for detached rings before returning from `notify`
    await_async: bool,
}

impl ObserverPipeline {
    pub fn new() -> Self {
        Self {
            observers: BTreeMap::new(),
            await_async: false,
        }
    }

    pub fn with_await_async(mut self, await_async: bool) -> Self {
        self.await_async = await_async;
        self
    }

    /// Register an observer (type-safe registration)
    pub fn register_observer(&mut self, observer: ObserverBox) {
        let ring = observer.ring();
        let name = observer.name();
        self.observers.entry(ring).or_default().push(observer);

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    /// Run the synchronous rings. Validation failures from every observer in a
    /// ring are merged; any other failure stops the pipeline immediately.
    pub async fn run_sync(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        for (ring, observers) in self.observers.iter().filter(|(r, _)| r.is_synchronous()) {
            let mut field_errors = FieldErrors::new();
            let mut messages = Vec::new();

            for observer in observers {
                let ObserverBox::InputValidation(inner) = observer else {
                    continue;
                };
                if !observer.applies_to(ctx.operation, &ctx.schema_name) {
                    tracing::trace!("Observer {} skipped for {:?} on {}", observer.name(), ctx.operation, ctx.schema_name);
                    continue;
                }

                let observer_start = Instant::now();
                match timeout(observer.timeout(), inner.execute(ctx)).await {
                    Ok(Ok(())) => {
                        tracing::debug!("Observer: {} completed in {:?}", observer.name(), observer_start.elapsed());
                    }
                    Ok(Err(ObserverError::Validation { message, field_errors: errors })) => {
                        tracing::debug!("Observer: {} rejected input: {}", observer.name(), message);
                        messages.push(message);
                        field_errors.extend(errors);
                    }
                    Ok(Err(error)) => {
                        tracing::warn!("Observer: {} failed: {}", observer.name(), error);
                        return Err(error);
                    }
                    Err(_) => {
                        tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
                        return Err(ObserverError::Timeout(format!(
                            "Observer {} timed out after {:?}",
                            observer.name(),
                            observer.timeout()
                        )));
                    }
                }
            }

            if !messages.is_empty() {
                tracing::debug!("Observer pipeline stopped at ring {:?}", ring);
                return Err(ObserverError::validation(messages.join(", "), field_errors));
            }
        }
        Ok(())
    }

    /// Hand the written record to the asynchronous rings on a detached task.
    /// The returned handle never resolves to an observer error.
    pub fn dispatch_async(&self, ctx: ObserverContext) -> JoinHandle<()> {
        let observers: Vec<Arc<dyn AggregationObserver>> = self
            .observers
            .iter()
            .filter(|(ring, _)| ring.is_asynchronous())
            .flat_map(|(_, observers)| observers)
            .filter(|observer| observer.applies_to(ctx.operation, &ctx.schema_name))
            .filter_map(|observer| match observer {
                ObserverBox::Aggregation(inner) => Some(inner.clone()),
                _ => None,
            })
            .collect();

        tokio::spawn(async move {
            join_all(observers.into_iter().map(|observer| run_detached(observer, &ctx))).await;
        })
    }

    /// Dispatch the asynchronous rings, awaiting them only when configured to
    pub async fn notify(&self, ctx: ObserverContext) {
        let handle = self.dispatch_async(ctx);
        if self.await_async {
            if let Err(e) = handle.await {
                tracing::error!("Async observer task failed to complete: {}", e);
            }
        }
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one async observer with its own timeout and error boundary
async fn run_detached(observer: Arc<dyn AggregationObserver>, ctx: &ObserverContext) {
    let started = Instant::now();
    match timeout(observer.timeout(), observer.execute(ctx)).await {
        Ok(Ok(())) => {
            tracing::debug!(
                "Observer: {} completed for {:?} on {} in {:?}",
                observer.name(),
                ctx.operation,
                ctx.schema_name,
                started.elapsed()
            );
        }
        Ok(Err(error)) => {
            tracing::error!(
                "Observer: {} failed for {:?} on {}: {}",
                observer.name(),
                ctx.operation,
                ctx.schema_name,
                error
            );
        }
        Err(_) => {
            tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::traits::{InputValidationObserver, Observer};
    use crate::types::{Document, Operation};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Rejects(&'static str);

    impl Observer for Rejects {
        fn name(&self) -> &'static str {
            "Rejects"
        }
        fn ring(&self) -> ObserverRing {
            ObserverRing::InputValidation
        }
        fn applies_to_operation(&self, op: Operation) -> bool {
            op == Operation::Create
        }
        fn applies_to_schema(&self, _schema: &str) -> bool {
            true
        }
    }

    #[async_trait]
    impl InputValidationObserver for Rejects {
        async fn execute(&self, _ctx: &mut ObserverContext) -> Result<(), ObserverError> {
            let mut errors = FieldErrors::new();
            errors.insert(self.0.to_string(), "not allowed".to_string());
            Err(ObserverError::validation(format!("{} not allowed", self.0), errors))
        }
    }

    struct Counter {
        calls: Arc<AtomicUsize>,
        fail: bool,
        delay: Duration,
    }

    impl Observer for Counter {
        fn name(&self) -> &'static str {
            "Counter"
        }
        fn ring(&self) -> ObserverRing {
            ObserverRing::Aggregation
        }
        fn applies_to_operation(&self, _op: Operation) -> bool {
            true
        }
        fn applies_to_schema(&self, schema: &str) -> bool {
            schema == "courses"
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }
    }

    #[async_trait]
    impl AggregationObserver for Counter {
        async fn execute(&self, _ctx: &ObserverContext) -> Result<(), ObserverError> {
            tokio::time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ObserverError::Aggregation("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn ctx(op: Operation, schema: &str) -> ObserverContext {
        ObserverContext::new(op, schema, Document::new())
    }

    #[tokio::test]
    async fn sync_ring_merges_validation_errors() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(ObserverBox::InputValidation(Box::new(Rejects("a"))));
        pipeline.register_observer(ObserverBox::InputValidation(Box::new(Rejects("b"))));

        let err = pipeline.run_sync(&mut ctx(Operation::Create, "courses")).await.unwrap_err();
        match err {
            ObserverError::Validation { field_errors, .. } => {
                assert!(field_errors.contains_key("a"));
                assert!(field_errors.contains_key("b"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(pipeline.run_sync(&mut ctx(Operation::Delete, "courses")).await.is_ok());
    }

    #[tokio::test]
    async fn async_failures_and_timeouts_are_contained() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(ObserverBox::Aggregation(Arc::new(Counter {
            calls: calls.clone(),
            fail: true,
            delay: Duration::ZERO,
        })));
        pipeline.register_observer(ObserverBox::Aggregation(Arc::new(Counter {
            calls: calls.clone(),
            fail: false,
            delay: Duration::from_secs(5),
        })));

        // Resolves without panicking even though one observer errors and one times out
        pipeline.dispatch_async(ctx(Operation::Create, "courses")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        pipeline.dispatch_async(ctx(Operation::Create, "reviews")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
