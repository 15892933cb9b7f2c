use std::time::Instant;

use crate::types::{Document, Operation};

/// Data that flows through the observer pipeline for one write
#[derive(Debug, Clone)]
pub struct ObserverContext {
    pub operation: Operation,
    pub schema_name: String,

    /// Before the write: the caller's payload (the patch for updates).
    /// After the write: the stored record, or the removed one for deletes.
    pub record: Document,

    /// Stored record before an update
    pub previous: Option<Document>,

    pub start_time: Instant,
}

impl ObserverContext {
    pub fn new(operation: Operation, schema_name: impl Into<String>, record: Document) -> Self {
        Self {
            operation,
            schema_name: schema_name.into(),
            record,
            previous: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_previous(mut self, previous: Document) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Get total execution time
    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
