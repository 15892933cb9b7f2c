use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::types::Operation;

/// Observer rings with semantic meaning - synchronous (0-6) and asynchronous (7-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    InputValidation = 1, // Caller payload checks, before any write
    Aggregation = 7,     // Derived summaries on related records (async)
}

impl ObserverRing {
    /// Check if ring executes synchronously (blocking)
    pub fn is_synchronous(&self) -> bool {
        (*self as u8) <= 6
    }

    /// Check if ring executes asynchronously (non-blocking)
    pub fn is_asynchronous(&self) -> bool {
        (*self as u8) >= 7
    }
}

/// Base trait for all observers with metadata and applicability checks
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    /// Check if observer applies to this operation
    fn applies_to_operation(&self, op: Operation) -> bool;

    /// Check if observer applies to this schema
    fn applies_to_schema(&self, schema: &str) -> bool;

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

/// Ring 1: Input Validation - runs inline, an error aborts the write
#[async_trait]
pub trait InputValidationObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Ring 7: Aggregation - runs detached after the write, errors are only logged
#[async_trait]
pub trait AggregationObserver: Observer {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError>;
}

/// Concrete observer types for dynamic dispatch. Async observers are shared
/// so detached tasks can hold them.
pub enum ObserverBox {
    InputValidation(Box<dyn InputValidationObserver>),
    Aggregation(Arc<dyn AggregationObserver>),
}

impl ObserverBox {
    pub fn name(&self) -> &'static str {
        match self {
            ObserverBox::InputValidation(o) => o.name(),
            ObserverBox::Aggregation(o) => o.name(),
        }
    }

    pub fn ring(&self) -> ObserverRing {
        match self {
            ObserverBox::InputValidation(o) => o.ring(),
            ObserverBox::Aggregation(o) => o.ring(),
        }
    }

    pub fn applies_to(&self, op: Operation, schema: &str) -> bool {
        match self {
            ObserverBox::InputValidation(o) => o.applies_to_operation(op) && o.applies_to_schema(schema),
            ObserverBox::Aggregation(o) => o.applies_to_operation(op) && o.applies_to_schema(schema),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            ObserverBox::InputValidation(o) => o.timeout(),
            ObserverBox::Aggregation(o) => o.timeout(),
        }
    }
}
