// Observer implementations organized by rings

// Ring 1: Input Validation - payload checks before any write
#[path = "1/derived_field_guard.rs"]
pub mod derived_field_guard;

// Ring 7: Aggregation - derived summaries after the write (async)
#[path = "7/aggregate_maintainer.rs"]
pub mod aggregate_maintainer;

pub use aggregate_maintainer::*;
pub use derived_field_guard::*;

use std::sync::Arc;

use crate::observer::pipeline::ObserverPipeline;
use crate::observer::traits::ObserverBox;

/// Pipeline with every built-in observer registered
pub fn register_all(maintainer: Arc<AggregateMaintainer>, await_async: bool) -> ObserverPipeline {
    let mut pipeline = ObserverPipeline::new().with_await_async(await_async);
    pipeline.register_observer(ObserverBox::InputValidation(Box::new(DerivedFieldGuard)));
    pipeline.register_observer(ObserverBox::Aggregation(maintainer));
    pipeline
}
