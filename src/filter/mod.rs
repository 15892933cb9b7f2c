pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod translator;
pub mod error;

pub use types::*;
pub use error::{FilterError, TranslateError};
pub use filter::{QueryPlan, TranslateOptions, DEFAULT_LIMIT, MAX_LIMIT, MAX_OFFSET, RESERVED_KEYS};
pub use filter_order::FilterOrder;
pub use filter_where::FilterWhere;
pub use translator::{AdvancedResults, QueryTranslator};
