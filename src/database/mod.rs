pub mod store;
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{DocumentStore, GroupAverage, StoreError};
