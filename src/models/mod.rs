// Collection schemas for the bootcamp directory

pub mod schema;
pub mod bootcamp;
pub mod course;
pub mod review;
pub mod user;

pub use schema::{CollectionSchema, FieldDefault, FieldErrors, FieldKind, FieldSpec};

/// Every collection known to the service, in dependency order
pub static COLLECTIONS: &[&CollectionSchema] = &[
    &user::SCHEMA,
    &bootcamp::SCHEMA,
    &course::SCHEMA,
    &review::SCHEMA,
];

/// Look up the schema of a collection by name
pub fn schema_for(collection: &str) -> Option<&'static CollectionSchema> {
    COLLECTIONS.iter().copied().find(|s| s.name == collection)
}
