use super::schema::{CollectionSchema, FieldDefault, FieldSpec};

pub const COLLECTION: &str = "users";

pub const ROLES: &[&str] = &["user", "publisher", "admin"];

pub static SCHEMA: CollectionSchema = CollectionSchema {
    name: COLLECTION,
    fields: &[
        FieldSpec::string("name").required("Please add a name").trimmed(),
        FieldSpec::string("email").required("Please add an email").trimmed(),
        FieldSpec::string("role")
            .one_of(ROLES)
            .default_to(FieldDefault::Str("user")),
        FieldSpec::string("password").required("Please add a password"),
    ],
    unique: &[&["email"]],
    derived: &[],
    hidden: &["password"],
};
