use super::schema::{CollectionSchema, FieldSpec};

pub const COLLECTION: &str = "reviews";

pub static SCHEMA: CollectionSchema = CollectionSchema {
    name: COLLECTION,
    fields: &[
        FieldSpec::string("title")
            .required("Please add a title for the review")
            .max_length(100)
            .trimmed(),
        FieldSpec::string("text").required("Please add some text"),
        FieldSpec::number("rating")
            .required("Please add a rating between 1 and 10")
            .range(1.0, 10.0),
        FieldSpec::reference("bootcamp", super::bootcamp::COLLECTION).required("Review must belong to a bootcamp"),
        FieldSpec::reference("user", super::user::COLLECTION).required("Review must belong to a user"),
    ],
    // One review per user per bootcamp
    unique: &[&["bootcamp", "user"]],
    derived: &[],
    hidden: &[],
};
