use super::schema::{CollectionSchema, FieldDefault, FieldSpec};

pub const COLLECTION: &str = "courses";

pub const SKILLS: &[&str] = &["beginner", "intermediate", "advanced"];

pub static SCHEMA: CollectionSchema = CollectionSchema {
    name: COLLECTION,
    fields: &[
        FieldSpec::string("title")
            .required("Please add a course title")
            .trimmed(),
        FieldSpec::string("description").required("Please add a course description"),
        FieldSpec::string("weeks").required("Please add number of weeks"),
        FieldSpec::number("tuition").required("Please add a tuition cost"),
        FieldSpec::string("minimumSkill")
            .required("Please add a minimum skill")
            .one_of(SKILLS),
        FieldSpec::boolean("scholarshipAvailable").default_to(FieldDefault::Bool(false)),
        FieldSpec::reference("bootcamp", super::bootcamp::COLLECTION).required("Course must belong to a bootcamp"),
        FieldSpec::reference("user", super::user::COLLECTION).required("Course must belong to a user"),
    ],
    unique: &[],
    derived: &[],
    hidden: &[],
};
