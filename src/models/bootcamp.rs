use super::schema::{CollectionSchema, FieldDefault, FieldSpec};

pub const COLLECTION: &str = "bootcamps";

pub const AVERAGE_COST: &str = "averageCost";
pub const AVERAGE_RATING: &str = "averageRating";

pub const CAREERS: &[&str] = &[
    "Web Development",
    "Mobile Development",
    "UI/UX",
    "Data Science",
    "Business",
    "Other",
];

pub static SCHEMA: CollectionSchema = CollectionSchema {
    name: COLLECTION,
    fields: &[
        FieldSpec::string("name")
            .required("Please add a name")
            .max_length(50)
            .trimmed(),
        FieldSpec::string("slug"),
        FieldSpec::string("description")
            .required("Please add a description")
            .max_length(500),
        FieldSpec::string("website"),
        FieldSpec::string("phone").max_length(20),
        FieldSpec::string("email"),
        FieldSpec::string("address"),
        FieldSpec::new("careers", super::FieldKind::StringArray)
            .required("Please add at least one career")
            .one_of(CAREERS),
        FieldSpec::number(AVERAGE_RATING).range(1.0, 10.0),
        FieldSpec::number(AVERAGE_COST),
        FieldSpec::string("photo").default_to(FieldDefault::Str("no-photo.jpg")),
        FieldSpec::boolean("housing").default_to(FieldDefault::Bool(false)),
        FieldSpec::boolean("jobAssistance").default_to(FieldDefault::Bool(false)),
        FieldSpec::boolean("jobGuarantee").default_to(FieldDefault::Bool(false)),
        FieldSpec::boolean("acceptGi").default_to(FieldDefault::Bool(false)),
        FieldSpec::reference("user", super::user::COLLECTION).required("Bootcamp must belong to a user"),
    ],
    unique: &[&["name"]],
    derived: &[AVERAGE_COST, AVERAGE_RATING],
    hidden: &[],
};

/// URL-friendly slug derived from the bootcamp name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
