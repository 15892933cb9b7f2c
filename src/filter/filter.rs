use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{parse_key, validate_field_name};
use super::types::{Condition, FilterOp, FilterSet, FindOptions, Populate, SortKey};
use crate::models::{CollectionSchema, FieldKind};
use crate::types::{CREATED_AT_FIELD, ID_FIELD};

/// Parameters that control projection, order and pagination instead of filtering
pub const RESERVED_KEYS: &[&str] = &["select", "sort", "page", "limit"];

pub const DEFAULT_LIMIT: u64 = 25;
pub const MAX_LIMIT: u64 = 100;

/// Largest offset a store can address (Postgres `OFFSET` is a signed bigint)
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// How a collection's list endpoint translates its query string
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub reserved_keys: &'static [&'static str],
    pub default_sort: Vec<SortKey>,
    pub default_limit: u64,
    pub max_limit: u64,
    pub populate: Vec<Populate>,
    /// When false, a query without `page` or `limit` returns every match
    pub paginate_by_default: bool,
    /// Used to type filter values and hide protected fields
    pub schema: Option<&'static CollectionSchema>,
    /// Conditions applied regardless of the query string (e.g. a parent scope)
    pub base_filter: FilterSet,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            reserved_keys: RESERVED_KEYS,
            default_sort: vec![SortKey::desc(CREATED_AT_FIELD)],
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            populate: vec![],
            paginate_by_default: true,
            schema: None,
            base_filter: FilterSet::new(),
        }
    }
}

impl TranslateOptions {
    pub fn for_schema(schema: &'static CollectionSchema) -> Self {
        Self { schema: Some(schema), ..Self::default() }
    }

    pub fn with_limits(mut self, default_limit: u64, max_limit: u64) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    pub fn with_populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    pub fn with_base_filter(mut self, condition: Condition) -> Self {
        self.base_filter.push(condition);
        self
    }

    pub fn unpaginated_by_default(mut self) -> Self {
        self.paginate_by_default = false;
        self
    }
}

/// One bounded, ordered, paginated read against a collection
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub filter: FilterSet,
    pub select: Option<Vec<String>>,
    pub sort: Vec<SortKey>,
    pub page: u64,
    /// None reads every matching record
    pub limit: Option<u64>,
}

impl QueryPlan {
    /// Build a plan from raw query parameters. Repeated keys are allowed:
    /// plain repeats become an `in` filter, reserved repeats keep the last value.
    pub fn from_params(params: &[(String, String)], options: &TranslateOptions) -> Result<Self, FilterError> {
        let mut select_raw: Option<&str> = None;
        let mut sort_raw: Option<&str> = None;
        let mut page_raw: Option<&str> = None;
        let mut limit_raw: Option<&str> = None;

        // field -> raw values, in first-seen order
        let mut equalities: Vec<(String, Vec<&str>)> = Vec::new();
        let mut memberships: Vec<(String, Vec<&str>)> = Vec::new();
        let mut filter = options.base_filter.clone();

        for (key, value) in params {
            if options.reserved_keys.contains(&key.as_str()) {
                match key.as_str() {
                    "select" => select_raw = Some(value.as_str()),
                    "sort" => sort_raw = Some(value.as_str()),
                    "page" => page_raw = Some(value.as_str()),
                    "limit" => limit_raw = Some(value.as_str()),
                    _ => {}
                }
                continue;
            }

            let (field, op) = parse_key(key)?;
            if options.schema.is_some_and(|s| s.is_hidden(&field)) {
                return Err(FilterError::ForbiddenField(field));
            }

            match op {
                None => push_grouped(&mut equalities, field, value),
                Some(FilterOp::In) => {
                    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                        push_grouped(&mut memberships, field.clone(), item);
                    }
                    // `field[in]=` still constrains the field, to nothing
                    if !memberships.iter().any(|(f, _)| *f == field) {
                        memberships.push((field, vec![]));
                    }
                }
                Some(op) => {
                    let typed = coerce(options.schema, &field, value)?;
                    filter.push(Condition::new(field, op, typed));
                }
            }
        }

        for (field, values) in equalities {
            let condition = if values.len() == 1 {
                Condition::new(field.clone(), FilterOp::Eq, coerce(options.schema, &field, values[0])?)
            } else {
                Condition::new(field.clone(), FilterOp::In, coerce_all(options.schema, &field, &values)?)
            };
            filter.push(condition);
        }
        for (field, values) in memberships {
            let typed = coerce_all(options.schema, &field, &values)?;
            filter.push(Condition::new(field, FilterOp::In, typed));
        }

        let select = select_raw.map(|raw| parse_select(raw, options.schema)).transpose()?;

        let sort = match sort_raw.map(FilterOrder::parse).transpose()? {
            Some(keys) if !keys.is_empty() => keys,
            _ => options.default_sort.clone(),
        };

        let max_limit = options.max_limit.max(1);
        let page = page_raw.and_then(parse_positive).unwrap_or(1);
        let limit = if options.paginate_by_default || page_raw.is_some() || limit_raw.is_some() {
            let limit = limit_raw
                .and_then(parse_positive)
                .unwrap_or(options.default_limit)
                .clamp(1, max_limit);
            Some(limit)
        } else {
            None
        };

        Ok(Self {
            filter,
            select,
            sort: FilterOrder::with_tie_break(sort),
            page,
            limit,
        })
    }

    pub fn offset(&self) -> u64 {
        match self.limit {
            Some(limit) => self.page.saturating_sub(1).saturating_mul(limit).min(MAX_OFFSET),
            None => 0,
        }
    }

    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            select: self.select.clone(),
            sort: self.sort.clone(),
            skip: self.offset(),
            limit: self.limit,
        }
    }
}

fn push_grouped<'a>(groups: &mut Vec<(String, Vec<&'a str>)>, field: String, value: &'a str) {
    match groups.iter_mut().find(|(f, _)| *f == field) {
        Some((_, values)) => values.push(value),
        None => groups.push((field, vec![value])),
    }
}

/// Non-numeric, zero and negative values fall back to the default
fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

/// `select=a,b,c` keeps exactly those fields plus identity; hidden fields are
/// dropped, so a selection of only hidden fields still projects to `id`
fn parse_select(raw: &str, schema: Option<&CollectionSchema>) -> Result<Vec<String>, FilterError> {
    let mut fields: Vec<String> = vec![ID_FIELD.to_string()];
    for field in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        validate_field_name(field)?;
        if schema.is_some_and(|s| s.is_hidden(field)) || fields.iter().any(|f| f == field) {
            continue;
        }
        fields.push(field.to_string());
    }
    Ok(fields)
}

/// Type a raw query value by the schema's field kind. Unknown fields stay strings.
fn coerce(schema: Option<&CollectionSchema>, field: &str, raw: &str) -> Result<Value, FilterError> {
    let kind = schema.and_then(|s| s.field(field)).map(|f| f.kind);
    let invalid = || FilterError::InvalidValue { field: field.to_string(), value: raw.to_string() };

    match kind {
        Some(FieldKind::Number) => {
            let trimmed = raw.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                return Ok(Value::from(n));
            }
            let n = trimmed.parse::<f64>().map_err(|_| invalid())?;
            serde_json::Number::from_f64(n).map(Value::Number).ok_or_else(invalid)
        }
        Some(FieldKind::Boolean) => match raw.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn coerce_all(schema: Option<&CollectionSchema>, field: &str, raws: &[&str]) -> Result<Value, FilterError> {
    raws.iter()
        .map(|raw| coerce(schema, field, raw))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}
