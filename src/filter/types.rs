use serde::Serialize;
use serde_json::Value;

/// Comparison operators accepted in bracket syntax: `field[op]=value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    /// Map a bracket suffix to an operator. Only the exact lowercase keyword is accepted.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "in" => FilterOp::In,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
        }
    }
}

/// One field/operator/value triple. `In` always carries an array value.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self { field: field.into(), op, value }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value.into())
    }
}

/// Conjunction of conditions. An empty set matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub conditions: Vec<Condition>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { conditions: vec![Condition::eq(field, value)] }
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Options for a bounded, ordered read against a collection
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Projection; identity is always kept. None returns every field.
    pub select: Option<Vec<String>>,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Neighbouring page reference in list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip)]
    pub total: u64,
    #[serde(skip)]
    pub total_pages: u64,
}

impl Pagination {
    pub fn compute(page: u64, limit: u64, total: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(limit);
        Self {
            prev: (page > 1).then_some(PageRef { page: page - 1, limit }),
            next: (offset.saturating_add(limit) < total).then_some(PageRef { page: page.saturating_add(1), limit }),
            total,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }

    /// Every match returned at once: no neighbouring pages
    pub fn single_page(total: u64) -> Self {
        Self {
            total,
            total_pages: u64::from(total > 0),
            ..Self::default()
        }
    }
}

/// Eager join of a reference field into an embedded sub-object
#[derive(Debug, Clone)]
pub struct Populate {
    pub field: &'static str,
    pub collection: &'static str,
    pub select: &'static [&'static str],
}
