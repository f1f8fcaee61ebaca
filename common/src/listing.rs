//! In-memory filtering, sorting and page/limit pagination over a fully fetched
//! result set, plus the JSON value ordering shared with the store backends.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 6;
pub const MAX_LIMIT: usize = 100;

/// Compare two JSON values of the same kind. Numbers compare numerically,
/// strings lexicographically, booleans false < true. Anything else, or two
/// different kinds, is incomparable.
pub fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Ordering for sort keys: missing or null values go last. Values of
/// different kinds order as string < number < bool < array < object, the
/// same way Postgres orders `jsonb`; arrays and objects tie among themselves.
pub fn compare_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (Some(a), Some(b)) => {
            compare_json(a, b).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b)))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Stable sort by a top-level field of each item's JSON form.
///
/// Items lacking the field stay after every item that has it, in both
/// directions.
pub fn sort_by_field<T: Serialize>(items: Vec<T>, field: &str, order: SortOrder) -> Vec<T> {
    let mut keyed: Vec<(Option<Value>, T)> = items
        .into_iter()
        .map(|item| {
            let key = serde_json::to_value(&item)
                .ok()
                .and_then(|mut v| v.get_mut(field).map(Value::take));
            (key, item)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let present = (a.as_ref().filter(|v| !v.is_null()), b.as_ref().filter(|v| !v.is_null()));
        match (order, present) {
            (SortOrder::Desc, (Some(a), Some(b))) => compare_keys(Some(b), Some(a)),
            _ => compare_keys(a.as_ref(), b.as_ref()),
        }
    });

    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Rejected page/limit values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    ZeroPage,
    LimitOutOfRange(usize),
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroPage => write!(f, "page numbers start at 1"),
            Self::LimitOutOfRange(limit) => {
                write!(f, "limit {limit} must be between 1 and {MAX_LIMIT}")
            }
        }
    }
}

impl std::error::Error for PageError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Result<Self, PageError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if page == 0 {
            return Err(PageError::ZeroPage);
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(PageError::LimitOutOfRange(limit));
        }
        Ok(PageRequest { page, limit })
    }
}

/// One page of a larger in-memory result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.limit)
    }
}

pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total = items.len();
    let items = items
        .into_iter()
        .skip((request.page - 1).saturating_mul(request.limit))
        .take(request.limit)
        .collect();
    Page {
        items,
        total,
        page: request.page,
        limit: request.limit,
    }
}
