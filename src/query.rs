//! Query builder: filter, ordering, pagination and projection for one `find`.

use crate::filter::FilterExpr;
use serde_json::{Map, Value};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// An open record: field name to store-defined value.
pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Parse an order directive: comma separated fields, `-field` for descending.
pub fn parse_order(directive: &str) -> Vec<OrderBy> {
    directive
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let (direction, field) = match s.strip_prefix('-') {
                Some(rest) => (Direction::Desc, rest),
                None => (Direction::Asc, s.strip_prefix('+').unwrap_or(s)),
            };
            let field = field.trim();
            (!field.is_empty()).then(|| OrderBy {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}

/// Resolve the `limit` parameter. Never fails: anything outside (0, 1000] becomes the default.
pub fn resolve_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0 && *n <= i64::from(MAX_LIMIT))
        .map(|n| n as u32)
        .unwrap_or(DEFAULT_LIMIT)
}

/// Parse the `skip` parameter. `None` when the value is not a non-negative integer.
pub fn parse_skip(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

/// Split a `keys` parameter into field names.
pub fn parse_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Copy only the requested keys present on the record.
pub fn project(record: &Record, keys: &[String]) -> Record {
    keys.iter()
        .filter_map(|k| record.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

/// Composable, lazily executed query. Built by `Model::find` and run by `all`, `first` or `count`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filter: FilterExpr,
    pub order: Vec<OrderBy>,
    pub offset: u64,
    pub limit: Option<u32>,
    pub only: Option<Vec<String>>,
}

impl Query {
    pub fn new(filter: FilterExpr) -> Self {
        Query {
            filter,
            ..Query::default()
        }
    }

    pub fn order(mut self, directive: &str) -> Self {
        self.order.extend(parse_order(directive));
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = n;
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn only(mut self, fields: Vec<String>) -> Self {
        self.only = Some(fields);
        self
    }

    /// Same filter without ordering, paging or projection; what `count` runs against.
    pub fn unpaged(&self) -> Query {
        Query::new(self.filter.clone())
    }
}
