//! In-process store: ordered maps of JSON records behind a semaphore-backed session pool.

use crate::error::StoreError;
use crate::filter::{FilterExpr, Predicate};
use crate::query::{project, Direction, OrderBy, Query, Record};
use crate::registry::{Model, Store};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct MemoryStore {
    sessions: Arc<Semaphore>,
}

impl MemoryStore {
    pub fn new(pool_size: usize) -> Self {
        MemoryStore {
            sessions: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    pub fn available_sessions(&self) -> usize {
        self.sessions.available_permits()
    }
}

/// A checked-out pool slot, released on drop.
pub struct MemorySession {
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl Store for MemoryStore {
    type Session = MemorySession;
    type Model = MemoryModel;

    async fn acquire(&self) -> Result<MemorySession, StoreError> {
        let permit = self
            .sessions
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        Ok(MemorySession { _permit: permit })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.sessions.is_closed() {
            return Err(StoreError::PoolClosed);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Record>,
}

pub struct MemoryModel {
    name: String,
    required: Vec<String>,
    table: RwLock<Table>,
}

impl MemoryModel {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryModel {
            name: name.into(),
            required: Vec::new(),
            table: RwLock::new(Table::default()),
        }
    }

    /// Fields that must be present and non-null on every stored record.
    pub fn require<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(fields.into_iter().map(Into::into));
        self
    }

    fn check_required(&self, record: &Record) -> Result<(), StoreError> {
        for field in &self.required {
            if record.get(field).map_or(true, Value::is_null) {
                return Err(StoreError::Rejected(format!("{}.{} is required", self.name, field)));
            }
        }
        Ok(())
    }

    fn read_table(&self) -> std::sync::RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_table(&self) -> std::sync::RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    fn matching(&self, filter: &FilterExpr) -> Result<Vec<Record>, StoreError> {
        let matcher = Matcher::compile(filter)?;
        Ok(self
            .read_table()
            .rows
            .values()
            .filter(|r| matcher.matches(r))
            .cloned()
            .collect())
    }
}

fn record_key(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

#[async_trait]
impl Model for MemoryModel {
    type Session = MemorySession;

    fn name(&self) -> &str {
        &self.name
    }

    async fn all(&self, _session: &mut MemorySession, query: &Query) -> Result<Vec<Record>, StoreError> {
        let mut rows = self.matching(&query.filter)?;
        if !query.order.is_empty() {
            rows.sort_by(|a, b| compare_records(a, b, &query.order));
        }
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query.limit.map_or(usize::MAX, |n| n as usize);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| match &query.only {
                Some(keys) => project(&r, keys),
                None => r,
            })
            .collect())
    }

    async fn count(&self, _session: &mut MemorySession, query: &Query) -> Result<u64, StoreError> {
        Ok(self.matching(&query.filter)?.len() as u64)
    }

    async fn get(&self, _session: &mut MemorySession, id: &str) -> Result<Option<Record>, StoreError> {
        let Ok(key) = id.trim().parse::<i64>() else {
            return Ok(None);
        };
        Ok(self.read_table().rows.get(&key).cloned())
    }

    async fn create(&self, _session: &mut MemorySession, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        for r in &records {
            self.check_required(r)?;
        }
        let mut table = self.write_table();
        let mut out = Vec::with_capacity(records.len());
        for mut record in records {
            table.next_id += 1;
            let id = table.next_id;
            record.insert("id".into(), Value::from(id));
            table.rows.insert(id, record.clone());
            out.push(record);
        }
        Ok(out)
    }

    async fn save(&self, _session: &mut MemorySession, record: &Record, _changed: &[String]) -> Result<(), StoreError> {
        self.check_required(record)?;
        let key = record_key(record).ok_or_else(|| StoreError::Rejected("record has no id".into()))?;
        let mut table = self.write_table();
        match table.rows.get_mut(&key) {
            Some(row) => {
                *row = record.clone();
                Ok(())
            }
            None => Err(StoreError::Rejected(format!("{} {} no longer exists", self.name, key))),
        }
    }

    async fn remove(&self, _session: &mut MemorySession, record: &Record) -> Result<(), StoreError> {
        let key = record_key(record).ok_or_else(|| StoreError::Rejected("record has no id".into()))?;
        match self.write_table().rows.remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::Rejected(format!("{} {} no longer exists", self.name, key))),
        }
    }
}

/// Filter tree with LIKE patterns compiled once per query.
enum Matcher {
    And(Vec<(String, Test)>),
    Or(Vec<Matcher>),
}

enum Test {
    Pred(Predicate),
    Like { re: Regex, negated: bool },
}

impl Matcher {
    fn compile(expr: &FilterExpr) -> Result<Self, StoreError> {
        Ok(match expr {
            FilterExpr::And(preds) => Matcher::And(
                preds
                    .iter()
                    .map(|(field, pred)| {
                        let test = match pred {
                            Predicate::Like(p) => Test::Like { re: like_regex(p)?, negated: false },
                            Predicate::NotLike(p) => Test::Like { re: like_regex(p)?, negated: true },
                            other => Test::Pred(other.clone()),
                        };
                        Ok::<_, StoreError>((field.clone(), test))
                    })
                    .collect::<Result<_, StoreError>>()?,
            ),
            FilterExpr::Or(branches) => Matcher::Or(branches.iter().map(Matcher::compile).collect::<Result<_, _>>()?),
        })
    }

    fn matches(&self, record: &Record) -> bool {
        match self {
            Matcher::And(tests) => tests
                .iter()
                .all(|(field, test)| test.holds(record.get(field).unwrap_or(&Value::Null))),
            Matcher::Or(branches) => branches.iter().any(|b| b.matches(record)),
        }
    }
}

impl Test {
    fn holds(&self, v: &Value) -> bool {
        use Ordering::*;
        match self {
            Test::Like { re, negated } => match like_subject(v) {
                Some(s) => re.is_match(&s) != *negated,
                None => false,
            },
            Test::Pred(p) => match p {
                Predicate::Equals(Value::Null) => v.is_null(),
                Predicate::NotEquals(Value::Null) => !v.is_null(),
                Predicate::Equals(x) => compare_values(v, x) == Some(Equal),
                Predicate::NotEquals(x) => !v.is_null() && compare_values(v, x) != Some(Equal),
                Predicate::GreaterThan(x) => compare_values(v, x) == Some(Greater),
                Predicate::GreaterOrEqual(x) => matches!(compare_values(v, x), Some(Greater | Equal)),
                Predicate::LessThan(x) => compare_values(v, x) == Some(Less),
                Predicate::LessOrEqual(x) => matches!(compare_values(v, x), Some(Less | Equal)),
                Predicate::Between(lo, hi) => {
                    matches!(compare_values(v, lo), Some(Greater | Equal))
                        && matches!(compare_values(v, hi), Some(Less | Equal))
                }
                Predicate::NotBetween(lo, hi) => {
                    compare_values(v, lo) == Some(Less) || compare_values(v, hi) == Some(Greater)
                }
                Predicate::In(set) => !v.is_null() && set.iter().any(|x| compare_values(v, x) == Some(Equal)),
                Predicate::NotIn(set) => {
                    !v.is_null() && set.iter().all(|x| compare_values(v, x) != Some(Equal))
                }
                Predicate::Like(_) | Predicate::NotLike(_) => false,
            },
        }
    }
}

fn like_subject(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// SQL LIKE pattern to an anchored regex: `%` any run, `_` one char, `\` escapes.
fn like_regex(pattern: &str) -> Result<Regex, StoreError> {
    let mut re = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| StoreError::Rejected(format!("invalid like pattern: {}", e)))
}

/// Numbers compare numerically, strings lexicographically; mixed types are incomparable.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => match (integer(a), integer(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            (left == right).then_some(Ordering::Equal)
        }
        _ => None,
    }
}

/// Exact integer value; `None` for floats.
fn integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from))
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

/// Total order for sorting; nulls sort last ascending, first descending.
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

fn compare_records(a: &Record, b: &Record, order: &[OrderBy]) -> Ordering {
    for o in order {
        let av = a.get(&o.field).unwrap_or(&Value::Null);
        let bv = b.get(&o.field).unwrap_or(&Value::Null);
        let ord = sort_cmp(av, bv);
        let ord = match o.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
