//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for a resolved table.
//! Identifiers come from config and introspection only; values are bound as text and cast to the column type.

use crate::error::StoreError;
use crate::filter::{FilterExpr, Predicate};
use crate::query::{Direction, Query, Record};
use serde_json::Value;

/// Alias used for the table in every statement.
const ALIAS: &str = "t";

/// `jsonb_build_object` takes at most 100 arguments.
const MAX_PAIRS_PER_OBJECT: usize = 50;

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// Type name as printed by `format_type`, used in casts.
    pub pg_type: String,
}

/// A configured entity resolved against the database catalog.
#[derive(Clone, Debug)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub id_column: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    fn column(&self, name: &str) -> Result<&ColumnInfo, StoreError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownField(name.to_string()))
    }

    fn id(&self) -> Result<&ColumnInfo, StoreError> {
        self.column(&self.id_column)
    }

    fn qualified(&self) -> String {
        format!("{}.{}", quoted(&self.schema), quoted(&self.name))
    }
}

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn col_ref(name: &str) -> String {
    format!("{}.{}", ALIAS, quoted(name))
}

/// Column as read back into a record. `numeric` is read as text so it never passes through f64.
fn col_value(col: &ColumnInfo) -> String {
    if col.pg_type == "numeric" {
        format!("{}::text", col_ref(&col.name))
    } else {
        col_ref(&col.name)
    }
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Option<String>) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Bind a JSON value for the given column: `$n::text::<type>`.
    fn push_typed(&mut self, col: &ColumnInfo, v: &Value) -> String {
        let n = self.push_param(to_pg_text(v, &col.pg_type));
        format!("${}::text::{}", n, col.pg_type)
    }
}

fn is_json_type(pg_type: &str) -> bool {
    matches!(pg_type, "json" | "jsonb")
}

/// Text form of a JSON value as PostgreSQL input. Arrays bound to array columns use array literal syntax;
/// values bound to `json`/`jsonb` columns are serialized whole.
pub fn to_pg_text(v: &Value, pg_type: &str) -> Option<String> {
    match v {
        Value::Null => None,
        other if is_json_type(pg_type) => Some(other.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) if pg_type.ends_with("[]") => Some(array_literal(items)),
        other => Some(other.to_string()),
    }
}

fn array_literal(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_string(),
            Value::Array(inner) => array_literal(inner),
            Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            other => format!("\"{}\"", other.to_string().replace('\\', "\\\\").replace('"', "\\\"")),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn where_sql(table: &TableInfo, filter: &FilterExpr, q: &mut QueryBuf) -> Result<String, StoreError> {
    Ok(match filter {
        FilterExpr::And(preds) if preds.is_empty() => "TRUE".into(),
        FilterExpr::Or(branches) if branches.is_empty() => "FALSE".into(),
        FilterExpr::And(preds) => {
            let parts = preds
                .iter()
                .map(|(field, pred)| predicate_sql(table, field, pred, q))
                .collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(" AND "))
        }
        FilterExpr::Or(branches) => {
            let parts = branches
                .iter()
                .map(|b| where_sql(table, b, q))
                .collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(" OR "))
        }
    })
}

fn predicate_sql(table: &TableInfo, field: &str, pred: &Predicate, q: &mut QueryBuf) -> Result<String, StoreError> {
    let col = table.column(field)?;
    let c = col_ref(&col.name);
    let cmp = |op: &str, v: &Value, q: &mut QueryBuf| format!("{} {} {}", c, op, q.push_typed(col, v));
    Ok(match pred {
        Predicate::Equals(Value::Null) => format!("{} IS NULL", c),
        Predicate::NotEquals(Value::Null) => format!("{} IS NOT NULL", c),
        Predicate::Equals(v) => cmp("=", v, q),
        Predicate::NotEquals(v) => cmp("<>", v, q),
        Predicate::GreaterThan(v) => cmp(">", v, q),
        Predicate::GreaterOrEqual(v) => cmp(">=", v, q),
        Predicate::LessThan(v) => cmp("<", v, q),
        Predicate::LessOrEqual(v) => cmp("<=", v, q),
        Predicate::Between(lo, hi) | Predicate::NotBetween(lo, hi) => {
            let not = if matches!(pred, Predicate::NotBetween(..)) { "NOT " } else { "" };
            let lo = q.push_typed(col, lo);
            let hi = q.push_typed(col, hi);
            format!("{} {}BETWEEN {} AND {}", c, not, lo, hi)
        }
        Predicate::Like(p) => format!("{}::text LIKE ${}", c, q.push_param(Some(p.clone()))),
        Predicate::NotLike(p) => format!("{}::text NOT LIKE ${}", c, q.push_param(Some(p.clone()))),
        Predicate::In(set) if set.is_empty() => "FALSE".into(),
        Predicate::NotIn(set) if set.is_empty() => format!("{} IS NOT NULL", c),
        Predicate::In(set) | Predicate::NotIn(set) => {
            let not = if matches!(pred, Predicate::NotIn(_)) { "NOT " } else { "" };
            let phs: Vec<String> = set.iter().map(|v| q.push_typed(col, v)).collect();
            format!("{} {}IN ({})", c, not, phs.join(", "))
        }
    })
}

fn record_expr(table: &TableInfo, only: Option<&[String]>) -> String {
    let known: Vec<&ColumnInfo> = match only {
        Some(keys) => keys.iter().filter_map(|k| table.column(k).ok()).collect(),
        None if table.columns.iter().any(|c| c.pg_type == "numeric") => table.columns.iter().collect(),
        None => return format!("to_jsonb({})", ALIAS),
    };
    if known.is_empty() {
        return "'{}'::jsonb".into();
    }
    known
        .chunks(MAX_PAIRS_PER_OBJECT)
        .map(|chunk| {
            let pairs: Vec<String> = chunk
                .iter()
                .map(|c| format!("{}, {}", literal(&c.name), col_value(c)))
                .collect();
            format!("jsonb_build_object({})", pairs.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

/// SELECT rows for a query: filter, order (default by id), offset, limit, projection.
pub fn select(table: &TableInfo, query: &Query) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_clause = where_sql(table, &query.filter, &mut q)?;
    let order_clause = if query.order.is_empty() {
        col_ref(&table.id()?.name)
    } else {
        query
            .order
            .iter()
            .map(|o| {
                let col = table.column(&o.field)?;
                let dir = match o.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                Ok::<_, StoreError>(format!("{} {}", col_ref(&col.name), dir))
            })
            .collect::<Result<Vec<_>, StoreError>>()?
            .join(", ")
    };
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = if query.offset > 0 {
        format!(" OFFSET {}", query.offset)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} AS record FROM {} AS {} WHERE {} ORDER BY {}{}{}",
        record_expr(table, query.only.as_deref()),
        table.qualified(),
        ALIAS,
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    Ok(q)
}

/// SELECT COUNT(*) over the query's filter only.
pub fn count(table: &TableInfo, query: &Query) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_clause = where_sql(table, &query.filter, &mut q)?;
    q.sql = format!(
        "SELECT COUNT(*) FROM {} AS {} WHERE {}",
        table.qualified(),
        ALIAS,
        where_clause
    );
    Ok(q)
}

/// SELECT one full record by id. The id is bound as text and cast to the id column type.
pub fn select_by_id(table: &TableInfo, id: &str) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let id_col = table.id()?;
    let ph = q.push_typed(id_col, &Value::String(id.to_string()));
    q.sql = format!(
        "SELECT {} AS record FROM {} AS {a} WHERE {} = {}",
        record_expr(table, None),
        table.qualified(),
        col_ref(&id_col.name),
        ph,
        a = ALIAS
    );
    Ok(q)
}

/// INSERT one record, letting the database assign the id. Returns the stored row.
pub fn insert(table: &TableInfo, record: &Record) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut phs = Vec::new();
    for (k, v) in record {
        if *k == table.id_column {
            continue;
        }
        let col = table.column(k)?;
        cols.push(quoted(&col.name));
        phs.push(q.push_typed(col, v));
    }
    let values = if cols.is_empty() {
        "DEFAULT VALUES".to_string()
    } else {
        format!("({}) VALUES ({})", cols.join(", "), phs.join(", "))
    };
    q.sql = format!(
        "INSERT INTO {} AS {a} {} RETURNING {} AS record",
        table.qualified(),
        values,
        record_expr(table, None),
        a = ALIAS
    );
    Ok(q)
}

/// UPDATE the `changed` fields of the record; the id and untouched columns are left alone.
/// `None` when there is nothing to set.
pub fn update(table: &TableInfo, record: &Record, changed: &[String]) -> Result<Option<QueryBuf>, StoreError> {
    let mut q = QueryBuf::new();
    let id_col = table.id()?;
    let id = record
        .get(&id_col.name)
        .ok_or_else(|| StoreError::Rejected("record has no id".into()))?;
    let mut sets = Vec::new();
    for k in changed {
        if *k == id_col.name {
            continue;
        }
        let Some(v) = record.get(k) else {
            continue;
        };
        let col = table.column(k)?;
        let ph = q.push_typed(col, v);
        sets.push(format!("{} = {}", quoted(&col.name), ph));
    }
    if sets.is_empty() {
        return Ok(None);
    }
    let id_ph = q.push_typed(id_col, id);
    q.sql = format!(
        "UPDATE {} AS {} SET {} WHERE {} = {}",
        table.qualified(),
        ALIAS,
        sets.join(", "),
        col_ref(&id_col.name),
        id_ph
    );
    Ok(Some(q))
}

/// DELETE by the record's id.
pub fn delete(table: &TableInfo, record: &Record) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let id_col = table.id()?;
    let id = record
        .get(&id_col.name)
        .ok_or_else(|| StoreError::Rejected("record has no id".into()))?;
    let ph = q.push_typed(id_col, id);
    q.sql = format!(
        "DELETE FROM {} AS {} WHERE {} = {}",
        table.qualified(),
        ALIAS,
        col_ref(&id_col.name),
        ph
    );
    Ok(q)
}
