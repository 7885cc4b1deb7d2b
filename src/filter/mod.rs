//! Filter translation: client `where` JSON into a typed [`FilterExpr`] tree.
//!
//! Top-level keys form an implicit conjunction of per-field predicates. The
//! reserved key `$or`, when bound to an array, replaces the whole level with a
//! disjunction of recursively translated sub-filters; sibling keys are ignored
//! in that case.

mod operator;

pub use operator::Operator;

use serde_json::{Map, Value};
use thiserror::Error;

/// Reserved key introducing a disjunction.
pub const OR_KEY: &str = "$or";

/// A single per-field test.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Equals(Value),
    NotEquals(Value),
    GreaterThan(Value),
    GreaterOrEqual(Value),
    LessThan(Value),
    LessOrEqual(Value),
    Between(Value, Value),
    NotBetween(Value, Value),
    Like(String),
    NotLike(String),
    In(Vec<Value>),
    NotIn(Vec<Value>),
}

/// Store-agnostic predicate tree.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterExpr {
    /// Every `(field, predicate)` must hold. Empty matches everything.
    And(Vec<(String, Predicate)>),
    /// At least one branch must hold. Empty matches nothing.
    Or(Vec<FilterExpr>),
}

impl Default for FilterExpr {
    fn default() -> Self {
        FilterExpr::match_all()
    }
}

impl FilterExpr {
    pub fn match_all() -> Self {
        FilterExpr::And(Vec::new())
    }

    pub fn match_none() -> Self {
        FilterExpr::Or(Vec::new())
    }
}

/// How malformed range operands are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// A `$between`/`$not_between` operand that is not a two-element array drops the constraint.
    #[default]
    Lenient,
    /// Such operands reject the request.
    Strict,
}

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("where is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("where must be a JSON object")]
    NotAnObject,
    #[error("field '{field}': {operator} expects a two-element array")]
    MalformedRange { field: String, operator: &'static str },
}

/// Parse and translate the raw `where` query parameter.
pub fn parse_where(raw: &str, mode: FilterMode) -> Result<FilterExpr, FilterError> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Object(map) => translate(&map, mode),
        _ => Err(FilterError::NotAnObject),
    }
}

/// Translate one level of a filter object.
pub fn translate(filter: &Map<String, Value>, mode: FilterMode) -> Result<FilterExpr, FilterError> {
    if let Some(Value::Array(branches)) = filter.get(OR_KEY) {
        let mut out = Vec::with_capacity(branches.len());
        for branch in branches {
            out.push(match branch {
                Value::Object(map) => translate(map, mode)?,
                _ => FilterExpr::match_none(),
            });
        }
        return Ok(FilterExpr::Or(out));
    }

    let mut preds = Vec::with_capacity(filter.len());
    for (field, value) in filter {
        if field == OR_KEY {
            continue;
        }
        if let Some(pred) = translate_field(field, value, mode)? {
            preds.push((field.clone(), pred));
        }
    }
    Ok(FilterExpr::And(preds))
}

fn translate_field(field: &str, value: &Value, mode: FilterMode) -> Result<Option<Predicate>, FilterError> {
    let map = match value {
        Value::Array(items) => return Ok(Some(Predicate::In(items.clone()))),
        Value::Object(map) => map,
        scalar => return Ok(Some(Predicate::Equals(scalar.clone()))),
    };
    // Operator objects carry exactly one key; anything else is a no-op.
    let mut entries = map.iter();
    let (Some((key, operand)), None) = (entries.next(), entries.next()) else {
        return Ok(None);
    };
    let Some(op) = Operator::parse(key) else {
        tracing::debug!(field, operator = %key, "ignoring unrecognized filter operator");
        return Ok(None);
    };

    let pred = match op {
        Operator::Eq => Predicate::Equals(operand.clone()),
        Operator::Ne => Predicate::NotEquals(operand.clone()),
        Operator::Gt => Predicate::GreaterThan(operand.clone()),
        Operator::Gte => Predicate::GreaterOrEqual(operand.clone()),
        Operator::Lt => Predicate::LessThan(operand.clone()),
        Operator::Lte => Predicate::LessOrEqual(operand.clone()),
        Operator::Between | Operator::NotBetween => {
            let Some((lo, hi)) = range_operand(operand) else {
                return match mode {
                    FilterMode::Lenient => Ok(None),
                    FilterMode::Strict => Err(FilterError::MalformedRange {
                        field: field.to_string(),
                        operator: op.as_str(),
                    }),
                };
            };
            if op == Operator::Between {
                Predicate::Between(lo, hi)
            } else {
                Predicate::NotBetween(lo, hi)
            }
        }
        Operator::Like => Predicate::Like(pattern_text(operand)),
        Operator::NotLike => Predicate::NotLike(pattern_text(operand)),
        Operator::In => Predicate::In(set_operand(operand)),
        Operator::NotIn => Predicate::NotIn(set_operand(operand)),
    };
    Ok(Some(pred))
}

fn range_operand(v: &Value) -> Option<(Value, Value)> {
    match v.as_array().map(Vec::as_slice) {
        Some([lo, hi]) => Some((lo.clone(), hi.clone())),
        _ => None,
    }
}

fn set_operand(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn pattern_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(v: Value) -> FilterExpr {
        translate(v.as_object().unwrap(), FilterMode::Lenient).unwrap()
    }

    #[test]
    fn scalar_is_equals_and_array_is_membership() {
        let f = t(json!({"color": "red", "qty": [1, 2]}));
        assert_eq!(
            f,
            FilterExpr::And(vec![
                ("color".into(), Predicate::Equals(json!("red"))),
                ("qty".into(), Predicate::In(vec![json!(1), json!(2)])),
            ])
        );
    }

    #[test]
    fn every_operator_maps_to_its_predicate() {
        let cases = [
            (json!({"$eq": 1}), Predicate::Equals(json!(1))),
            (json!({"$ne": 1}), Predicate::NotEquals(json!(1))),
            (json!({"$gt": 1}), Predicate::GreaterThan(json!(1))),
            (json!({"$gte": 1}), Predicate::GreaterOrEqual(json!(1))),
            (json!({"$lt": 1}), Predicate::LessThan(json!(1))),
            (json!({"$lte": 1}), Predicate::LessOrEqual(json!(1))),
            (json!({"$between": [1, 5]}), Predicate::Between(json!(1), json!(5))),
            (json!({"$not_between": [1, 5]}), Predicate::NotBetween(json!(1), json!(5))),
            (json!({"$like": "r%"}), Predicate::Like("r%".into())),
            (json!({"$not_like": "r%"}), Predicate::NotLike("r%".into())),
            (json!({"$in": [1]}), Predicate::In(vec![json!(1)])),
            (json!({"$not_in": [1, 2]}), Predicate::NotIn(vec![json!(1), json!(2)])),
        ];
        for (operand, expected) in cases {
            let f = t(json!({ "f": operand }));
            assert_eq!(f, FilterExpr::And(vec![("f".into(), expected)]), "operand {operand}");
        }
    }

    #[test]
    fn unknown_operator_and_multi_key_objects_are_ignored() {
        assert_eq!(t(json!({"a": {"$regex": "x"}})), FilterExpr::match_all());
        assert_eq!(t(json!({"a": {"$gt": 1, "$lt": 5}})), FilterExpr::match_all());
        assert_eq!(t(json!({"a": {}})), FilterExpr::match_all());
    }

    #[test]
    fn malformed_between_is_dropped_when_lenient() {
        let f = t(json!({"a": {"$between": [1]}, "b": 2}));
        assert_eq!(f, FilterExpr::And(vec![("b".into(), Predicate::Equals(json!(2)))]));
        let f = t(json!({"a": {"$not_between": 3}}));
        assert_eq!(f, FilterExpr::match_all());
    }

    #[test]
    fn malformed_between_is_rejected_when_strict() {
        let map = json!({"a": {"$between": [1, 2, 3]}});
        let err = translate(map.as_object().unwrap(), FilterMode::Strict).unwrap_err();
        assert!(matches!(err, FilterError::MalformedRange { ref field, operator: "$between" } if field == "a"));
    }

    #[test]
    fn or_supersedes_siblings_and_nests() {
        let f = t(json!({
            "ignored": 1,
            "$or": [
                {"color": "red"},
                {"$or": [{"qty": {"$lt": 3}}, {"qty": {"$gt": 100}}]}
            ]
        }));
        assert_eq!(
            f,
            FilterExpr::Or(vec![
                FilterExpr::And(vec![("color".into(), Predicate::Equals(json!("red")))]),
                FilterExpr::Or(vec![
                    FilterExpr::And(vec![("qty".into(), Predicate::LessThan(json!(3)))]),
                    FilterExpr::And(vec![("qty".into(), Predicate::GreaterThan(json!(100)))]),
                ]),
            ])
        );
    }

    #[test]
    fn non_array_or_is_skipped() {
        assert_eq!(
            t(json!({"$or": {"a": 1}, "b": 1})),
            FilterExpr::And(vec![("b".into(), Predicate::Equals(json!(1)))])
        );
    }

    #[test]
    fn in_with_scalar_operand_is_single_element_set() {
        assert_eq!(
            t(json!({"a": {"$not_in": "x"}})),
            FilterExpr::And(vec![("a".into(), Predicate::NotIn(vec![json!("x")]))])
        );
    }

    #[test]
    fn parse_where_rejects_bad_json_and_non_objects() {
        assert!(matches!(parse_where("{nope", FilterMode::Lenient), Err(FilterError::Json(_))));
        assert!(matches!(parse_where("[1]", FilterMode::Lenient), Err(FilterError::NotAnObject)));
        assert_eq!(parse_where("{}", FilterMode::Lenient).unwrap(), FilterExpr::match_all());
    }
}
