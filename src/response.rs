//! Response shapes and status helpers.

use crate::query::Record;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

/// List result: a bare array, or `{results, count}` when a count was requested.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ListBody {
    Plain(Vec<Record>),
    Counted { results: Vec<Record>, count: u64 },
}

/// `{"id": ...}`
pub fn id_body(id: Value) -> Value {
    serde_json::json!({ "id": id })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(data))
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<T>) {
    (StatusCode::OK, Json(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_body_shapes() {
        let rec = json!({"a": 1}).as_object().unwrap().clone();
        let plain = serde_json::to_value(ListBody::Plain(vec![rec.clone()])).unwrap();
        assert_eq!(plain, json!([{"a": 1}]));
        let counted = serde_json::to_value(ListBody::Counted { results: vec![rec], count: 7 }).unwrap();
        assert_eq!(counted, json!({"results": [{"a": 1}], "count": 7}));
    }
}
