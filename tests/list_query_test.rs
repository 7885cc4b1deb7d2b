mod common;

use axum::http::StatusCode;
use common::{encode, error_code, list, seed_widgets, send, setup_app, setup_app_with};
use crud_gateway::GatewayConfig;
use serde_json::{json, Value};

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .expect("array body")
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn list_without_filter_returns_everything() {
    let app = setup_app();
    seed_widgets(&app).await;
    let (status, body) = list(&app, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"id": 1, "color": "red", "qty": 5}, {"id": 2, "color": "blue", "qty": 10}])
    );
}

#[tokio::test]
async fn gte_filter_example() {
    let app = setup_app();
    seed_widgets(&app).await;
    let (_, body) = list(&app, &format!("?where={}", encode(r#"{"qty":{"$gte":6}}"#))).await;
    assert_eq!(body, json!([{"id": 2, "color": "blue", "qty": 10}]));
}

#[tokio::test]
async fn or_filter_example() {
    let app = setup_app();
    seed_widgets(&app).await;
    let filter = r#"{"$or":[{"color":"red"},{"qty":{"$lt":3}}]}"#;
    let (_, body) = list(&app, &format!("?where={}", encode(filter))).await;
    assert_eq!(body, json!([{"id": 1, "color": "red", "qty": 5}]));
}

#[tokio::test]
async fn nested_or_is_or_of_or() {
    let app = setup_app();
    seed_widgets(&app).await;
    send(&app, "POST", "/widgets", Some(r#"{"color":"green","qty":1}"#)).await;
    let filter = r#"{"$or":[{"color":"red"},{"$or":[{"qty":{"$lt":3}},{"qty":{"$gt":100}}]}]}"#;
    let (_, body) = list(&app, &format!("?where={}", encode(filter))).await;
    assert_eq!(ids(&body), vec![1, 3]);
}

#[tokio::test]
async fn operator_truth_table_over_http() {
    let app = setup_app();
    seed_widgets(&app).await;
    let cases = [
        (r#"{"qty":{"$gt":5}}"#, vec![2]),
        (r#"{"qty":{"$gte":5}}"#, vec![1, 2]),
        (r#"{"qty":{"$lt":10}}"#, vec![1]),
        (r#"{"qty":{"$lte":5}}"#, vec![1]),
        (r#"{"color":{"$eq":"blue"}}"#, vec![2]),
        (r#"{"color":{"$ne":"blue"}}"#, vec![1]),
        (r#"{"qty":{"$between":[6,10]}}"#, vec![2]),
        (r#"{"qty":{"$not_between":[6,10]}}"#, vec![1]),
        (r#"{"color":{"$like":"bl%"}}"#, vec![2]),
        (r#"{"color":{"$not_like":"bl%"}}"#, vec![1]),
        (r#"{"color":{"$in":["red","green"]}}"#, vec![1]),
        (r#"{"color":{"$not_in":["red","green"]}}"#, vec![2]),
        (r#"{"color":["blue","green"]}"#, vec![2]),
        (r#"{"color":"red","qty":5}"#, vec![1]),
        (r#"{"color":"red","qty":10}"#, vec![]),
    ];
    for (filter, expected) in cases {
        let (status, body) = list(&app, &format!("?where={}", encode(filter))).await;
        assert_eq!(status, StatusCode::OK, "filter {filter}");
        assert_eq!(ids(&body), expected, "filter {filter}");
    }
}

#[tokio::test]
async fn unrecognized_operator_is_ignored() {
    let app = setup_app();
    seed_widgets(&app).await;
    let (status, body) = list(&app, &format!("?where={}", encode(r#"{"qty":{"$regex":"x"}}"#))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 2]);
}

#[tokio::test]
async fn malformed_between_is_dropped_by_default() {
    let app = setup_app();
    seed_widgets(&app).await;
    let (status, body) = list(&app, &format!("?where={}", encode(r#"{"qty":{"$between":[6]}}"#))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 2]);
}

#[tokio::test]
async fn malformed_between_is_rejected_in_strict_mode() {
    let app = setup_app_with(GatewayConfig {
        strict_filters: true,
        ..GatewayConfig::default()
    });
    seed_widgets(&app).await;
    let (status, body) = list(&app, &format!("?where={}", encode(r#"{"qty":{"$between":[6]}}"#))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "validation_failure");
}

#[tokio::test]
async fn malformed_where_is_malformed_body() {
    let app = setup_app();
    for raw in ["{nope", "[1,2]", "3"] {
        let (status, body) = list(&app, &format!("?where={}", encode(raw))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "where {raw}");
        assert_eq!(error_code(&body), "malformed_body");
    }
}

#[tokio::test]
async fn limit_resolution() {
    let app = setup_app();
    let batch: Vec<Value> = (0..120).map(|i| json!({ "n": i })).collect();
    let (status, _) = send(&app, "POST", "/widgets", Some(&Value::Array(batch).to_string())).await;
    assert_eq!(status, StatusCode::CREATED);

    for raw in ["0", "-5", "abc", "5000"] {
        let (status, body) = list(&app, &format!("?limit={}", raw)).await;
        assert_eq!(status, StatusCode::OK, "limit {raw}");
        assert_eq!(body.as_array().unwrap().len(), 100, "limit {raw}");
    }
    let (_, body) = list(&app, "?limit=50").await;
    assert_eq!(body.as_array().unwrap().len(), 50);
    let (_, body) = list(&app, "").await;
    assert_eq!(body.as_array().unwrap().len(), 100);
}

#[tokio::test]
async fn invalid_skip_is_rejected() {
    let app = setup_app();
    seed_widgets(&app).await;
    for raw in ["-1", "x"] {
        let (status, body) = list(&app, &format!("?skip={}", raw)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "skip {raw}");
        assert_eq!(error_code(&body), "invalid_pagination_parameter");
    }
}

#[tokio::test]
async fn skip_and_order() {
    let app = setup_app();
    seed_widgets(&app).await;
    send(&app, "POST", "/widgets", Some(r#"{"color":"green","qty":7}"#)).await;

    let (_, body) = list(&app, "?order=-qty").await;
    assert_eq!(ids(&body), vec![2, 3, 1]);
    let (_, body) = list(&app, "?order=color&skip=1").await;
    assert_eq!(ids(&body), vec![3, 1]);
    let (_, body) = list(&app, "?order=qty&skip=1&limit=1").await;
    assert_eq!(ids(&body), vec![3]);
}

#[tokio::test]
async fn list_projection_returns_exactly_requested_keys() {
    let app = setup_app();
    seed_widgets(&app).await;
    let (_, body) = list(&app, "?keys=color").await;
    assert_eq!(body, json!([{"color": "red"}, {"color": "blue"}]));
}

#[tokio::test]
async fn count_ignores_pagination_but_respects_filter() {
    let app = setup_app();
    let batch: Vec<Value> = (1..=30).map(|i| json!({ "n": i, "even": i % 2 == 0 })).collect();
    send(&app, "POST", "/widgets", Some(&Value::Array(batch).to_string())).await;

    let filter = encode(r#"{"even":true}"#);
    let (status, body) = list(&app, &format!("?where={}&skip=2&limit=5&count=1&keys=n", filter)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(15));
    assert_eq!(
        body["results"],
        json!([{"n": 6}, {"n": 8}, {"n": 10}, {"n": 12}, {"n": 14}])
    );
}

#[tokio::test]
async fn count_on_empty_result() {
    let app = setup_app();
    let (_, body) = list(&app, "?count=1").await;
    assert_eq!(body, json!({"results": [], "count": 0}));
}
