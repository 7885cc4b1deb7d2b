#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use crud_gateway::{
    common_routes_with_ready, entity_routes, AppState, GatewayConfig, MemoryModel, MemoryStore, Registry,
};
use serde_json::Value;
use tower::ServiceExt;

pub fn setup_app_with(config: GatewayConfig) -> Router {
    setup_app_with_pool(config, 4)
}

pub fn setup_app_with_pool(config: GatewayConfig, pool_size: usize) -> Router {
    let registry = Registry::from_models([
        MemoryModel::new("widgets"),
        MemoryModel::new("gadgets").require(["name"]),
    ])
    .expect("registry");
    let state = AppState::new(MemoryStore::new(pool_size), registry, &config);
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .merge(entity_routes(state))
}

pub fn setup_app() -> Router {
    setup_app_with(GatewayConfig::default())
}

pub fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn seed_widgets(app: &Router) {
    let (status, _) = send(
        app,
        "POST",
        "/widgets",
        Some(r#"[{"color":"red","qty":5},{"color":"blue","qty":10}]"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

pub async fn list(app: &Router, query: &str) -> (StatusCode, Value) {
    send(app, "GET", &format!("/widgets{}", query), None).await
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
