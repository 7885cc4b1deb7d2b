//! Entity CRUD routes. The entity name is the first path segment, resolved verbatim against the registry.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update};
use crate::registry::Store;
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

pub fn entity_routes<S: Store>(state: AppState<S>) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .route("/:entity", get(list::<S>).post(create::<S>))
        .route(
            "/:entity/:id",
            get(read::<S>).put(update::<S>).delete(delete_handler::<S>),
        )
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
