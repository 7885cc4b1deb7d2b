//! Entity CRUD handlers: create, read, update, delete, list.
//! Bodies arrive as raw bytes so JSON errors are reported at the point the dispatcher parses them.

use crate::error::ApiError;
use crate::registry::Store;
use crate::response::{created, ok};
use crate::service::{CrudService, ListParams};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
};
use std::collections::HashMap;

type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;

fn query_map(params: QueryParams) -> Result<HashMap<String, String>, ApiError> {
    params
        .map(|Query(m)| m)
        .map_err(|e| ApiError::MalformedBody(e.body_text()))
}

pub async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Path(entity): Path<String>,
    params: QueryParams,
) -> Result<impl IntoResponse, ApiError> {
    let params = ListParams::from_query(query_map(params)?);
    let body = CrudService::list(&state, &entity, &params).await?;
    Ok(ok(body))
}

pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let ids = CrudService::create(&state, &entity, &body).await?;
    Ok(created(ids))
}

pub async fn read<S: Store>(
    State(state): State<AppState<S>>,
    Path((entity, id)): Path<(String, String)>,
    params: QueryParams,
) -> Result<impl IntoResponse, ApiError> {
    let params = query_map(params)?;
    let record = CrudService::read(&state, &entity, &id, params.get("keys").map(String::as_str)).await?;
    Ok(ok(record))
}

pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    Path((entity, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let out = CrudService::update(&state, &entity, &id, &body).await?;
    Ok(ok(out))
}

pub async fn delete<S: Store>(
    State(state): State<AppState<S>>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let out = CrudService::delete(&state, &entity, &id).await?;
    Ok(ok(out))
}
