//! Entity-agnostic CRUD dispatch: resolve, validate, run against the store, shape the result.
//!
//! Every operation checks out one store session after the entity resolves and
//! holds it until the operation returns; dropping it releases the session on
//! success and on every error path alike.

use crate::error::{ApiError, StoreError};
use crate::filter::{parse_where, FilterError, FilterExpr};
use crate::query::{parse_keys, parse_skip, project, resolve_limit, Record};
use crate::registry::{Model, Store};
use crate::response::{id_body, ListBody};
use crate::state::AppState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Query-string parameters of a list request.
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    pub filter: Option<String>,
    pub order: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
    pub keys: Option<String>,
    pub count: bool,
}

impl ListParams {
    pub fn from_query(mut params: HashMap<String, String>) -> Self {
        ListParams {
            filter: params.remove("where"),
            order: params.remove("order"),
            skip: params.remove("skip"),
            limit: params.remove("limit"),
            keys: params.remove("keys"),
            count: params.get("count").map(String::as_str) == Some("1"),
        }
    }
}

pub struct CrudService;

fn resolve<S: Store>(state: &AppState<S>, entity: &str) -> Result<Arc<S::Model>, ApiError> {
    state
        .registry
        .resolve(entity)
        .ok_or_else(|| ApiError::UnknownEntity(entity.to_string()))
}

async fn checkout<S: Store>(state: &AppState<S>) -> Result<S::Session, ApiError> {
    state
        .store
        .acquire()
        .await
        .map_err(|e| ApiError::ExecutionFailure(e.to_string()))
}

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

fn into_record(value: Value) -> Result<Record, ApiError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::MalformedBody("expected a JSON object".into())),
    }
}

fn validation(e: StoreError) -> ApiError {
    ApiError::ValidationFailure(e.to_string())
}

fn execution(e: StoreError) -> ApiError {
    ApiError::ExecutionFailure(e.to_string())
}

/// Fetch by id; a store error on lookup counts as not found.
async fn fetch<M: Model>(model: &M, session: &mut M::Session, entity: &str, id: &str) -> Result<Record, ApiError> {
    match model.get(session, id).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(ApiError::NotFound(format!("{}/{}", entity, id))),
        Err(e) => Err(ApiError::NotFound(format!("{}/{}: {}", entity, id, e))),
    }
}

impl CrudService {
    /// Create one record (object body) or a batch (array body). Returns `{id}` or `[{id}]`.
    pub async fn create<S: Store>(state: &AppState<S>, entity: &str, body: &[u8]) -> Result<Value, ApiError> {
        let model = resolve(state, entity)?;
        let (records, batch) = match parse_body(body)? {
            Value::Array(items) => (items.into_iter().map(into_record).collect::<Result<Vec<_>, _>>()?, true),
            other => (vec![into_record(other)?], false),
        };
        let records: Vec<Record> = records
            .into_iter()
            .map(|mut r| {
                r.remove(model.id_field());
                r
            })
            .collect();

        let mut session = checkout(state).await?;
        let stored = model.create(&mut session, records).await.map_err(validation)?;
        tracing::info!(entity, count = stored.len(), "created");

        let mut ids = stored.iter().map(|r| id_body(model.id_of(r)));
        if batch {
            Ok(Value::Array(ids.collect()))
        } else {
            ids.next()
                .ok_or_else(|| ApiError::ValidationFailure("store returned no record".into()))
        }
    }

    /// Read one record, optionally narrowed to `keys` after the full fetch.
    pub async fn read<S: Store>(state: &AppState<S>, entity: &str, id: &str, keys: Option<&str>) -> Result<Record, ApiError> {
        let model = resolve(state, entity)?;
        let mut session = checkout(state).await?;
        let record = fetch(model.as_ref(), &mut session, entity, id).await?;
        tracing::debug!(entity, id, "read");
        Ok(match keys {
            Some(keys) => project(&record, &parse_keys(keys)),
            None => record,
        })
    }

    /// Shallow-merge the body into the stored record and save it. The id field is never overwritten.
    pub async fn update<S: Store>(state: &AppState<S>, entity: &str, id: &str, body: &[u8]) -> Result<Value, ApiError> {
        let model = resolve(state, entity)?;
        let mut session = checkout(state).await?;
        let mut record = fetch(model.as_ref(), &mut session, entity, id).await?;
        let changes = into_record(parse_body(body)?)?;
        let mut changed = Vec::with_capacity(changes.len());
        for (k, v) in changes {
            if k != model.id_field() {
                record.insert(k.clone(), v);
                changed.push(k);
            }
        }
        model.save(&mut session, &record, &changed).await.map_err(validation)?;
        tracing::info!(entity, id, "updated");
        Ok(id_body(model.id_of(&record)))
    }

    pub async fn delete<S: Store>(state: &AppState<S>, entity: &str, id: &str) -> Result<Value, ApiError> {
        let model = resolve(state, entity)?;
        let mut session = checkout(state).await?;
        let record = fetch(model.as_ref(), &mut session, entity, id).await?;
        model.remove(&mut session, &record).await.map_err(execution)?;
        tracing::info!(entity, id, "deleted");
        Ok(id_body(model.id_of(&record)))
    }

    /// Filtered, ordered, paginated and projected listing, with an optional total count.
    pub async fn list<S: Store>(state: &AppState<S>, entity: &str, params: &ListParams) -> Result<ListBody, ApiError> {
        let model = resolve(state, entity)?;
        let filter = match &params.filter {
            Some(raw) => parse_where(raw, state.filter_mode).map_err(|e| match e {
                FilterError::MalformedRange { .. } => ApiError::ValidationFailure(e.to_string()),
                FilterError::Json(_) | FilterError::NotAnObject => ApiError::MalformedBody(e.to_string()),
            })?,
            None => FilterExpr::match_all(),
        };

        let mut query = model.find(filter);
        if let Some(order) = &params.order {
            query = query.order(order);
        }
        if let Some(raw) = &params.skip {
            let skip = parse_skip(raw).ok_or_else(|| ApiError::InvalidPaginationParameter(format!("skip={}", raw)))?;
            query = query.offset(skip);
        }
        let keys = params.keys.as_deref().map(parse_keys);
        if let Some(keys) = &keys {
            query = query.only(keys.clone());
        }
        query = query.limit(resolve_limit(params.limit.as_deref()));

        let mut session = checkout(state).await?;
        let mut results = model.all(&mut session, &query).await.map_err(execution)?;
        if let Some(keys) = &keys {
            results = results.iter().map(|r| project(r, keys)).collect();
        }
        tracing::debug!(entity, returned = results.len(), "listed");

        if !params.count {
            return Ok(ListBody::Plain(results));
        }
        let count = model.count(&mut session, &query.unpaged()).await.map_err(execution)?;
        Ok(ListBody::Counted { results, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn list_params_from_query() {
        let p = ListParams::from_query(params(&[("where", "{}"), ("skip", "2"), ("count", "1"), ("other", "x")]));
        assert_eq!(p.filter.as_deref(), Some("{}"));
        assert_eq!(p.skip.as_deref(), Some("2"));
        assert!(p.count);
        assert!(p.order.is_none());
    }

    #[test]
    fn count_requires_literal_one() {
        assert!(!ListParams::from_query(params(&[("count", "true")])).count);
        assert!(!ListParams::from_query(params(&[])).count);
    }
}
