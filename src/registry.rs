//! Model registry: entity name to capability set, built once at startup.

use crate::error::{ConfigError, StoreError};
use crate::filter::FilterExpr;
use crate::query::{Query, Record};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A store backend: owns the session pool.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Checked-out session; returned to the pool when dropped.
    type Session: Send;
    type Model: Model<Session = Self::Session>;

    /// Blocks while the pool is exhausted.
    async fn acquire(&self) -> Result<Self::Session, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Per-entity capability set.
#[async_trait]
pub trait Model: Send + Sync + 'static {
    type Session: Send;

    fn name(&self) -> &str;

    fn id_field(&self) -> &str {
        "id"
    }

    fn id_of(&self, record: &Record) -> Value {
        record.get(self.id_field()).cloned().unwrap_or(Value::Null)
    }

    /// Start a query over this entity.
    fn find(&self, filter: FilterExpr) -> Query {
        Query::new(filter)
    }

    async fn all(&self, session: &mut Self::Session, query: &Query) -> Result<Vec<Record>, StoreError>;

    async fn first(&self, session: &mut Self::Session, query: &Query) -> Result<Option<Record>, StoreError> {
        let query = query.clone().limit(1);
        Ok(self.all(session, &query).await?.into_iter().next())
    }

    /// Number of records matching the filter; ordering, paging and projection are ignored.
    async fn count(&self, session: &mut Self::Session, query: &Query) -> Result<u64, StoreError>;

    async fn get(&self, session: &mut Self::Session, id: &str) -> Result<Option<Record>, StoreError>;

    /// Insert records; the store assigns ids. Returns the stored records in input order.
    async fn create(&self, session: &mut Self::Session, records: Vec<Record>) -> Result<Vec<Record>, StoreError>;

    /// Persist a previously fetched record after `changed` fields were merged into it.
    /// Stores may write only the changed fields; the rest must be left as stored.
    async fn save(&self, session: &mut Self::Session, record: &Record, changed: &[String]) -> Result<(), StoreError>;

    async fn remove(&self, session: &mut Self::Session, record: &Record) -> Result<(), StoreError>;
}

/// Read-only after construction; shared through `Arc` without locking.
pub struct Registry<M> {
    models: HashMap<String, Arc<M>>,
}

impl<M: Model> Registry<M> {
    pub fn new() -> Self {
        Registry { models: HashMap::new() }
    }

    pub fn from_models<I: IntoIterator<Item = M>>(models: I) -> Result<Self, ConfigError> {
        let mut registry = Registry::new();
        for model in models {
            registry.register(model)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, model: M) -> Result<(), ConfigError> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(ConfigError::DuplicateEntity(name));
        }
        self.models.insert(name, Arc::new(model));
        Ok(())
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, name: &str) -> Option<Arc<M>> {
        self.models.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl<M: Model> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}
