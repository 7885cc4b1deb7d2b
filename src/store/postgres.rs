//! PostgreSQL backend: one `PgModel` per configured entity, sessions from a sqlx pool.

use crate::config::{EntityConfig, GatewayConfig};
use crate::error::{ConfigError, StoreError};
use crate::query::{Query, Record};
use crate::registry::{Model, Registry, Store};
use crate::store::sql::{self, ColumnInfo, QueryBuf, TableInfo};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{Connection, PgPool, Postgres};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await?;
        Ok(PgStore { pool })
    }

    /// Resolve every configured entity against the catalog and build the registry.
    pub async fn registry(&self, config: &GatewayConfig) -> Result<Registry<PgModel>, ConfigError> {
        let mut registry = Registry::new();
        for entity in &config.entities {
            let model = PgModel::resolve(&self.pool, entity).await?;
            tracing::info!(
                entity = %entity.name,
                table = %model.table.name,
                columns = model.table.columns.len(),
                "registered entity"
            );
            registry.register(model)?;
        }
        Ok(registry)
    }
}

#[async_trait]
impl Store for PgStore {
    type Session = PoolConnection<Postgres>;
    type Model = PgModel;

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        Ok(self.pool.acquire().await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgModel {
    name: String,
    table: TableInfo,
}

impl PgModel {
    pub fn new(name: impl Into<String>, table: TableInfo) -> Self {
        PgModel { name: name.into(), table }
    }

    /// Introspect column names and types for the entity's table.
    pub async fn resolve(pool: &PgPool, entity: &EntityConfig) -> Result<Self, ConfigError> {
        let qualified = format!("{}.{}", sql::quoted(&entity.schema), sql::quoted(entity.table_name()));
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT a.attname::text, format_type(a.atttypid, NULL) \
             FROM pg_attribute a \
             WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
        )
        .bind(&qualified)
        .fetch_all(pool)
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?;

        if rows.is_empty() {
            return Err(ConfigError::MissingTable(entity.name.clone()));
        }
        let columns: Vec<ColumnInfo> = rows
            .into_iter()
            .map(|(name, pg_type)| ColumnInfo { name, pg_type })
            .collect();
        if !columns.iter().any(|c| c.name == entity.id_column) {
            return Err(ConfigError::InvalidEntity {
                entity: entity.name.clone(),
                reason: format!("id column '{}' not found on {}", entity.id_column, qualified),
            });
        }
        Ok(PgModel::new(
            entity.name.clone(),
            TableInfo {
                schema: entity.schema.clone(),
                name: entity.table_name().to_string(),
                id_column: entity.id_column.clone(),
                columns,
            },
        ))
    }
}

async fn fetch_records(conn: &mut PgConnection, q: &QueryBuf) -> Result<Vec<Record>, StoreError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    let rows = query.fetch_all(conn).await?;
    Ok(rows.into_iter().filter_map(into_record).collect())
}

async fn fetch_record(conn: &mut PgConnection, q: &QueryBuf) -> Result<Option<Record>, StoreError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    let row = query.fetch_optional(conn).await?;
    Ok(row.and_then(into_record))
}

async fn execute(conn: &mut PgConnection, q: &QueryBuf) -> Result<u64, StoreError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    Ok(query.execute(conn).await?.rows_affected())
}

fn into_record(v: Value) -> Option<Record> {
    match v {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[async_trait]
impl Model for PgModel {
    type Session = PoolConnection<Postgres>;

    fn name(&self) -> &str {
        &self.name
    }

    fn id_field(&self) -> &str {
        &self.table.id_column
    }

    async fn all(&self, session: &mut PoolConnection<Postgres>, query: &Query) -> Result<Vec<Record>, StoreError> {
        let q = sql::select(&self.table, query)?;
        fetch_records(session, &q).await
    }

    async fn count(&self, session: &mut PoolConnection<Postgres>, query: &Query) -> Result<u64, StoreError> {
        let q = sql::count(&self.table, query)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut scalar = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            scalar = scalar.bind(p.clone());
        }
        let n = scalar.fetch_one(&mut **session).await?;
        Ok(n.max(0) as u64)
    }

    async fn get(&self, session: &mut PoolConnection<Postgres>, id: &str) -> Result<Option<Record>, StoreError> {
        let q = sql::select_by_id(&self.table, id)?;
        fetch_record(session, &q).await
    }

    async fn create(&self, session: &mut PoolConnection<Postgres>, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let statements = records
            .iter()
            .map(|r| sql::insert(&self.table, r))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tx = session.begin().await?;
        let mut out = Vec::with_capacity(statements.len());
        for q in &statements {
            let row = fetch_record(&mut tx, q)
                .await?
                .ok_or_else(|| StoreError::Rejected("insert returned no row".into()))?;
            out.push(row);
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn save(
        &self,
        session: &mut PoolConnection<Postgres>,
        record: &Record,
        changed: &[String],
    ) -> Result<(), StoreError> {
        let Some(q) = sql::update(&self.table, record, changed)? else {
            return Ok(());
        };
        if execute(session, &q).await? == 0 {
            return Err(StoreError::Rejected(format!("{} record no longer exists", self.name)));
        }
        Ok(())
    }

    async fn remove(&self, session: &mut PoolConnection<Postgres>, record: &Record) -> Result<(), StoreError> {
        let q = sql::delete(&self.table, record)?;
        if execute(session, &q).await? == 0 {
            return Err(StoreError::Rejected(format!("{} record no longer exists", self.name)));
        }
        Ok(())
    }
}
