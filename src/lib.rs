//! CRUD gateway: create/read/update/delete/list over named entities resolved at request time,
//! with a JSON filter language translated into store-native predicates.

pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod query;
pub mod registry;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use config::{load_from_path, parse_config, settings_from_env, Backend, EntityConfig, GatewayConfig, ServerSettings};
pub use error::{ApiError, ConfigError, StoreError};
pub use filter::{parse_where, translate, FilterExpr, FilterMode, Predicate};
pub use query::{Query, Record};
pub use registry::{Model, Registry, Store};
pub use routes::{common_routes, common_routes_with_ready, entity_routes};
pub use service::{CrudService, ListParams};
pub use state::AppState;
pub use store::{MemoryModel, MemoryStore, PgModel, PgStore};
