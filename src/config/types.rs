//! Gateway configuration as read from the JSON config file.

use crate::filter::FilterMode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

fn default_schema() -> String {
    "public".into()
}

fn default_id_column() -> String {
    "id".into()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// One exposed entity and the table backing it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Path segment clients use, matched verbatim.
    pub name: String,
    /// Backing table; defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        EntityConfig {
            name: name.into(),
            table: None,
            schema: default_schema(),
            id_column: default_id_column(),
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub entities: Vec<EntityConfig>,
    /// Reject malformed `$between`/`$not_between` operands instead of dropping them.
    #[serde(default)]
    pub strict_filters: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            entities: Vec::new(),
            strict_filters: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl GatewayConfig {
    pub fn filter_mode(&self) -> FilterMode {
        if self.strict_filters {
            FilterMode::Strict
        } else {
            FilterMode::Lenient
        }
    }
}

/// Which store backend the server runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "memory" => Ok(Backend::Memory),
            _ => Err(crate::error::ConfigError::Load(format!(
                "invalid backend: {} (expected postgres or memory)",
                s
            ))),
        }
    }
}

/// Process settings taken from the environment.
#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub database_url: String,
    pub config_path: String,
    pub bind: String,
    pub pool_size: u32,
    pub backend: Backend,
}
