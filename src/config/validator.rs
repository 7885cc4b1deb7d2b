//! Config validation: entity names and table mapping.

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

/// Paths served by the common routes; an entity with one of these names would be unreachable.
const RESERVED: [&str; 3] = ["health", "ready", "version"];

fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty() && !s.contains('\0')
}

pub fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for e in &config.entities {
        if e.name.is_empty() || e.name.contains('/') {
            return Err(ConfigError::InvalidEntity {
                entity: e.name.clone(),
                reason: "name must be a non-empty path segment".into(),
            });
        }
        if RESERVED.contains(&e.name.as_str()) {
            return Err(ConfigError::InvalidEntity {
                entity: e.name.clone(),
                reason: "name collides with a built-in route".into(),
            });
        }
        for (what, value) in [("table", e.table_name()), ("schema", e.schema.as_str()), ("id_column", e.id_column.as_str())] {
            if !is_valid_identifier(value) {
                return Err(ConfigError::InvalidEntity {
                    entity: e.name.clone(),
                    reason: format!("invalid {}", what),
                });
            }
        }
        if !names.insert(e.name.as_str()) {
            return Err(ConfigError::DuplicateEntity(e.name.clone()));
        }
    }
    if config.max_body_bytes == 0 {
        return Err(ConfigError::Validation("max_body_bytes must be positive".into()));
    }
    Ok(())
}
