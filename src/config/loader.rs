//! Load gateway config from a JSON file and process settings from the environment.

use crate::config::{validate, Backend, GatewayConfig, ServerSettings};
use crate::error::ConfigError;
use std::path::Path;

/// Parse and validate a config document.
pub fn parse_config(json: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

pub async fn load_from_path(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let config = parse_config(&text)?;
    tracing::info!(path = %path.display(), entities = config.entities.len(), "loaded gateway config");
    Ok(config)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Read settings from the environment (after loading `.env` if present).
pub fn settings_from_env() -> Result<ServerSettings, ConfigError> {
    dotenvy::dotenv().ok();
    let pool_size = env_or("GATEWAY_POOL_SIZE", "5")
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::Load("GATEWAY_POOL_SIZE must be a positive integer".into()))?;
    Ok(ServerSettings {
        database_url: env_or("DATABASE_URL", "postgres://localhost/gateway"),
        config_path: env_or("GATEWAY_CONFIG", "gateway.json"),
        bind: env_or("GATEWAY_BIND", "0.0.0.0:3000"),
        pool_size,
        backend: env_or("GATEWAY_BACKEND", "postgres").parse::<Backend>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let c = parse_config(r#"{"entities":[{"name":"widgets"}]}"#).unwrap();
        let e = &c.entities[0];
        assert_eq!(e.table_name(), "widgets");
        assert_eq!(e.schema, "public");
        assert_eq!(e.id_column, "id");
        assert!(!c.strict_filters);
        assert_eq!(c.max_body_bytes, crate::config::DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn table_override_and_strict_mode() {
        let c = parse_config(
            r#"{"strict_filters":true,"entities":[{"name":"w","table":"widget_rows","schema":"inv","id_column":"widget_id"}]}"#,
        )
        .unwrap();
        assert_eq!(c.entities[0].table_name(), "widget_rows");
        assert_eq!(c.filter_mode(), crate::filter::FilterMode::Strict);
    }

    #[test]
    fn malformed_config_is_a_load_error() {
        assert!(matches!(parse_config("{"), Err(ConfigError::Load(_))));
        assert!(matches!(
            parse_config(r#"{"entities":[{"name":"a"},{"name":"a"}]}"#),
            Err(ConfigError::DuplicateEntity(_))
        ));
    }

    #[test]
    fn backend_names() {
        assert_eq!("memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!("Postgres".parse::<Backend>().unwrap(), Backend::Postgres);
        assert!("mongo".parse::<Backend>().is_err());
    }
}
