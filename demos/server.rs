//! Example server: reads settings from the environment, loads the entity config, builds the
//! registry once, and mounts common and entity routes.

use crud_gateway::{
    common_routes_with_ready, entity_routes, load_from_path, settings_from_env, AppState, Backend, MemoryModel,
    MemoryStore, PgStore, Registry, Store,
};
use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings_from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crud_gateway=info")),
        )
        .init();

    let config = load_from_path(&settings.config_path).await?;
    match settings.backend {
        Backend::Postgres => {
            let store = PgStore::connect(&settings.database_url, settings.pool_size).await?;
            let registry = store.registry(&config).await?;
            serve(AppState::new(store, registry, &config), &settings.bind).await
        }
        Backend::Memory => {
            let store = MemoryStore::new(settings.pool_size as usize);
            let registry = Registry::from_models(config.entities.iter().map(|e| MemoryModel::new(e.name.clone())))?;
            serve(AppState::new(store, registry, &config), &settings.bind).await
        }
    }
}

async fn serve<S: Store>(state: AppState<S>, bind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let entities: Vec<&str> = state.registry.names().collect();
    tracing::info!(?entities, "registry ready");

    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .merge(entity_routes(state));

    let listener = TcpListener::bind(bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
