//! Shared application state for all routes. The registry is built once before serving and never mutated.

use crate::config::GatewayConfig;
use crate::filter::FilterMode;
use crate::registry::{Registry, Store};
use std::sync::Arc;

pub struct AppState<S: Store> {
    pub store: Arc<S>,
    pub registry: Arc<Registry<S::Model>>,
    pub filter_mode: FilterMode,
    pub max_body_bytes: usize,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, registry: Registry<S::Model>, config: &GatewayConfig) -> Self {
        AppState {
            store: Arc::new(store),
            registry: Arc::new(registry),
            filter_mode: config.filter_mode(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            filter_mode: self.filter_mode,
            max_body_bytes: self.max_body_bytes,
        }
    }
}
