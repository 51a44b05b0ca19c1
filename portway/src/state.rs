//! Shared application state handed to every handler: one value built once
//! at startup and cloned (cheaply, behind `Arc`s) into each worker.

use std::collections::HashMap;
use std::sync::Arc;

use portway_auth::TokenStore;
use portway_registry::EndpointRegistry;
use portway_settings::{EnvironmentRegistry, Settings};
use portway_sql::SqlPool;

pub struct AppState {
    pub settings: Settings,
    pub environments: EnvironmentRegistry,
    pub registry: Arc<EndpointRegistry>,
    pub token_store: Arc<TokenStore>,
    pub sql_pools: HashMap<String, SqlPool>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn sql_pool(&self, env: &str) -> Option<&SqlPool> {
        self.sql_pools.get(env)
    }
}
