//! Endpoint generator: owns the schema cache, the executor, and the event bus, and builds
//! the router once the table list is known.

use crate::config::BackendConfig;
use crate::error::AppError;
use crate::routes::{common_routes, table_routes};
use crate::schema::{spawn_discovery, SchemaCache};
use crate::service::{EventBus, QueryExecutor};
use crate::sql::Quoting;
use crate::state::{AppState, RouteTable};
use crate::store::{ConnectionPool, MySqlStore};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;

pub struct Backend {
    config: BackendConfig,
    schema: Arc<SchemaCache>,
    executor: QueryExecutor,
    discovery: Option<JoinHandle<()>>,
}

impl Backend {
    /// Start schema discovery in the background and return immediately.
    /// Must be called inside a Tokio runtime.
    pub fn new(config: BackendConfig, pool: Arc<dyn ConnectionPool>) -> Self {
        let schema = Arc::new(SchemaCache::new());
        let discovery = spawn_discovery(schema.clone(), pool.clone());
        let mut backend = Self::with_schema(config, pool, schema);
        backend.discovery = Some(discovery);
        backend
    }

    /// Use a cache filled by the caller instead of running discovery.
    pub fn with_schema(config: BackendConfig, pool: Arc<dyn ConnectionPool>, schema: Arc<SchemaCache>) -> Self {
        Backend {
            config,
            schema,
            executor: QueryExecutor::new(pool, EventBus::new()),
            discovery: None,
        }
    }

    /// MySQL pool built from config (connections open lazily), then [`Backend::new`].
    pub fn connect(config: BackendConfig) -> Self {
        let store = MySqlStore::connect_lazy(&config);
        Self::new(config, Arc::new(store))
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn schema(&self) -> &Arc<SchemaCache> {
        &self.schema
    }

    pub fn events(&self) -> &EventBus {
        self.executor.events()
    }

    /// Subscribe to `"{get|post|put}-{table}"`.
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.events().on(event, handler);
    }

    pub fn trigger(&self, event: &str, payload: &Value) -> usize {
        self.events().trigger(event, payload)
    }

    /// Wait for the table list, then build the router with one route set per listed table.
    /// Tables whose columns are still pending are routed; their requests wait.
    pub async fn start(&self) -> Result<Router, AppError> {
        tracing::info!("starting");
        let tables = self.schema.wait_for_listing().await?;
        let router = self.router(tables);
        tracing::info!(base_path = %self.config.base_path, "started");
        Ok(router)
    }

    /// Router for a fixed table set: table routes under the base path, common routes at the root.
    pub fn router(&self, tables: Vec<String>) -> Router {
        for table in &tables {
            tracing::debug!(table = %table, "routes registered");
        }
        let state = AppState {
            schema: self.schema.clone(),
            executor: self.executor.clone(),
            routes: Arc::new(RouteTable::new(tables)),
            quoting: Quoting::from_ansi(self.config.ansi_quotes),
            schema_wait_timeout: self.config.schema_wait_timeout,
        };
        let api = table_routes(state).layer(RequestBodyLimitLayer::new(self.config.body_limit));
        let api = if self.config.base_path.is_empty() {
            api
        } else {
            Router::new().nest(&self.config.base_path, api)
        };
        Router::new().merge(common_routes(self.schema.clone())).merge(api)
    }

    /// Resolves when the background discovery pass has finished.
    pub async fn discovery_finished(&mut self) {
        if let Some(handle) = self.discovery.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "schema discovery task failed");
            }
        }
    }
}
