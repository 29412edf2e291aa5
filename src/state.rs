//! Shared application state for all table routes.

use crate::schema::SchemaCache;
use crate::service::QueryExecutor;
use crate::sql::Quoting;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Tables that get routes, fixed from the schema snapshot taken at startup.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    tables: Vec<String>,
    lookup: HashSet<String>,
}

impl RouteTable {
    pub fn new(tables: Vec<String>) -> Self {
        let lookup = tables.iter().cloned().collect();
        RouteTable { tables, lookup }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.lookup.contains(table)
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

#[derive(Clone)]
pub struct AppState {
    pub schema: Arc<SchemaCache>,
    pub executor: QueryExecutor,
    pub routes: Arc<RouteTable>,
    pub quoting: Quoting,
    pub schema_wait_timeout: Option<Duration>,
}
