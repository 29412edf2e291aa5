//! Table and column cache filled once by discovery. Changes are published on a watch
//! channel so readers can wait for a table instead of polling.

use crate::error::AppError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Ordered column names of one table.
pub type ColumnList = Arc<Vec<String>>;

#[derive(Clone, Debug, Default)]
struct SchemaState {
    table_names: Vec<String>,
    tables: HashMap<String, ColumnList>,
    /// Tables whose DESCRIBE failed, with the reason. Never retried.
    failed: HashMap<String, String>,
    connection_error: Option<String>,
    /// Listing tables failed; no column list will ever arrive.
    listing_failed: bool,
    /// Listing returned (possibly zero tables).
    listing_done: bool,
}

impl SchemaState {
    fn table_settled(&self, table: &str) -> bool {
        self.tables.contains_key(table) || self.failed.contains_key(table) || self.listing_failed
    }

    fn listing_settled(&self) -> bool {
        !self.table_names.is_empty() || self.listing_failed || self.listing_done
    }
}

/// Snapshot for the readiness route.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SchemaStatus {
    pub ready: bool,
    pub tables: Vec<String>,
    pub described: usize,
    pub pending: Vec<String>,
    pub failed: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_error: Option<String>,
}

pub struct SchemaCache {
    state: watch::Sender<SchemaState>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCache {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SchemaState::default());
        SchemaCache { state }
    }

    /// True once this table has a non-empty column list.
    pub fn is_table_known(&self, table: &str) -> bool {
        self.state.borrow().tables.contains_key(table)
    }

    /// True once the table-name list is non-empty.
    pub fn all_tables_listed(&self) -> bool {
        !self.state.borrow().table_names.is_empty()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.borrow().table_names.clone()
    }

    pub fn columns(&self, table: &str) -> Option<ColumnList> {
        self.state.borrow().tables.get(table).cloned()
    }

    pub fn connection_error(&self) -> Option<String> {
        self.state.borrow().connection_error.clone()
    }

    pub fn record_tables(&self, names: Vec<String>) {
        self.state.send_modify(|s| {
            s.table_names = names;
            s.listing_done = true;
        });
    }

    /// Store a table's columns. An empty list is recorded as a failure.
    pub fn record_columns(&self, table: &str, columns: Vec<String>) {
        if columns.is_empty() {
            self.record_table_failure(table, "table has no columns".into());
            return;
        }
        self.state.send_modify(|s| {
            s.tables.insert(table.to_string(), Arc::new(columns));
        });
    }

    pub fn record_table_failure(&self, table: &str, reason: String) {
        self.state.send_modify(|s| {
            s.connection_error = Some(reason.clone());
            s.failed.insert(table.to_string(), reason);
        });
    }

    /// Listing failed: records the connection error and releases every waiter.
    pub fn record_listing_failure(&self, reason: String) {
        self.state.send_modify(|s| {
            s.connection_error = Some(reason);
            s.listing_failed = true;
        });
    }

    /// Wait until the table list is known. Fails if listing failed or found no tables.
    pub async fn wait_for_listing(&self) -> Result<Vec<String>, AppError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(SchemaState::listing_settled)
            .await
            .map_err(|_| AppError::Discovery("schema cache dropped".into()))?;
        if !state.table_names.is_empty() {
            return Ok(state.table_names.clone());
        }
        if state.listing_failed {
            return Err(AppError::Connection(
                state.connection_error.clone().unwrap_or_else(|| "table listing failed".into()),
            ));
        }
        Err(AppError::Discovery("database has no tables".into()))
    }

    /// Wait until the table's columns are known. Tables described later still resolve;
    /// a failed DESCRIBE or listing resolves to an error. `timeout` bounds the wait.
    pub async fn wait_for_table(&self, table: &str, timeout: Option<Duration>) -> Result<ColumnList, AppError> {
        if let Some(cols) = self.columns(table) {
            return Ok(cols);
        }
        tracing::debug!(table = %table, "table schema not ready, waiting");
        let wait = self.settle(table);
        match timeout {
            Some(d) => tokio::time::timeout(d, wait).await.map_err(|_| AppError::SchemaUnavailable {
                table: table.to_string(),
                reason: format!("not described within {} ms", d.as_millis()),
            })?,
            None => wait.await,
        }
    }

    async fn settle(&self, table: &str) -> Result<ColumnList, AppError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| s.table_settled(table))
            .await
            .map_err(|_| AppError::Discovery("schema cache dropped".into()))?;
        if let Some(cols) = state.tables.get(table) {
            return Ok(cols.clone());
        }
        let reason = state
            .failed
            .get(table)
            .cloned()
            .or_else(|| state.connection_error.clone())
            .unwrap_or_else(|| "discovery failed".into());
        Err(AppError::SchemaUnavailable {
            table: table.to_string(),
            reason,
        })
    }

    pub fn status(&self) -> SchemaStatus {
        let s = self.state.borrow();
        let pending: Vec<String> = s
            .table_names
            .iter()
            .filter(|t| !s.tables.contains_key(*t) && !s.failed.contains_key(*t))
            .cloned()
            .collect();
        SchemaStatus {
            ready: !s.table_names.is_empty() && s.tables.len() == s.table_names.len(),
            tables: s.table_names.clone(),
            described: s.tables.len(),
            pending,
            failed: s.failed.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            connection_error: s.connection_error.clone(),
        }
    }
}
