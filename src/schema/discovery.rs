//! One discovery pass: list tables, then describe each table on the same connection.

use crate::schema::SchemaCache;
use crate::sql::Quoting;
use crate::store::{first_column_text, ConnectionPool};
use std::sync::Arc;
use tokio::task::JoinHandle;

impl SchemaCache {
    /// Fill the cache. Each table's columns are stored as soon as its DESCRIBE returns.
    /// A listing failure stops the pass; a DESCRIBE failure only drops that table.
    /// Nothing is retried.
    pub async fn discover(&self, pool: &dyn ConnectionPool) {
        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "error connecting for schema discovery");
                self.record_listing_failure(e.to_string());
                return;
            }
        };

        let tables: Vec<String> = match conn.fetch_all("SHOW TABLES", &[]).await {
            Ok(rows) => rows.iter().filter_map(first_column_text).collect(),
            Err(e) => {
                tracing::error!(error = %e, "listing tables failed");
                self.record_listing_failure(e.to_string());
                return;
            }
        };
        tracing::info!(count = tables.len(), "tables listed");
        self.record_tables(tables.clone());

        for table in &tables {
            let sql = format!("DESCRIBE {}", Quoting::Backtick.quote(table));
            match conn.fetch_all(&sql, &[]).await {
                Ok(rows) => {
                    let columns: Vec<String> = rows.iter().filter_map(first_column_text).collect();
                    tracing::debug!(table = %table, columns = columns.len(), "table described");
                    self.record_columns(table, columns);
                }
                Err(e) => {
                    tracing::error!(table = %table, error = %e, "describe failed");
                    self.record_table_failure(table, e.to_string());
                }
            }
        }
        tracing::info!(described = self.status().described, "schema discovery finished");
    }
}

/// Run [`SchemaCache::discover`] in the background so startup is not blocked on it.
pub fn spawn_discovery(cache: Arc<SchemaCache>, pool: Arc<dyn ConnectionPool>) -> JoinHandle<()> {
    tokio::spawn(async move { cache.discover(pool.as_ref()).await })
}
