//! Connection-pool seam and its MySQL implementation over `sqlx::MySqlPool`.

use crate::config::{BackendConfig, POOL_SIZE};
use crate::error::AppError;
use crate::sql::SqlValue;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::Executor;

/// One result row, columns in select order.
pub type Row = Map<String, Value>;

/// Outcome of a write statement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

/// A pooled connection. Dropping it returns it to the pool.
#[async_trait]
pub trait Connection: Send {
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, AppError>;
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome, AppError>;
}

#[async_trait]
pub trait ConnectionPool: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn Connection>, AppError>;
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlStore { pool }
    }

    /// Pool of `POOL_SIZE` connections, opened on first use. With `ansi_quotes`, each new
    /// connection appends `ANSI_QUOTES` to its session `sql_mode`.
    pub fn connect_lazy(config: &BackendConfig) -> Self {
        let m = &config.mysql;
        let opts = MySqlConnectOptions::new()
            .host(&m.host)
            .port(m.port)
            .username(&m.user)
            .password(&m.password)
            .database(&m.database);
        let ansi = config.ansi_quotes;
        let pool = MySqlPoolOptions::new()
            .max_connections(POOL_SIZE)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if ansi {
                        conn.execute("SET SESSION sql_mode = CONCAT(@@SESSION.sql_mode, ',ANSI_QUOTES')")
                            .await?;
                    }
                    Ok(())
                })
            })
            .connect_lazy_with(opts);
        MySqlStore { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionPool for MySqlStore {
    async fn acquire(&self) -> Result<Box<dyn Connection>, AppError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::Connection(e.to_string()))?;
        Ok(Box::new(PooledMySqlConnection { conn }))
    }
}

struct PooledMySqlConnection {
    conn: PoolConnection<MySql>,
}

#[async_trait]
impl Connection for PooledMySqlConnection {
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %sql, params = ?params, "query");
        // Unparameterized statements go over the text protocol (SHOW/DESCRIBE are not preparable everywhere).
        let rows = if params.is_empty() {
            (&mut *self.conn).fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for p in params {
                query = query.bind(p.clone());
            }
            query.fetch_all(&mut *self.conn).await?
        };
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome, AppError> {
        tracing::debug!(sql = %sql, params = ?params, "execute");
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(p.clone());
        }
        let done = query.execute(&mut *self.conn).await?;
        Ok(WriteOutcome {
            rows_affected: done.rows_affected(),
            last_insert_id: done.last_insert_id(),
        })
    }
}

fn row_to_json(row: &MySqlRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    map
}

fn cell_to_value(row: &MySqlRow, i: usize) -> Value {
    use sqlx::Row as _;
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(i) {
        return v
            .and_then(|n| serde_json::Number::from_f64(n as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
        return v.map(|d| Value::String(d.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
        return v
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
        return v
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(i) {
        return v
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(i) {
        return v.unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
        return v
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(Value::Null);
    }
    // DECIMAL and other text-encoded types.
    row.try_get_unchecked::<Option<String>, _>(i)
        .ok()
        .flatten()
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// Text of the first column, however the server typed it (SHOW TABLES, DESCRIBE).
pub fn first_column_text(row: &Row) -> Option<String> {
    match row.values().next()? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
