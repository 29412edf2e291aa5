//! Runs one built statement on its own pooled connection and shapes the result.

use crate::error::AppError;
use crate::service::EventBus;
use crate::sql::{QuerySpec, ResultShape};
use crate::store::{ConnectionPool, Row};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryExecutor {
    pool: Arc<dyn ConnectionPool>,
    events: EventBus,
}

impl QueryExecutor {
    pub fn new(pool: Arc<dyn ConnectionPool>, events: EventBus) -> Self {
        QueryExecutor { pool, events }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Acquire, run, release, then publish `spec.event` with the shaped result.
    /// Nothing is published when acquisition or the statement fails.
    pub async fn execute(&self, spec: &QuerySpec) -> Result<Value, AppError> {
        tracing::debug!(event = %spec.event, statement = %spec.interpolated(), "executing");
        let result = self.run(spec).await.map_err(|e| {
            tracing::warn!(event = %spec.event, error = %e, "query error");
            e
        })?;
        self.events.trigger(&spec.event.to_string(), &result);
        Ok(result)
    }

    async fn run(&self, spec: &QuerySpec) -> Result<Value, AppError> {
        // The connection is released when it goes out of scope, on success or error.
        let mut conn = self.pool.acquire().await?;
        match spec.shape {
            ResultShape::Scalar => {
                let done = conn.execute(&spec.sql, &spec.params).await?;
                let id = match &spec.id_override {
                    Some(id) => id.clone(),
                    None if done.last_insert_id > 0 => json!(done.last_insert_id),
                    None => Value::Null,
                };
                Ok(json!({ "id": id }))
            }
            ResultShape::Row | ResultShape::Array => {
                let rows = conn.fetch_all(&spec.sql, &spec.params).await?;
                Ok(shape_rows(rows, spec.shape))
            }
        }
    }
}

/// `{}` for no rows, every row for arrays, the first row otherwise.
pub fn shape_rows(rows: Vec<Row>, shape: ResultShape) -> Value {
    if rows.is_empty() {
        return Value::Object(Default::default());
    }
    match shape {
        ResultShape::Array => Value::Array(rows.into_iter().map(Value::Object).collect()),
        _ => rows.into_iter().next().map(Value::Object).unwrap_or(Value::Null),
    }
}
