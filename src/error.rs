//! Typed errors and HTTP mapping.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing option: {0}")]
    Missing(&'static str),
    #[error("invalid option {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Pool or connection acquisition failed.
    #[error("connection: {0}")]
    Connection(String),
    /// The driver rejected the statement. Carries the server message.
    #[error("{0}")]
    Query(String),
    #[error("{0}")]
    Validation(String),
    #[error("schema unavailable for table {table}: {reason}")]
    SchemaUnavailable { table: String, reason: String },
    #[error("schema discovery: {0}")]
    Discovery(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => AppError::Query(db.message().to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                AppError::Connection(e.to_string())
            }
            other => AppError::Query(other.to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    pub fn body(&self) -> ErrorBody {
        ErrorBody { error: self.to_string() }
    }
}

/// Status for a failed request: chosen by method, never by error content.
pub fn status_for_method(method: &Method) -> StatusCode {
    match *method {
        Method::GET => StatusCode::NOT_FOUND,
        Method::POST | Method::PUT | Method::DELETE => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::NOT_IMPLEMENTED,
    }
}

/// Error paired with the method of the request that produced it.
pub struct MethodError {
    pub method: Method,
    pub error: AppError,
}

impl IntoResponse for MethodError {
    fn into_response(self) -> Response {
        // Unknown tables behave like unregistered routes.
        let status = match &self.error {
            AppError::UnknownTable(_) => StatusCode::NOT_FOUND,
            _ => status_for_method(&self.method),
        };
        tracing::debug!(method = %self.method, status = %status, error = %self.error, "request failed");
        (status, Json(self.error.body())).into_response()
    }
}
