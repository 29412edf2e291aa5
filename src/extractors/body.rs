//! Request body for table writes, read as a JSON object.

use crate::error::{AppError, MethodError};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
};
use serde_json::{Map, Value};

/// Body of a POST or PUT. No body, or a content type other than JSON, reads as `{}`.
/// Unreadable bodies, malformed JSON, and JSON that is not an object are rejected
/// with the request method so the usual status mapping applies.
#[derive(Clone, Debug, Default)]
pub struct JsonBody(pub Map<String, Value>);

fn is_json_content_type(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Parse a JSON body. Blank input and `null` are `{}`.
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("malformed JSON body: {}", e))),
    }
}

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = MethodError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        if !is_json_content_type(&req) {
            return Ok(JsonBody::default());
        }
        let bytes = match Bytes::from_request(req, state).await {
            Ok(bytes) => bytes,
            Err(rejection) => {
                return Err(MethodError {
                    method,
                    error: AppError::BadRequest(rejection.body_text()),
                })
            }
        };
        parse_body(&bytes)
            .map(JsonBody)
            .map_err(|error| MethodError { method, error })
    }
}
