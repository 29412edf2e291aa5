//! Table handlers: list, read, create, update, and the delete stub.
//! Each waits for its table's columns, builds one statement, and runs it.

use crate::error::{AppError, MethodError};
use crate::extractors::JsonBody;
use crate::request::{collect_filters, Operation, RequestContext};
use crate::response::{not_implemented, success};
use crate::sql::{self, QuerySpec, Quoting};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Builds one statement from the request and the table's columns.
type BuildStatement = fn(&RequestContext, &[String], Quoting) -> Result<QuerySpec, AppError>;

async fn serve(state: &AppState, build: BuildStatement, ctx: RequestContext) -> Result<Value, AppError> {
    if !state.routes.contains(&ctx.table) {
        return Err(AppError::UnknownTable(ctx.table));
    }
    let columns = state
        .schema
        .wait_for_table(&ctx.table, state.schema_wait_timeout)
        .await?;
    let spec = build(&ctx, &columns, state.quoting)?;
    state.executor.execute(&spec).await
}

async fn dispatch(state: &AppState, op: Operation, build: BuildStatement, ctx: RequestContext) -> Response {
    match serve(state, build, ctx).await {
        Ok(value) => success(value),
        Err(error) => MethodError {
            method: op.method(),
            error,
        }
        .into_response(),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let ctx = RequestContext::new(table).with_query(collect_filters(params));
    dispatch(&state, Operation::Get, |c, cols, q| Ok(sql::select(c, cols, q)), ctx).await
}

pub async fn read(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Response {
    let ctx = RequestContext::new(table).with_id(id);
    dispatch(&state, Operation::Get, |c, cols, q| Ok(sql::select(c, cols, q)), ctx).await
}

pub async fn create(
    State(state): State<AppState>,
    Path(table): Path<String>,
    JsonBody(body): JsonBody,
) -> Response {
    let ctx = RequestContext::new(table).with_body(body);
    dispatch(&state, Operation::Post, |c, cols, q| Ok(sql::insert(c, cols, q)), ctx).await
}

/// Where-filters come from the query string: `PUT /t/1?status=1,2`.
pub async fn update(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    JsonBody(body): JsonBody,
) -> Response {
    let ctx = RequestContext::new(table)
        .with_id(id)
        .with_body(body)
        .with_filters(collect_filters(params));
    dispatch(&state, Operation::Put, sql::update, ctx).await
}

/// Never touches the schema cache or the database.
pub async fn delete(State(state): State<AppState>, Path((table, _id)): Path<(String, String)>) -> Response {
    if !state.routes.contains(&table) {
        return MethodError {
            method: Operation::Delete.method(),
            error: AppError::UnknownTable(table),
        }
        .into_response();
    }
    not_implemented()
}
