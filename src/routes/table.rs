//! Table routes keyed by the route table in state.
//! Parameterized paths so Path extractors receive the table and id; handlers look the table up.

use crate::handlers::table::{create, delete, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route("/:table", get(list).post(create))
        .route("/:table/:id", get(read).put(update).delete(delete))
        .with_state(state)
}
