//! Schema-driven REST backend: discovers MySQL tables at startup and serves
//! GET / GET :id / POST / PUT :id for each of them.

pub mod backend;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod request;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use backend::Backend;
pub use config::{BackendConfig, MySqlSettings, POOL_SIZE};
pub use error::{AppError, ConfigError};
pub use request::{EventKey, Operation, RequestContext};
pub use routes::{common_routes, table_routes};
pub use schema::{spawn_discovery, SchemaCache, SchemaStatus};
pub use service::{EventBus, QueryExecutor};
pub use sql::{QuerySpec, Quoting, ResultShape, SqlValue};
pub use state::{AppState, RouteTable};
pub use store::{Connection, ConnectionPool, MySqlStore, Row, WriteOutcome};
