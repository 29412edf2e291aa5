//! Router builders.

mod common;
mod table;
pub use common::common_routes;
pub use table::table_routes;
