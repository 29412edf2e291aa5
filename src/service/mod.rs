//! Query execution and the post-query event bus.

mod events;
mod executor;
pub use events::{EventBus, EventHandler};
pub use executor::{shape_rows, QueryExecutor};
