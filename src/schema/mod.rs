//! Schema discovery and the per-table column cache.

mod cache;
mod discovery;
pub use cache::*;
pub use discovery::*;
