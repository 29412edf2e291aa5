//! Backend configuration: recognized options, defaults, and loaders.

pub mod types;
pub mod loader;

pub use types::*;
pub use loader::*;
