//! Request extractors.

mod body;
pub use body::{parse_body, JsonBody};
