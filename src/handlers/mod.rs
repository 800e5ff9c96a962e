//! HTTP handlers for routine endpoints.

pub mod routine;
pub use routine::*;
