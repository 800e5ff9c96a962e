//! Catalog introspection: routines, their arguments and return shapes.

pub mod loader;
pub mod query;
pub mod routine;

pub use loader::*;
pub use query::*;
pub use routine::*;
