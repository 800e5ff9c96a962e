//! Routine execution and result rendering.

mod executor;
mod render;
pub use executor::{Outcome, RoutineExecutor};
pub use render::{render, text_to_json, RenderedBody, APPLICATION_JSON, TEXT_PLAIN};
