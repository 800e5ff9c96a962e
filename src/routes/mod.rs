pub mod common;
pub mod routine;

pub use common::*;
pub use routine::*;
