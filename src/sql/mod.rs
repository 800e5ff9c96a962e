//! Routine call statements, parameter values and their conversion from HTTP input.

mod builder;
pub mod array;
pub mod marshal;
pub mod params;
pub use builder::*;
pub use params::*;
