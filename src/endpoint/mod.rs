//! Endpoint descriptors synthesized from routines and their comments.

pub mod comment;
pub mod descriptor;
pub mod synth;

pub use descriptor::*;
pub use synth::*;
