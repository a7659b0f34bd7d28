//! CLI command implementations

pub mod list;
pub mod resources;
pub mod synth;
