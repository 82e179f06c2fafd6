//! Mask engine: compile Q-range keep intervals into per-sample selectors.

pub mod engine;

pub use engine::*;
