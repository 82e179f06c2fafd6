//! Data layer: the `Dataset` value type and synthetic sample generation.

pub mod dataset;
pub mod sample;

pub use dataset::Dataset;
pub use sample::{SampleSpec, generate_sample, linear_grid};
