//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - Q-range intervals used by the mask engine (`Interval`)
//! - model selection (`ModelKind`)
//! - fit outputs and the saved fit record (`FitQuality`, `FitRecord`, ...)
//! - the run configuration (`FitConfig`)

pub mod types;

pub use types::*;
