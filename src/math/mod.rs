//! Numerical helpers: finite-difference Jacobians.

pub mod finite_diff;

pub use finite_diff::*;
