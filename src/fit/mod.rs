//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - hold named parameter cells for live-parameter models
//! - drive an injected least-squares solver over a model's residual
//! - run independent fits over many datasets (parallel)

pub mod batch;
pub mod harness;
pub mod parameter;
pub mod solver;

pub use batch::*;
pub use harness::*;
pub use parameter::*;
pub use solver::*;
