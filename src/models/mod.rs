//! Physical model implementations.
//!
//! Models are small, pure evaluators behind the [`Model`] trait so that the fit
//! harness can stay generic.

pub mod guess;
pub mod model;

pub use guess::*;
pub use model::*;

use crate::domain::ModelKind;

/// Concrete model for a CLI-selected kind.
pub fn model_for(kind: ModelKind) -> Box<dyn Model> {
    match kind {
        ModelKind::Guinier => Box::new(Guinier),
    }
}
