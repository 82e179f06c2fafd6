//! The `Model` contract and the Guinier approximation.
//!
//! A model maps a Q-vector and an explicit parameter vector to predicted
//! intensities of the same length. The fit harness only ever talks to this
//! trait, so new physical forms plug in without touching the harness.

use crate::error::{Result, SasError};

pub trait Model {
    /// Short name used in error messages and reports.
    fn name(&self) -> &str;

    /// Parameter names, in the order the parameter vector uses.
    fn parameter_names(&self) -> Vec<String>;

    /// Number of parameters the model expects.
    fn arity(&self) -> usize {
        self.parameter_names().len()
    }

    /// Predicted intensities at each `q` for the parameter vector `params`.
    fn evaluate(&self, q: &[f64], params: &[f64]) -> Result<Vec<f64>>;

    /// Rewrite a solved vector into its canonical form when several vectors
    /// give the same curve. The harness applies this to the solver's best
    /// vector before reporting it.
    fn canonicalize(&self, _params: &mut [f64]) {}
}

impl<M: Model + ?Sized> Model for &M {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn parameter_names(&self) -> Vec<String> {
        (**self).parameter_names()
    }

    fn arity(&self) -> usize {
        (**self).arity()
    }

    fn evaluate(&self, q: &[f64], params: &[f64]) -> Result<Vec<f64>> {
        (**self).evaluate(q, params)
    }

    fn canonicalize(&self, params: &mut [f64]) {
        (**self).canonicalize(params)
    }
}

/// Guinier approximation for compact particles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guinier;

impl Model for Guinier {
    fn name(&self) -> &str {
        "guinier"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["i0".to_string(), "rg".to_string(), "background".to_string()]
    }

    fn arity(&self) -> usize {
        3
    }

    fn evaluate(&self, q: &[f64], params: &[f64]) -> Result<Vec<f64>> {
        guinier(q, params)
    }

    /// `I(Q)` depends on `rg²` only; report the non-negative root.
    fn canonicalize(&self, params: &mut [f64]) {
        if let Some(rg) = params.get_mut(1) {
            *rg = rg.abs();
        }
    }
}

/// `i0 * exp(-(1/3) * rg² * q²) + background`, element-wise over `q`.
///
/// `params` is `[i0, rg, background]`.
pub fn guinier(q: &[f64], params: &[f64]) -> Result<Vec<f64>> {
    let &[i0, rg, background] = params else {
        return Err(SasError::Arity {
            model: "guinier".to_string(),
            expected: 3,
            got: params.len(),
        });
    };
    if q.is_empty() {
        return Err(SasError::EmptyInput("zero length q vector"));
    }

    let rg2 = rg * rg;
    Ok(q.iter()
        .map(|&qk| i0 * (-(rg2 * qk * qk) / 3.0).exp() + background)
        .collect())
}

/// Adapts a plain closure `(q, params) -> prediction` into a [`Model`].
pub struct ModelFn<F> {
    name: String,
    names: Vec<String>,
    f: F,
}

impl<F> ModelFn<F>
where
    F: Fn(&[f64], &[f64]) -> Result<Vec<f64>>,
{
    pub fn new(name: impl Into<String>, parameter_names: &[&str], f: F) -> Self {
        Self {
            name: name.into(),
            names: parameter_names.iter().map(|s| s.to_string()).collect(),
            f,
        }
    }
}

impl<F> Model for ModelFn<F>
where
    F: Fn(&[f64], &[f64]) -> Result<Vec<f64>>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn evaluate(&self, q: &[f64], params: &[f64]) -> Result<Vec<f64>> {
        if params.len() != self.names.len() {
            return Err(SasError::Arity {
                model: self.name.clone(),
                expected: self.names.len(),
                got: params.len(),
            });
        }
        (self.f)(q, params)
    }
}
