//! Named parameter cells for callers that want "live" parameters.
//!
//! A [`Parameter`] is a shared handle to a mutable scalar: cloning it yields
//! another handle to the same cell. Models built with [`LiveModel`] read the
//! cells directly instead of receiving the parameter vector, which is how the
//! harness's live-cell path ([`crate::fit::fit_parameters`]) drives them.
//!
//! Cells are `Rc<Cell<f64>>`, so a parameter set cannot cross threads. Parallel
//! fits each build their own set.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, SasError};
use crate::models::Model;

#[derive(Clone)]
pub struct Parameter {
    name: Rc<str>,
    cell: Rc<Cell<f64>>,
}

impl Parameter {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: Rc::from(name),
            cell: Rc::new(Cell::new(value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.cell.get()
    }

    pub fn set(&self, value: f64) {
        self.cell.set(value);
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value", &self.value())
            .finish()
    }
}

/// Ordered list of parameters; position `j` binds to `p[j]`.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    /// Build a set from `(name, initial value)` pairs.
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self::new(pairs.iter().map(|(n, v)| Parameter::new(n, *v)).collect())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(Parameter::value).collect()
    }

    /// Write `values[j]` into the `j`-th cell.
    pub fn bind(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.params.len() {
            return Err(SasError::Shape {
                what: "parameter vector and parameter set",
                left: values.len(),
                right: self.params.len(),
            });
        }
        for (p, &v) in self.params.iter().zip(values) {
            p.set(v);
        }
        Ok(())
    }
}

/// A model that reads its parameters from live cells.
///
/// The closure receives only `q`; it must consult the cells it captured. The
/// parameter vector passed to [`Model::evaluate`] is ignored here because the
/// harness has already bound it into the cells.
pub struct LiveModel<F> {
    name: String,
    names: Vec<String>,
    f: F,
    canonical: Option<fn(&mut [f64])>,
}

impl<F> LiveModel<F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>>,
{
    pub fn new(name: impl Into<String>, parameters: &ParameterSet, f: F) -> Self {
        Self {
            name: name.into(),
            names: parameters.names(),
            f,
            canonical: None,
        }
    }

    /// Canonical form for solved vectors, e.g. `|p| Guinier.canonicalize(p)`.
    pub fn with_canonical(mut self, canonical: fn(&mut [f64])) -> Self {
        self.canonical = Some(canonical);
        self
    }
}

impl<F> Model for LiveModel<F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn evaluate(&self, q: &[f64], _params: &[f64]) -> Result<Vec<f64>> {
        (self.f)(q)
    }

    fn canonicalize(&self, params: &mut [f64]) {
        if let Some(canonical) = self.canonical {
            canonical(params);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Guinier;

    #[test]
    fn clones_share_the_cell() {
        let a = Parameter::new("i0", 1.0);
        let b = a.clone();
        b.set(4.5);
        assert_eq!(a.value(), 4.5);
        assert_eq!(a.name(), "i0");
    }

    #[test]
    fn bind_writes_in_order_and_checks_length() {
        let set = ParameterSet::from_pairs(&[("i0", 1.0), ("rg", 1.0), ("background", 0.0)]);
        set.bind(&[5.0, 20.0, 2.0]).unwrap();
        assert_eq!(set.values(), vec![5.0, 20.0, 2.0]);
        assert_eq!(set.get("rg").unwrap().value(), 20.0);
        assert!(set.get("missing").is_none());
        assert!(matches!(set.bind(&[1.0]), Err(SasError::Shape { .. })));
        // A failed bind leaves the cells alone.
        assert_eq!(set.values(), vec![5.0, 20.0, 2.0]);
    }

    #[test]
    fn live_model_reads_cells() {
        let set = ParameterSet::from_pairs(&[("a", 2.0)]);
        let a = set.get("a").unwrap().clone();
        let model = LiveModel::new("scale", &set, move |q: &[f64]| {
            Ok(q.iter().map(|x| a.value() * x).collect())
        });
        assert_eq!(model.arity(), 1);
        assert_eq!(model.evaluate(&[1.0, 2.0], &[]).unwrap(), vec![2.0, 4.0]);
        set.bind(&[3.0]).unwrap();
        assert_eq!(model.evaluate(&[1.0], &[]).unwrap(), vec![3.0]);
    }

    #[test]
    fn live_model_canonical_form_is_opt_in() {
        let set = ParameterSet::from_pairs(&[("i0", 1.0), ("rg", 1.0), ("background", 0.0)]);
        let plain = LiveModel::new("guinier", &set, |q: &[f64]| Ok(vec![0.0; q.len()]));
        let mut p = [5.0, -20.0, 2.0];
        plain.canonicalize(&mut p);
        assert_eq!(p[1], -20.0);

        let canonical = plain.with_canonical(|p: &mut [f64]| Guinier.canonicalize(p));
        canonical.canonicalize(&mut p);
        assert_eq!(p, [5.0, 20.0, 2.0]);
    }
}
