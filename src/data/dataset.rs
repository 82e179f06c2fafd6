//! One-dimensional scattering curve: `I` sampled on a `Q` grid.
//!
//! `Dataset` is a value type. Every arithmetic operation returns a new dataset
//! with freshly allocated vectors; operands are never modified.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::domain::DatasetStats;
use crate::error::{Result, SasError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    q: Vec<f64>,
    i: Vec<f64>,
}

impl Dataset {
    /// Build a dataset from index-aligned `q` and `i` vectors.
    pub fn new(q: Vec<f64>, i: Vec<f64>) -> Result<Self> {
        if q.len() != i.len() {
            return Err(SasError::Shape {
                what: "q and i",
                left: q.len(),
                right: i.len(),
            });
        }
        Ok(Self { q, i })
    }

    pub fn q(&self) -> &[f64] {
        &self.q
    }

    pub fn i(&self) -> &[f64] {
        &self.i
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// `(q, i)` sample pairs in order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.q.iter().copied().zip(self.i.iter().copied())
    }

    /// Pointwise sum of two datasets sampled on the same Q-grid.
    pub fn add_dataset(&self, other: &Dataset) -> Result<Dataset> {
        if self.len() != other.len() {
            return Err(SasError::DomainMismatch(format!(
                "{} points vs {} points",
                self.len(),
                other.len()
            )));
        }
        if let Some(k) = self.q.iter().zip(&other.q).position(|(a, b)| !same_q(*a, *b)) {
            return Err(SasError::DomainMismatch(format!(
                "q[{k}] = {} vs {}",
                self.q[k], other.q[k]
            )));
        }

        let i = self.i.iter().zip(&other.i).map(|(a, b)| a + b).collect();
        Ok(Dataset {
            q: self.q.clone(),
            i,
        })
    }

    /// Shift every intensity by `c` (e.g. background subtraction with `-c`).
    pub fn add_scalar(&self, c: f64) -> Result<Dataset> {
        ensure_finite("add", c)?;
        Ok(self.map_i(|v| v + c))
    }

    /// Scale every intensity by `c`; Q is unchanged.
    pub fn scale(&self, c: f64) -> Result<Dataset> {
        ensure_finite("multiply", c)?;
        Ok(self.map_i(|v| v * c))
    }

    pub fn stats(&self) -> Option<DatasetStats> {
        if self.is_empty() {
            return None;
        }
        let fold = |xs: &[f64]| {
            xs.iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                })
        };
        let (q_min, q_max) = fold(&self.q);
        let (i_min, i_max) = fold(&self.i);
        Some(DatasetStats {
            n_points: self.len(),
            q_min,
            q_max,
            i_min,
            i_max,
        })
    }

    /// Keep the samples whose `keep` flag is set, preserving order.
    ///
    /// Callers are responsible for `keep.len() == self.len()`; the mask engine
    /// checks this before calling.
    pub(crate) fn select(&self, keep: &[bool]) -> Dataset {
        let (q, i) = self
            .points()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(p, _)| p)
            .unzip();
        Dataset { q, i }
    }

    fn map_i(&self, f: impl Fn(f64) -> f64) -> Dataset {
        Dataset {
            q: self.q.clone(),
            i: self.i.iter().map(|&v| f(v)).collect(),
        }
    }
}

// Grid points agree when equal, or when both are NaN.
fn same_q(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn ensure_finite(op: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SasError::TypeMismatch { op, value })
    }
}

// Deserialize through `new` so a JSON file cannot bypass the length check.
impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            q: Vec<f64>,
            i: Vec<f64>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Dataset::new(raw.q, raw.i).map_err(serde::de::Error::custom)
    }
}

impl Add<&Dataset> for &Dataset {
    type Output = Result<Dataset>;

    fn add(self, rhs: &Dataset) -> Self::Output {
        self.add_dataset(rhs)
    }
}

impl Add<f64> for &Dataset {
    type Output = Result<Dataset>;

    fn add(self, rhs: f64) -> Self::Output {
        self.add_scalar(rhs)
    }
}

impl Sub<f64> for &Dataset {
    type Output = Result<Dataset>;

    fn sub(self, rhs: f64) -> Self::Output {
        self.add_scalar(-rhs)
    }
}

impl Mul<f64> for &Dataset {
    type Output = Result<Dataset>;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}
