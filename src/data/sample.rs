//! Synthetic Guinier curves with multiplicative Gaussian noise.
//!
//! Used by `sas synth` and by tests that need a realistic curve with a known
//! answer. Generation is fully deterministic for a given seed.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::data::Dataset;
use crate::error::{Result, SasError};
use crate::models::{Guinier, Model};

/// Parameters for a synthetic curve.
#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub i0: f64,
    pub rg: f64,
    pub background: f64,
    pub q_min: f64,
    pub q_max: f64,
    pub points: usize,
    /// Relative noise level: each intensity is multiplied by `1 + noise * z`,
    /// `z ~ N(0, 1)`. Zero gives the exact model curve.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            i0: 5.0,
            rg: 20.0,
            background: 2.0,
            q_min: 0.0,
            q_max: 0.15,
            points: 100,
            noise: 0.0,
            seed: 42,
        }
    }
}

/// Evenly spaced Q-grid, inclusive at both ends.
pub fn linear_grid(q_min: f64, q_max: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![q_min],
        n => {
            let step = (q_max - q_min) / (n as f64 - 1.0);
            (0..n).map(|k| q_min + step * k as f64).collect()
        }
    }
}

pub fn generate_sample(spec: &SampleSpec) -> Result<Dataset> {
    if spec.points == 0 {
        return Err(SasError::EmptyInput("sample point count must be > 0"));
    }
    if !(spec.q_min.is_finite() && spec.q_max.is_finite() && spec.q_max >= spec.q_min) {
        return Err(SasError::InvalidInterval {
            low: spec.q_min,
            high: spec.q_max,
        });
    }
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(SasError::Parse(format!(
            "Noise level must be finite and >= 0, got {}.",
            spec.noise
        )));
    }

    let q = linear_grid(spec.q_min, spec.q_max, spec.points);
    let exact = Guinier.evaluate(&q, &[spec.i0, spec.rg, spec.background])?;

    let i = if spec.noise == 0.0 {
        exact
    } else {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let normal = Normal::new(0.0, spec.noise)
            .map_err(|e| SasError::Parse(format!("Noise distribution error: {e}")))?;
        exact
            .into_iter()
            .map(|v| v * (1.0 + normal.sample(&mut rng)))
            .collect()
    };

    Dataset::new(q, i)
}
