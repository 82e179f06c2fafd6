//! Data-derived starting points for the solver.

use crate::data::Dataset;
use crate::domain::ModelKind;
use crate::error::{Result, SasError};

/// User-supplied starting values; `None` fields are derived from the data.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuessOverrides {
    pub i0: Option<f64>,
    pub rg: Option<f64>,
    pub background: Option<f64>,
}

/// Starting vector for `kind`, in the model's parameter order.
///
/// Guinier: `background = min(I)`, `i0 = max(I) - min(I)`, `Rg = 1 / median(Q)`
/// (so `Rg·Q ≈ 1` mid-curve), each replaced by an override when given.
pub fn initial_guess(kind: ModelKind, data: &Dataset, overrides: &GuessOverrides) -> Result<Vec<f64>> {
    let stats = data
        .stats()
        .ok_or(SasError::EmptyInput("no data points to derive a starting point from"))?;

    match kind {
        ModelKind::Guinier => {
            let background = overrides.background.unwrap_or(stats.i_min);
            let i0 = overrides
                .i0
                .unwrap_or_else(|| (stats.i_max - stats.i_min).max(f64::EPSILON));
            let rg = overrides.rg.unwrap_or_else(|| {
                let q_mid = median(data.q());
                if q_mid.is_finite() && q_mid > 0.0 { 1.0 / q_mid } else { 1.0 }
            });
            let guess = vec![i0, rg, background];
            if let Some(v) = guess.iter().find(|v| !v.is_finite()) {
                return Err(SasError::TypeMismatch {
                    op: "initial guess",
                    value: *v,
                });
            }
            Ok(guess)
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_guinier_guess_from_data() {
        let d = Dataset::new(vec![0.0, 0.1, 0.2], vec![7.0, 4.0, 2.5]).unwrap();
        let g = initial_guess(ModelKind::Guinier, &d, &GuessOverrides::default()).unwrap();
        assert_eq!(g, vec![4.5, 10.0, 2.5]);
    }

    #[test]
    fn overrides_win() {
        let d = Dataset::new(vec![0.0, 0.1], vec![7.0, 4.0]).unwrap();
        let o = GuessOverrides {
            i0: Some(1.0),
            rg: Some(1.0),
            background: Some(0.0),
        };
        assert_eq!(
            initial_guess(ModelKind::Guinier, &d, &o).unwrap(),
            vec![1.0, 1.0, 0.0]
        );
    }

    #[test]
    fn zero_q_falls_back_to_unit_rg() {
        let d = Dataset::new(vec![0.0], vec![3.0]).unwrap();
        let g = initial_guess(ModelKind::Guinier, &d, &GuessOverrides::default()).unwrap();
        assert_eq!(g[1], 1.0);
    }

    #[test]
    fn empty_data_has_no_guess() {
        let d = Dataset::new(vec![], vec![]).unwrap();
        assert!(initial_guess(ModelKind::Guinier, &d, &GuessOverrides::default()).is_err());
    }
}
