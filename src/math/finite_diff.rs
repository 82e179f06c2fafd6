//! Finite-difference Jacobian of a vector residual function.
//!
//! Central differences come from `finitediff`. Its callbacks cannot fail, so
//! an error raised by the residual function is parked in a shared cell, the
//! callback returns NaNs, and the cell is checked once differencing is done.
//! A captured error always wins over the NaN-filled Jacobian.

use std::cell::RefCell;

use finitediff::FiniteDiff;
use nalgebra::DMatrix;

use crate::error::{Result, SasError};

/// Residual callback shape shared by the solver and the harness.
pub type ResidualFn<'a> = dyn FnMut(&[f64]) -> Result<Vec<f64>> + 'a;

/// `m × n` Jacobian of `residual` at `params`, where `m` is the residual length.
pub fn jacobian(residual: &mut ResidualFn<'_>, params: &[f64], m: usize) -> Result<DMatrix<f64>> {
    let n = params.len();
    let residual = RefCell::new(residual);
    let closure_err: RefCell<Option<SasError>> = RefCell::new(None);

    let f = |p: &Vec<f64>| -> Vec<f64> {
        if closure_err.borrow().is_some() {
            return vec![f64::NAN; m];
        }
        let mut residual = residual.borrow_mut();
        match (*residual)(p.as_slice()) {
            Ok(r) => r,
            Err(e) => {
                closure_err.replace(Some(e));
                vec![f64::NAN; m]
            }
        }
    };

    // One entry per parameter, each holding d r / d p_j over all residuals.
    let columns = params.to_vec().central_jacobian(&f);

    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_columns(&columns, n, m)?;

    Ok(DMatrix::from_fn(m, n, |k, j| columns[j][k]))
}

fn validate_columns(columns: &[Vec<f64>], n: usize, m: usize) -> Result<()> {
    if columns.len() != n {
        return Err(SasError::Shape {
            what: "jacobian columns",
            left: columns.len(),
            right: n,
        });
    }
    if let Some(col) = columns.iter().find(|c| c.len() != m) {
        return Err(SasError::Shape {
            what: "residual length during differencing",
            left: col.len(),
            right: m,
        });
    }
    if columns.iter().flatten().any(|v| !v.is_finite()) {
        return Err(SasError::ModelEvaluation(
            "non-finite value in finite-difference jacobian".to_string(),
        ));
    }
    Ok(())
}
