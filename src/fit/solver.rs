//! Nonlinear least-squares solver boundary.
//!
//! The fit harness never calls a concrete optimizer; it hands a residual
//! callback and a starting vector to whatever [`LeastSquaresSolver`] it was
//! given. [`LevenbergMarquardt`] is the default strategy; tests substitute
//! deterministic stubs.
//!
//! Iteration and evaluation caps live here and nowhere else.

use std::cell::{Cell, RefCell};

use levenberg_marquardt::{self as lm, LeastSquaresProblem, TerminationReason};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SasError};
use crate::math::{ResidualFn, jacobian};

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// Residual norm fell to rounding level.
    SmallResidual,
    /// Gradient `Jᵀr` vanished.
    SmallGradient,
    /// Step became negligible relative to the parameters.
    SmallStep,
    /// Actual and predicted relative reductions both negligible.
    SmallReduction,
    MaxIterations,
    MaxEvaluations,
    /// No acceptable step could be found, or a trial vector gave non-finite residuals.
    StepFailed,
    /// Stub or external solver that does not report a reason.
    Unspecified,
}

impl Termination {
    pub fn converged(self) -> bool {
        matches!(
            self,
            Termination::SmallResidual
                | Termination::SmallGradient
                | Termination::SmallStep
                | Termination::SmallReduction
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Termination::SmallResidual => "residual at rounding level",
            Termination::SmallGradient => "gradient below tolerance",
            Termination::SmallStep => "step below tolerance",
            Termination::SmallReduction => "relative reduction below tolerance",
            Termination::MaxIterations => "iteration limit reached",
            Termination::MaxEvaluations => "evaluation limit reached",
            Termination::StepFailed => "no acceptable step",
            Termination::Unspecified => "unspecified",
        }
    }
}

/// Raw solver result.
#[derive(Debug, Clone)]
pub struct SolverReport {
    /// Best vector found (the one with the lowest residual norm).
    pub params: Vec<f64>,
    pub converged: bool,
    pub termination: Termination,
    pub iterations: usize,
    pub evaluations: usize,
    /// Sum of squared residuals at `params`.
    pub sse: f64,
}

pub trait LeastSquaresSolver {
    /// Minimize `Σ r(p)²` starting from `initial`.
    ///
    /// Errors returned by `residual` are propagated unchanged. Running out of
    /// iterations is not an error: it is reported with `converged = false`.
    fn minimize(&self, residual: &mut ResidualFn<'_>, initial: &[f64]) -> Result<SolverReport>;
}

impl<S: LeastSquaresSolver + ?Sized> LeastSquaresSolver for &S {
    fn minimize(&self, residual: &mut ResidualFn<'_>, initial: &[f64]) -> Result<SolverReport> {
        (**self).minimize(residual, initial)
    }
}

/// MINPACK Levenberg–Marquardt (`levenberg-marquardt` crate) behind the
/// [`LeastSquaresSolver`] seam.
///
/// The Jacobian is finite-differenced from the residual callback. Caps are
/// enforced by the adapter, so hitting one ends the solve with the best vector
/// seen so far rather than an error.
#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    pub max_evaluations: usize,
    /// Relative reduction tolerance.
    pub ftol: f64,
    /// Relative step tolerance.
    pub xtol: f64,
    /// Orthogonality (gradient) tolerance.
    pub gtol: f64,
    /// Initial step bound factor.
    pub stepbound: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            max_evaluations: 5_000,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
            stepbound: 100.0,
        }
    }
}

impl LevenbergMarquardt {
    /// Same tolerance for reduction and step; gradient tolerance two decades tighter.
    pub fn with_limits(max_iterations: usize, max_evaluations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            max_evaluations,
            ftol: tolerance,
            xtol: tolerance,
            gtol: tolerance * 1e-2,
            ..Self::default()
        }
    }
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Residual callback dressed up as a `LeastSquaresProblem`.
///
/// The crate's callbacks can only answer `None`, so a residual error is parked
/// in `closure_err` and a tripped cap in `stop`; both are read back once the
/// crate returns.
struct ResidualProblem<'a, 'b> {
    f: RefCell<&'a mut ResidualFn<'b>>,
    m: usize,
    max_iterations: usize,
    max_evaluations: usize,
    params: DVector<f64>,
    residuals: Option<DVector<f64>>,
    best: Vec<f64>,
    best_sse: f64,
    iterations: Cell<usize>,
    evaluations: Cell<usize>,
    stop: Cell<Option<Termination>>,
    closure_err: RefCell<Option<SasError>>,
}

impl ResidualProblem<'_, '_> {
    fn halted(&self) -> bool {
        self.stop.get().is_some() || self.closure_err.borrow().is_some()
    }

    fn evaluate(&self, p: &[f64]) -> Option<Vec<f64>> {
        if self.halted() {
            return None;
        }
        if self.evaluations.get() >= self.max_evaluations {
            self.stop.set(Some(Termination::MaxEvaluations));
            return None;
        }
        self.evaluations.set(self.evaluations.get() + 1);

        let result = {
            let mut f = self.f.borrow_mut();
            (*f)(p)
        };
        match result {
            Ok(r) if r.len() != self.m => {
                self.closure_err.replace(Some(SasError::Shape {
                    what: "residual length during solve",
                    left: r.len(),
                    right: self.m,
                }));
                None
            }
            Ok(r) if r.iter().any(|v| !v.is_finite()) => {
                self.stop.set(Some(Termination::StepFailed));
                None
            }
            Ok(r) => Some(r),
            Err(e) => {
                self.closure_err.replace(Some(e));
                None
            }
        }
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for ResidualProblem<'_, '_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.copy_from(x);
        let r = self.evaluate(x.as_slice());
        if let Some(r) = &r {
            let sse = sum_sq(r);
            log::trace!("lm trial: sse={sse:.6e} x={:?}", x.as_slice());
            if sse < self.best_sse {
                self.best_sse = sse;
                self.best = x.as_slice().to_vec();
            }
        }
        self.residuals = r.map(DVector::from_vec);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.residuals.clone()
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        if self.halted() {
            return None;
        }
        if self.iterations.get() >= self.max_iterations {
            self.stop.set(Some(Termination::MaxIterations));
            return None;
        }
        if self.evaluations.get() + 2 * self.params.len() > self.max_evaluations {
            self.stop.set(Some(Termination::MaxEvaluations));
            return None;
        }
        self.iterations.set(self.iterations.get() + 1);
        log::debug!(
            "lm iter {}: sse={:.6e} x={:?}",
            self.iterations.get(),
            self.best_sse,
            self.params.as_slice()
        );

        let mut eval = |p: &[f64]| {
            self.evaluations.set(self.evaluations.get() + 1);
            let mut f = self.f.borrow_mut();
            (*f)(p)
        };
        match jacobian(&mut eval, self.params.as_slice(), self.m) {
            Ok(jac) => Some(jac),
            Err(e) => {
                self.closure_err.replace(Some(e));
                None
            }
        }
    }
}

fn termination_from(reason: &TerminationReason) -> Result<Termination> {
    Ok(match reason {
        TerminationReason::ResidualsZero => Termination::SmallResidual,
        TerminationReason::Orthogonal => Termination::SmallGradient,
        TerminationReason::Converged { ftol: true, .. } => Termination::SmallReduction,
        TerminationReason::Converged { .. } => Termination::SmallStep,
        TerminationReason::LostPatience => Termination::MaxEvaluations,
        TerminationReason::WrongDimensions(what) => {
            return Err(SasError::Solver(format!("dimension mismatch in {what}")));
        }
        _ => Termination::StepFailed,
    })
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn minimize(&self, residual: &mut ResidualFn<'_>, initial: &[f64]) -> Result<SolverReport> {
        let n = initial.len();
        if n == 0 {
            return Err(SasError::EmptyInput("parameter vector"));
        }

        let r0 = residual(initial)?;
        let m = r0.len();
        if m == 0 {
            return Err(SasError::EmptyInput("residual vector"));
        }
        let sse0 = sum_sq(&r0);
        if sse0 == 0.0 {
            return Ok(SolverReport {
                params: initial.to_vec(),
                converged: true,
                termination: Termination::SmallResidual,
                iterations: 0,
                evaluations: 1,
                sse: 0.0,
            });
        }

        let problem = ResidualProblem {
            f: RefCell::new(residual),
            m,
            max_iterations: self.max_iterations,
            max_evaluations: self.max_evaluations,
            params: DVector::from_column_slice(initial),
            residuals: Some(DVector::from_vec(r0)),
            best: initial.to_vec(),
            best_sse: sse0,
            iterations: Cell::new(0),
            evaluations: Cell::new(1),
            stop: Cell::new(None),
            closure_err: RefCell::new(None),
        };

        let (problem, report) = lm::LevenbergMarquardt::new()
            .with_ftol(self.ftol)
            .with_xtol(self.xtol)
            .with_gtol(self.gtol)
            .with_stepbound(self.stepbound)
            .with_patience(self.max_evaluations.max(1))
            .minimize(problem);

        if let Some(err) = problem.closure_err.into_inner() {
            return Err(err);
        }
        let termination = match problem.stop.get() {
            Some(t) => t,
            None => termination_from(&report.termination)?,
        };
        log::debug!(
            "lm stopped ({}): {:?} after {} evaluations",
            termination.describe(),
            report.termination,
            problem.evaluations.get()
        );

        Ok(SolverReport {
            params: problem.best,
            converged: termination.converged(),
            termination,
            iterations: problem.iterations.get(),
            evaluations: problem.evaluations.get(),
            sse: problem.best_sse,
        })
    }
}
