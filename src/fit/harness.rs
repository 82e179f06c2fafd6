//! Model-fitting harness.
//!
//! Given a model, a starting parameter vector and observed `(q, i)` data, the
//! harness builds the residual `i_observed - model(q, p)` as a function of the
//! free parameter vector only, hands it to an injected solver, and packages the
//! solver's best vector together with fit diagnostics.
//!
//! Two entry points:
//! - [`fit`]: explicit parameter vectors in and out.
//! - [`fit_parameters`]: the live-cell form. Each candidate vector is written
//!   into the parameter cells before the model runs, and the solver's best
//!   vector is re-bound into the cells once it returns.
//!
//! Either way the best vector passes through [`Model::canonicalize`] before it
//! is reported or bound.

use nalgebra::DMatrix;

use crate::error::{Result, SasError};
use crate::fit::parameter::ParameterSet;
use crate::fit::solver::{LeastSquaresSolver, SolverReport, Termination};
use crate::math::{ResidualFn, jacobian};
use crate::models::Model;

/// Fit result: best parameters plus diagnostics.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub names: Vec<String>,
    pub params: Vec<f64>,
    /// `sqrt(diag(s² (JᵀJ)⁻¹))`; `None` without spare degrees of freedom or
    /// with a singular `JᵀJ`.
    pub std_errors: Option<Vec<f64>>,
    pub converged: bool,
    pub termination: Termination,
    pub iterations: usize,
    pub evaluations: usize,
    pub sse: f64,
    pub rmse: f64,
    pub n_points: usize,
    /// Model prediction at `params` on the fitted `q`.
    pub fitted: Vec<f64>,
}

impl FitOutcome {
    pub fn value(&self, name: &str) -> Option<f64> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.params.get(idx).copied()
    }
}

/// Fit `model` to `(q, i_observed)` starting from `initial`.
pub fn fit<M, S>(
    model: &M,
    initial: &[f64],
    q: &[f64],
    i_observed: &[f64],
    solver: &S,
) -> Result<FitOutcome>
where
    M: Model + ?Sized,
    S: LeastSquaresSolver + ?Sized,
{
    validate(model, initial.len(), q, i_observed)?;

    let mut residual = |p: &[f64]| residual_vector(model, q, p, i_observed);
    let mut report = solver.minimize(&mut residual, initial)?;
    model.canonicalize(&mut report.params);
    finish(model.parameter_names(), &report, i_observed, &mut residual)
}

/// Fit with live parameter cells.
///
/// The initial vector is read from `parameters`. During the solve, every
/// residual evaluation first writes the candidate vector into the cells (the
/// only write path), then evaluates `model`. After the solver returns, the best
/// vector is explicitly bound into the cells, so they never end on a trial
/// vector. If the fit fails with an error, the cells keep the last vector that
/// was evaluated.
pub fn fit_parameters<M, S>(
    model: &M,
    parameters: &ParameterSet,
    q: &[f64],
    i_observed: &[f64],
    solver: &S,
) -> Result<FitOutcome>
where
    M: Model + ?Sized,
    S: LeastSquaresSolver + ?Sized,
{
    let initial = parameters.values();
    validate(model, initial.len(), q, i_observed)?;

    let mut residual = |p: &[f64]| {
        parameters.bind(p)?;
        residual_vector(model, q, p, i_observed)
    };
    let mut report = solver.minimize(&mut residual, &initial)?;
    model.canonicalize(&mut report.params);
    let outcome = finish(parameters.names(), &report, i_observed, &mut residual);

    parameters.bind(&report.params)?;
    outcome
}

fn validate<M: Model + ?Sized>(model: &M, n_params: usize, q: &[f64], i_observed: &[f64]) -> Result<()> {
    if q.len() != i_observed.len() {
        return Err(SasError::Shape {
            what: "q and observed i",
            left: q.len(),
            right: i_observed.len(),
        });
    }
    if q.is_empty() {
        return Err(SasError::EmptyInput("no data points to fit"));
    }
    if n_params != model.arity() {
        return Err(SasError::Arity {
            model: model.name().to_string(),
            expected: model.arity(),
            got: n_params,
        });
    }
    Ok(())
}

/// `i_observed - model(q, p)`, rejecting model failures and non-finite values.
fn residual_vector<M: Model + ?Sized>(
    model: &M,
    q: &[f64],
    p: &[f64],
    i_observed: &[f64],
) -> Result<Vec<f64>> {
    let predicted = model.evaluate(q, p).map_err(|e| match e {
        SasError::ModelEvaluation(_) => e,
        other => SasError::ModelEvaluation(format!("{} at {p:?}: {other}", model.name())),
    })?;
    if predicted.len() != i_observed.len() {
        return Err(SasError::ModelEvaluation(format!(
            "{} returned {} values for {} points",
            model.name(),
            predicted.len(),
            i_observed.len()
        )));
    }

    let mut out = Vec::with_capacity(predicted.len());
    for (k, (obs, pred)) in i_observed.iter().zip(&predicted).enumerate() {
        let r = obs - pred;
        if !r.is_finite() {
            return Err(SasError::ModelEvaluation(format!(
                "{} is not finite at q[{k}] = {} for parameters {p:?}",
                model.name(),
                q[k]
            )));
        }
        out.push(r);
    }
    Ok(out)
}

fn finish(
    names: Vec<String>,
    report: &SolverReport,
    i_observed: &[f64],
    residual: &mut ResidualFn<'_>,
) -> Result<FitOutcome> {
    let r = residual(&report.params)?;
    let n_points = r.len();
    let sse: f64 = r.iter().map(|v| v * v).sum();
    let rmse = (sse / n_points as f64).sqrt();
    // r = observed - fitted
    let fitted = i_observed.iter().zip(&r).map(|(obs, rk)| obs - rk).collect();

    let std_errors = standard_errors(residual, &report.params, &r, sse);

    if report.converged {
        log::info!(
            "fit converged after {} iterations ({}): sse={sse:.6e}",
            report.iterations,
            report.termination.describe()
        );
    } else {
        log::warn!(
            "fit did not converge after {} iterations ({}); returning best-effort parameters",
            report.iterations,
            report.termination.describe()
        );
    }

    Ok(FitOutcome {
        names,
        params: report.params.clone(),
        std_errors,
        converged: report.converged,
        termination: report.termination,
        iterations: report.iterations,
        evaluations: report.evaluations,
        sse,
        rmse,
        n_points,
        fitted,
    })
}

fn standard_errors(residual: &mut ResidualFn<'_>, params: &[f64], r: &[f64], sse: f64) -> Option<Vec<f64>> {
    let m = r.len();
    let n = params.len();
    if m <= n {
        return None;
    }
    let jac = jacobian(residual, params, m).ok()?;
    let jtj: DMatrix<f64> = jac.transpose() * &jac;
    let cov = invert_spd(&jtj)? * (sse / (m - n) as f64);
    let errs: Vec<f64> = (0..n).map(|j| cov[(j, j)].sqrt()).collect();
    errs.iter().all(|v| v.is_finite()).then_some(errs)
}

/// Inverse of a small symmetric positive (semi-)definite matrix, `None` when singular.
fn invert_spd(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if let Some(chol) = m.clone().cholesky() {
        return Some(chol.inverse());
    }
    m.clone().try_inverse()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::data::linear_grid;
    use crate::fit::parameter::LiveModel;
    use crate::fit::solver::LevenbergMarquardt;
    use crate::models::{Guinier, ModelFn, guinier};

    fn synthetic() -> (Vec<f64>, Vec<f64>) {
        let q = linear_grid(0.0, 0.15, 100);
        let i = guinier(&q, &[5.0, 20.0, 2.0]).unwrap();
        (q, i)
    }

    /// Evaluates a few trial vectors, then returns a fixed answer.
    struct FixedSolver {
        answer: Vec<f64>,
        trials: Vec<Vec<f64>>,
    }

    impl LeastSquaresSolver for FixedSolver {
        fn minimize(&self, residual: &mut ResidualFn<'_>, _initial: &[f64]) -> Result<SolverReport> {
            for p in &self.trials {
                residual(p)?;
            }
            Ok(SolverReport {
                params: self.answer.clone(),
                converged: true,
                termination: Termination::Unspecified,
                iterations: 1,
                evaluations: self.trials.len(),
                sse: 0.0,
            })
        }
    }

    /// Evaluates a few trial vectors, then gives up with a solver error.
    struct FailingSolver {
        trials: Vec<Vec<f64>>,
    }

    impl LeastSquaresSolver for FailingSolver {
        fn minimize(&self, residual: &mut ResidualFn<'_>, _initial: &[f64]) -> Result<SolverReport> {
            for p in &self.trials {
                residual(p)?;
            }
            Err(SasError::Solver("diverged".into()))
        }
    }

    fn live_guinier(params: &ParameterSet) -> LiveModel<impl Fn(&[f64]) -> Result<Vec<f64>>> {
        let cells: Vec<_> = params.iter().cloned().collect();
        LiveModel::new("guinier", params, move |q: &[f64]| {
            guinier(q, &[cells[0].value(), cells[1].value(), cells[2].value()])
        })
        .with_canonical(|p: &mut [f64]| Guinier.canonicalize(p))
    }

    #[test]
    fn recovers_guinier_parameters_from_exact_data() {
        let (q, i) = synthetic();
        let out = fit(&Guinier, &[1.0, 1.0, 0.0], &q, &i, &LevenbergMarquardt::default()).unwrap();

        assert!(out.converged, "{:?}", out.termination);
        assert_abs_diff_eq!(out.value("i0").unwrap(), 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(out.value("rg").unwrap(), 20.0, epsilon = 1e-4);
        assert_abs_diff_eq!(out.value("background").unwrap(), 2.0, epsilon = 1e-4);
        assert!(out.sse < 1e-12);
        assert_eq!(out.n_points, 100);
        for (f, obs) in out.fitted.iter().zip(&i) {
            assert_abs_diff_eq!(*f, *obs, epsilon = 1e-6);
        }
    }

    #[test]
    fn live_cells_converge_to_the_same_answer() {
        let (q, i) = synthetic();
        let params = ParameterSet::from_pairs(&[("i0", 1.0), ("rg", 1.0), ("background", 0.0)]);
        let model = live_guinier(&params);

        let out = fit_parameters(&model, &params, &q, &i, &LevenbergMarquardt::default()).unwrap();
        assert_abs_diff_eq!(params.get("i0").unwrap().value(), 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(params.get("rg").unwrap().value(), 20.0, epsilon = 1e-4);
        assert_abs_diff_eq!(params.get("background").unwrap().value(), 2.0, epsilon = 1e-4);
        assert_eq!(params.values(), out.params);
    }

    #[test]
    fn best_vector_is_rebound_after_trial_evaluations() {
        let q = [0.0, 0.1, 0.2];
        let i = [3.0, 3.0, 3.0];
        let params = ParameterSet::from_pairs(&[("c", 0.0)]);
        let c = params.get("c").unwrap().clone();
        let seen = RefCell::new(Vec::new());
        let model = LiveModel::new("constant", &params, |q: &[f64]| {
            seen.borrow_mut().push(c.value());
            Ok(vec![c.value(); q.len()])
        });
        let solver = FixedSolver {
            answer: vec![3.0],
            trials: vec![vec![1.0], vec![7.0]],
        };

        let out = fit_parameters(&model, &params, &q, &i, &solver).unwrap();
        // The model saw each trial vector through the cells.
        assert_eq!(&seen.borrow()[..2], &[1.0, 7.0]);
        assert_eq!(params.values(), vec![3.0]);
        assert_eq!(out.params, vec![3.0]);
        assert_abs_diff_eq!(out.sse, 0.0);
    }

    #[test]
    fn failed_fit_leaves_the_last_evaluated_vector_in_the_cells() {
        let q = [0.0, 0.1, 0.2];
        let i = [3.0, 3.0, 3.0];
        let params = ParameterSet::from_pairs(&[("c", 0.0)]);
        let c = params.get("c").unwrap().clone();
        let model = LiveModel::new("constant", &params, |q: &[f64]| Ok(vec![c.value(); q.len()]));
        let solver = FailingSolver {
            trials: vec![vec![1.0], vec![7.0]],
        };

        let err = fit_parameters(&model, &params, &q, &i, &solver).unwrap_err();
        assert!(matches!(&err, SasError::Solver(msg) if msg == "diverged"), "{err}");
        assert_eq!(params.values(), vec![7.0]);
    }

    #[test]
    fn guinier_rg_is_reported_positive_on_any_grid() {
        for q in [linear_grid(0.01, 0.1, 50), linear_grid(0.005, 0.2, 200), linear_grid(0.0, 0.15, 100)] {
            let i = guinier(&q, &[5.0, 20.0, 2.0]).unwrap();

            let out = fit(&Guinier, &[1.0, 1.0, 0.0], &q, &i, &LevenbergMarquardt::default()).unwrap();
            assert_abs_diff_eq!(out.value("rg").unwrap(), 20.0, epsilon = 1e-4);

            let params = ParameterSet::from_pairs(&[("i0", 1.0), ("rg", 1.0), ("background", 0.0)]);
            let model = live_guinier(&params);
            let out = fit_parameters(&model, &params, &q, &i, &LevenbergMarquardt::default()).unwrap();
            assert_abs_diff_eq!(out.value("rg").unwrap(), 20.0, epsilon = 1e-4);
            assert_abs_diff_eq!(params.get("rg").unwrap().value(), 20.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn negative_rg_from_the_solver_is_canonicalized_before_rebinding() {
        let (q, i) = synthetic();
        let solver = FixedSolver {
            answer: vec![5.0, -20.0, 2.0],
            trials: vec![vec![5.0, -20.0, 2.0]],
        };

        let out = fit(&Guinier, &[1.0, 1.0, 0.0], &q, &i, &solver).unwrap();
        assert_eq!(out.params, vec![5.0, 20.0, 2.0]);

        let params = ParameterSet::from_pairs(&[("i0", 1.0), ("rg", 1.0), ("background", 0.0)]);
        let model = live_guinier(&params);
        let out = fit_parameters(&model, &params, &q, &i, &solver).unwrap();
        assert_eq!(out.params, vec![5.0, 20.0, 2.0]);
        assert_eq!(params.values(), vec![5.0, 20.0, 2.0]);
        assert!(out.sse < 1e-20);
    }

    #[test]
    fn non_finite_model_output_is_a_model_error() {
        let model = ModelFn::new("bad", &["a"], |q: &[f64], _p: &[f64]| Ok(vec![f64::NAN; q.len()]));
        let err = fit(&model, &[1.0], &[0.1, 0.2], &[1.0, 1.0], &LevenbergMarquardt::default())
            .unwrap_err();
        assert!(matches!(err, SasError::ModelEvaluation(_)), "{err}");
    }

    #[test]
    fn rejects_bad_inputs_before_solving() {
        let solver = LevenbergMarquardt::default();
        assert!(matches!(
            fit(&Guinier, &[1.0, 1.0, 0.0], &[0.1, 0.2], &[1.0], &solver),
            Err(SasError::Shape { .. })
        ));
        assert!(matches!(
            fit(&Guinier, &[1.0, 1.0, 0.0], &[], &[], &solver),
            Err(SasError::EmptyInput(_))
        ));
        assert!(matches!(
            fit(&Guinier, &[1.0, 1.0], &[0.1], &[1.0], &solver),
            Err(SasError::Arity { expected: 3, got: 2, .. })
        ));
    }

    #[test]
    fn standard_errors_need_spare_degrees_of_freedom() {
        let q = [0.01, 0.02, 0.03];
        let i = guinier(&q, &[5.0, 20.0, 2.0]).unwrap();
        let out = fit(&Guinier, &[5.0, 20.0, 2.0], &q, &i, &LevenbergMarquardt::default()).unwrap();
        assert!(out.std_errors.is_none());
    }
}
