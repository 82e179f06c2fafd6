//! Independent fits over many datasets.
//!
//! Each job owns its model, starting vector and (optionally) mask, so jobs share
//! nothing mutable and can run in parallel. Results come back in input order.

use rayon::prelude::*;

use crate::data::Dataset;
use crate::domain::{Interval, ModelKind};
use crate::error::Result;
use crate::fit::harness::{FitOutcome, fit};
use crate::fit::solver::LeastSquaresSolver;
use crate::mask::Maskable;
use crate::models::{GuessOverrides, initial_guess, model_for};

/// One curve to fit. A job whose data failed to load is carried through so it
/// still gets a result row.
#[derive(Debug)]
pub struct BatchJob {
    pub label: String,
    pub data: Result<Dataset>,
}

impl BatchJob {
    pub fn new(label: impl Into<String>, data: Dataset) -> Self {
        Self {
            label: label.into(),
            data: Ok(data),
        }
    }
}

#[derive(Debug)]
pub struct BatchResult {
    pub label: String,
    /// Points actually fitted (after masking).
    pub data: Option<Dataset>,
    pub outcome: Result<FitOutcome>,
}

/// Shared settings applied to every job.
#[derive(Debug, Clone, Default)]
pub struct BatchSettings {
    pub model: ModelKind,
    pub keep: Vec<Interval>,
    pub guess: GuessOverrides,
}

/// Fit every job; a failing job does not stop the others.
pub fn fit_batch<S>(jobs: Vec<BatchJob>, settings: &BatchSettings, solver: &S) -> Vec<BatchResult>
where
    S: LeastSquaresSolver + Sync + ?Sized,
{
    jobs.into_par_iter()
        .map(|job| run_job(job, settings, solver))
        .collect()
}

fn run_job<S>(job: BatchJob, settings: &BatchSettings, solver: &S) -> BatchResult
where
    S: LeastSquaresSolver + ?Sized,
{
    let BatchJob { label, data } = job;
    let (data, outcome) = match data.and_then(|d| prepare(d, settings)) {
        Ok(d) => {
            let outcome = fit_one(&d, settings, solver);
            (Some(d), outcome)
        }
        Err(e) => (None, Err(e)),
    };
    if let Err(e) = &outcome {
        log::warn!("{label}: {e}");
    }
    BatchResult {
        label,
        data,
        outcome,
    }
}

fn prepare(data: Dataset, settings: &BatchSettings) -> Result<Dataset> {
    if settings.keep.is_empty() {
        return Ok(data);
    }
    data.mask_ranges(&settings.keep)
}

fn fit_one<S>(data: &Dataset, settings: &BatchSettings, solver: &S) -> Result<FitOutcome>
where
    S: LeastSquaresSolver + ?Sized,
{
    let model = model_for(settings.model);
    let initial = initial_guess(settings.model, data, &settings.guess)?;
    fit(model.as_ref(), &initial, data.q(), data.i(), solver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleSpec, generate_sample};
    use crate::error::SasError;
    use crate::fit::solver::LevenbergMarquardt;

    fn synthetic(rg: f64) -> Dataset {
        generate_sample(&SampleSpec {
            rg,
            ..SampleSpec::default()
        })
        .unwrap()
    }

    #[test]
    fn results_keep_input_order_and_isolate_failures() {
        let jobs = vec![
            BatchJob::new("a", synthetic(15.0)),
            BatchJob::new("empty", Dataset::new(vec![], vec![]).unwrap()),
            BatchJob {
                label: "unreadable".into(),
                data: Err(SasError::Parse("Line 4: invalid Q value 'x'.".into())),
            },
            BatchJob::new("b", synthetic(25.0)),
        ];
        let results = fit_batch(jobs, &BatchSettings::default(), &LevenbergMarquardt::default());

        let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "empty", "unreadable", "b"]);
        assert!(matches!(results[1].outcome, Err(SasError::EmptyInput(_))));
        assert!(matches!(results[2].outcome, Err(SasError::Parse(_))));
        assert!(results[2].data.is_none());

        let rg_a = results[0].outcome.as_ref().unwrap().value("rg").unwrap();
        let rg_b = results[3].outcome.as_ref().unwrap().value("rg").unwrap();
        assert!((rg_a - 15.0).abs() < 1e-4, "rg_a = {rg_a}");
        assert!((rg_b - 25.0).abs() < 1e-4, "rg_b = {rg_b}");
    }

    #[test]
    fn masks_each_job_before_fitting() {
        let jobs = vec![BatchJob::new("masked", synthetic(20.0))];
        let settings = BatchSettings {
            keep: vec![Interval::new(0.0, 0.05).unwrap()],
            ..BatchSettings::default()
        };
        let results = fit_batch(jobs, &settings, &LevenbergMarquardt::default());
        let data = results[0].data.as_ref().unwrap();
        assert!(data.q().iter().all(|&q| q <= 0.05));
        assert_eq!(results[0].outcome.as_ref().unwrap().n_points, data.len());
    }
}
