//! Shared "fit pipeline" logic used by the `fit` and `batch` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> mask -> fit -> export
//!
//! The command handlers can then focus on presentation.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::data::Dataset;
use crate::domain::FitConfig;
use crate::error::{AppError, Result};
use crate::fit::{BatchJob, BatchResult, BatchSettings, FitOutcome, LevenbergMarquardt, fit, fit_batch};
use crate::io::{LoadOptions, build_fit_record, load_dataset, write_fit_csv, write_fit_record};
use crate::mask::Maskable;
use crate::models::{GuessOverrides, initial_guess, model_for};

/// All computed outputs of a single `sas fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub source: PathBuf,
    /// Everything the loader returned.
    pub loaded: Dataset,
    /// The subset that was fitted (after masking).
    pub fitted: Dataset,
    pub outcome: FitOutcome,
}

pub fn load_options(config: &FitConfig) -> LoadOptions {
    LoadOptions {
        skip_rows: config.skip_rows,
    }
}

pub fn solver_for(config: &FitConfig) -> LevenbergMarquardt {
    LevenbergMarquardt::with_limits(
        config.solver.max_iterations,
        config.solver.max_evaluations,
        config.solver.tolerance,
    )
}

pub fn guess_overrides(config: &FitConfig) -> GuessOverrides {
    GuessOverrides {
        i0: config.i0,
        rg: config.rg,
        background: config.background,
    }
}

/// Execute the full fitting pipeline for one file and write any requested exports.
pub fn run_fit(input: &Path, config: &FitConfig) -> std::result::Result<RunOutput, AppError> {
    let loaded = load_dataset(input, &load_options(config))?;
    let (fitted, outcome) = fit_dataset(&loaded, config)?;

    let run = RunOutput {
        source: input.to_path_buf(),
        loaded,
        fitted,
        outcome,
    };
    write_exports(&run, config)?;
    Ok(run)
}

/// Mask (when ranges are configured) and fit an in-memory dataset.
pub fn fit_dataset(data: &Dataset, config: &FitConfig) -> Result<(Dataset, FitOutcome)> {
    let fitted = if config.keep.is_empty() {
        data.clone()
    } else {
        let masked = data.mask_ranges(&config.keep)?;
        log::info!("masked {} points down to {}", data.len(), masked.len());
        masked
    };

    let model = model_for(config.model);
    let initial = initial_guess(config.model, &fitted, &guess_overrides(config))?;
    log::debug!("initial guess for {}: {initial:?}", model.name());

    let outcome = fit(model.as_ref(), &initial, fitted.q(), fitted.i(), &solver_for(config))?;
    Ok((fitted, outcome))
}

fn write_exports(run: &RunOutput, config: &FitConfig) -> Result<()> {
    if let Some(path) = &config.export_fit_csv {
        write_fit_csv(path, &run.fitted, &run.outcome.fitted)?;
    }
    if let Some(path) = &config.export_record {
        let record = build_fit_record(
            Some(&run.source),
            config.model,
            &run.outcome,
            &run.fitted,
            &config.keep,
        )?;
        write_fit_record(path, &record)?;
    }
    Ok(())
}

/// Load and fit every input independently; results follow input order.
pub fn run_batch(inputs: &[PathBuf], config: &FitConfig) -> Vec<BatchResult> {
    let options = load_options(config);
    let jobs: Vec<BatchJob> = inputs
        .par_iter()
        .map(|path| BatchJob {
            label: path.display().to_string(),
            data: load_dataset(path, &options),
        })
        .collect();

    let settings = BatchSettings {
        model: config.model,
        keep: config.keep.clone(),
        guess: guess_overrides(config),
    };
    fit_batch(jobs, &settings, &solver_for(config))
}
