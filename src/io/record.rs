//! Read/write fit record JSON files.
//!
//! A fit record is the portable representation of a finished fit:
//! - model kind + named parameters (with standard errors when available)
//! - quality and convergence diagnostics
//! - the keep ranges used for masking
//! - a precomputed fitted grid for quick plotting
//!
//! The schema is defined by `domain::FitRecord`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{SubsecRound, Utc};

use crate::data::{Dataset, linear_grid};
use crate::domain::{CurveGrid, FitQuality, FitRecord, Interval, ModelKind, NamedValue};
use crate::error::{Result, SasError};
use crate::fit::FitOutcome;
use crate::models::model_for;

const GRID_POINTS: usize = 101;

/// Assemble a record for a fit of `data`.
pub fn build_fit_record(
    source: Option<&Path>,
    model: ModelKind,
    outcome: &FitOutcome,
    data: &Dataset,
    keep: &[Interval],
) -> Result<FitRecord> {
    let stats = data
        .stats()
        .ok_or(SasError::EmptyInput("no data points to sample the fitted curve over"))?;
    let q = linear_grid(stats.q_min, stats.q_max, GRID_POINTS);
    let i = model_for(model).evaluate(&q, &outcome.params)?;

    let parameters = outcome
        .names
        .iter()
        .zip(&outcome.params)
        .enumerate()
        .map(|(j, (name, value))| NamedValue {
            name: name.clone(),
            value: *value,
            std_error: outcome.std_errors.as_ref().and_then(|e| e.get(j).copied()),
        })
        .collect();

    Ok(FitRecord {
        tool: "sas".to_string(),
        generated: Utc::now().trunc_subsecs(0),
        source: source.map(Path::to_path_buf),
        model,
        parameters,
        quality: FitQuality {
            sse: outcome.sse,
            rmse: outcome.rmse,
            n: outcome.n_points,
        },
        converged: outcome.converged,
        termination: outcome.termination.describe().to_string(),
        iterations: outcome.iterations,
        evaluations: outcome.evaluations,
        keep: keep.to_vec(),
        grid: CurveGrid { q, i },
    })
}

/// Write a fit record JSON file.
pub fn write_fit_record(path: &Path, record: &FitRecord) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| SasError::io(format!("Failed to create fit record '{}'", path.display()), e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), record)
        .map_err(|e| SasError::Parse(format!("Failed to write fit record JSON: {e}")))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Read a fit record JSON file.
pub fn read_fit_record(path: &Path) -> Result<FitRecord> {
    let file = File::open(path)
        .map_err(|e| SasError::io(format!("Failed to open fit record '{}'", path.display()), e))?;
    serde_json::from_reader(file)
        .map_err(|e| SasError::Parse(format!("Invalid fit record JSON '{}': {e}", path.display())))
}
