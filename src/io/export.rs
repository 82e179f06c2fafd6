//! CSV exports.
//!
//! Plain comma separated files with a header row, meant to be easy to consume
//! in spreadsheets or plotting scripts.

use std::path::Path;

use csv::Writer;

use crate::data::Dataset;
use crate::error::{Result, SasError};

/// Write `q,i` rows.
pub fn write_dataset_csv(path: &Path, data: &Dataset) -> Result<()> {
    let mut w = create(path)?;
    w.write_record(["q", "i"]).map_err(|e| csv_err(path, e))?;
    for (q, i) in data.points() {
        w.write_record([fmt(q), fmt(i)]).map_err(|e| csv_err(path, e))?;
    }
    flush(path, w)
}

/// Write `q,i_obs,i_fit,residual` rows for a fitted dataset.
pub fn write_fit_csv(path: &Path, data: &Dataset, fitted: &[f64]) -> Result<()> {
    if fitted.len() != data.len() {
        return Err(SasError::Shape {
            what: "fitted curve and dataset",
            left: fitted.len(),
            right: data.len(),
        });
    }

    let mut w = create(path)?;
    w.write_record(["q", "i_obs", "i_fit", "residual"])
        .map_err(|e| csv_err(path, e))?;
    for ((q, i), f) in data.points().zip(fitted) {
        w.write_record([fmt(q), fmt(i), fmt(*f), fmt(i - f)])
            .map_err(|e| csv_err(path, e))?;
    }
    flush(path, w)
}

fn fmt(v: f64) -> String {
    format!("{v:.10e}")
}

fn create(path: &Path) -> Result<Writer<std::fs::File>> {
    Writer::from_path(path).map_err(|e| csv_err(path, e))
}

fn flush(path: &Path, mut w: Writer<std::fs::File>) -> Result<()> {
    w.flush()
        .map_err(|e| SasError::io(format!("Failed to write '{}'", path.display()), e))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn csv_err(path: &Path, e: csv::Error) -> SasError {
    SasError::Parse(format!("Failed to write CSV '{}': {e}", path.display()))
}
