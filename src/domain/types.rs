//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during masking and fitting
//! - exported to JSON/CSV
//! - reloaded later for inspection

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SasError};

/// A closed interval `[low, high]` on the Q axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub low: f64,
    pub high: f64,
}

impl Interval {
    /// Build a validated interval: both bounds finite and `low <= high`.
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let interval = Interval { low, high };
        interval.validate()?;
        Ok(interval)
    }

    pub fn validate(&self) -> Result<()> {
        if self.low.is_finite() && self.high.is_finite() && self.low <= self.high {
            Ok(())
        } else {
            Err(SasError::InvalidInterval {
                low: self.low,
                high: self.high,
            })
        }
    }

    pub fn contains(&self, q: f64) -> bool {
        self.low <= q && q <= self.high
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// Parses `"low:high"`, the form used on the command line.
impl FromStr for Interval {
    type Err = SasError;

    fn from_str(s: &str) -> Result<Self> {
        let (low, high) = s
            .split_once(':')
            .ok_or_else(|| SasError::Parse(format!("Invalid range '{s}'. Expected LOW:HIGH.")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| SasError::Parse(format!("Invalid range bound '{v}' in '{s}'.")))
        };
        Interval::new(parse(low)?, parse(high)?)
    }
}

/// Which physical model to fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// `I(Q) = i0 * exp(-Rg² Q² / 3) + background`.
    #[default]
    Guinier,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Guinier => "Guinier",
        }
    }
}

/// Summary stats about a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n_points: usize,
    pub q_min: f64,
    pub q_max: f64,
    pub i_min: f64,
    pub i_max: f64,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
}

/// A fitted parameter value with its (optional) standard error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
    pub std_error: Option<f64>,
}

/// Fitted curve sampled over the data's Q-range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub q: Vec<f64>,
    pub i: Vec<f64>,
}

/// A saved fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitRecord {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub source: Option<PathBuf>,
    pub model: ModelKind,
    pub parameters: Vec<NamedValue>,
    pub quality: FitQuality,
    pub converged: bool,
    pub termination: String,
    pub iterations: usize,
    pub evaluations: usize,
    pub keep: Vec<Interval>,
    pub grid: CurveGrid,
}

/// Solver settings exposed to the CLI.
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    pub max_iterations: usize,
    pub max_evaluations: usize,
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            max_evaluations: 5_000,
            tolerance: 1e-12,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub skip_rows: usize,
    pub keep: Vec<Interval>,
    pub model: ModelKind,

    /// Initial guesses; `None` means "derive from the data".
    pub i0: Option<f64>,
    pub rg: Option<f64>,
    pub background: Option<f64>,

    pub solver: SolverSettings,

    pub export_fit_csv: Option<PathBuf>,
    pub export_record: Option<PathBuf>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            skip_rows: 0,
            keep: Vec::new(),
            model: ModelKind::Guinier,
            i0: None,
            rg: None,
            background: None,
            solver: SolverSettings::default(),
            export_fit_csv: None,
            export_record: None,
        }
    }
}
