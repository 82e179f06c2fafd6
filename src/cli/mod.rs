//! Command-line parsing for the small-angle scattering toolkit.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{Interval, ModelKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sas", version, about = "Small-angle scattering curve toolkit")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a curve, mask it, fit a model and print diagnostics.
    Fit(FitArgs),
    /// Fit many curves independently (in parallel), one summary line each.
    Batch(BatchArgs),
    /// Write the masked subset of a curve.
    Mask(MaskArgs),
    /// Add curves on the same Q grid, then offset and scale the intensity.
    Combine(CombineArgs),
    /// Write a synthetic Guinier curve.
    Synth(SynthArgs),
    /// Print a fit record saved by `sas fit --export-fit`.
    Show(ShowArgs),
}

/// Options shared by `fit` and `batch`.
#[derive(Debug, Args, Clone)]
pub struct FitOptions {
    /// Header lines to skip before the data columns.
    #[arg(long, default_value_t = 0)]
    pub skip_rows: usize,

    /// Q range to keep, as LOW:HIGH (repeatable; ranges are unioned).
    #[arg(long, value_name = "LOW:HIGH")]
    pub keep: Vec<Interval>,

    /// Model to fit.
    #[arg(long, value_enum, default_value_t = ModelKind::Guinier)]
    pub model: ModelKind,

    /// Initial forward intensity (default: max(I) - min(I)).
    #[arg(long)]
    pub i0: Option<f64>,

    /// Initial radius of gyration (default: 1 / median(Q)).
    #[arg(long)]
    pub rg: Option<f64>,

    /// Initial flat background (default: min(I)).
    #[arg(long)]
    pub background: Option<f64>,

    /// Solver iteration limit.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Solver residual-evaluation limit.
    #[arg(long, default_value_t = 5_000)]
    pub max_eval: usize,

    /// Relative convergence tolerance.
    #[arg(long, default_value_t = 1e-12)]
    pub tol: f64,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Input curve (.csv, .json, or whitespace columns).
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    #[command(flatten)]
    pub options: FitOptions,

    /// Export observed/fitted/residual columns to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the fit record (parameters + diagnostics + fitted grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Input curves.
    #[arg(value_name = "FILES", required = true)]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub options: FitOptions,
}

#[derive(Debug, Args)]
pub struct MaskArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    #[arg(long, default_value_t = 0)]
    pub skip_rows: usize,

    /// Q range to keep, as LOW:HIGH (repeatable).
    #[arg(long, value_name = "LOW:HIGH", required = true)]
    pub keep: Vec<Interval>,

    /// Output CSV.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct CombineArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Curve to add point-by-point (repeatable; must share the Q grid).
    #[arg(long, value_name = "FILE")]
    pub add: Vec<PathBuf>,

    /// Constant added to every intensity.
    #[arg(long, allow_negative_numbers = true)]
    pub offset: Option<f64>,

    /// Factor applied to every intensity (after the offset).
    #[arg(long, allow_negative_numbers = true)]
    pub scale: Option<f64>,

    #[arg(long, default_value_t = 0)]
    pub skip_rows: usize,

    /// Output CSV.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct SynthArgs {
    /// Output CSV.
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, default_value_t = 5.0)]
    pub i0: f64,

    #[arg(long, default_value_t = 20.0)]
    pub rg: f64,

    #[arg(long, default_value_t = 2.0)]
    pub background: f64,

    #[arg(long, default_value_t = 0.0)]
    pub q_min: f64,

    #[arg(long, default_value_t = 0.15)]
    pub q_max: f64,

    #[arg(long, default_value_t = 100)]
    pub points: usize,

    /// Relative Gaussian noise level (0 = exact curve).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Fit record JSON produced by `sas fit --export-fit`.
    #[arg(value_name = "JSON")]
    pub record: PathBuf,
}
