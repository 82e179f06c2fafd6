//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging
//! - loads, masks and fits curves
//! - prints reports
//! - writes optional exports

use clap::Parser;
use log::LevelFilter;

use crate::cli::{BatchArgs, Cli, CombineArgs, Command, FitArgs, FitOptions, MaskArgs, ShowArgs, SynthArgs};
use crate::data::{SampleSpec, generate_sample};
use crate::domain::{FitConfig, SolverSettings};
use crate::error::AppError;
use crate::io::{LoadOptions, load_dataset, read_fit_record, write_dataset_csv};
use crate::mask::Maskable;
use crate::report::{RunContext, format_batch_line, format_fit_summary, format_record};

pub mod pipeline;

/// Entry point for the `sas` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Mask(args) => handle_mask(args),
        Command::Combine(args) => handle_combine(args),
        Command::Synth(args) => handle_synth(args),
        Command::Show(args) => handle_show(args),
    }
}

/// `warn` by default, raised one level per `-v`; `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&args.input, &config)?;

    let loaded = run
        .loaded
        .stats()
        .ok_or_else(|| AppError::new(3, "No data points loaded."))?;
    let source = run.source.display().to_string();
    let ctx = RunContext {
        source: &source,
        model: config.model,
        loaded,
        fitted_points: run.fitted.len(),
        keep: &config.keep,
    };
    println!("{}", format_fit_summary(&ctx, &run.outcome));

    if !run.outcome.converged {
        eprintln!(
            "warning: fit did not converge ({}); parameters are best-effort.",
            run.outcome.termination.describe()
        );
    }
    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let config = fit_config_from_options(&args.options);
    let results = pipeline::run_batch(&args.inputs, &config);

    for r in &results {
        println!("{}", format_batch_line(r));
    }

    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    if failed == results.len() {
        return Err(AppError::new(4, format!("All {failed} fits failed.")));
    }
    if failed > 0 {
        log::warn!("{failed} of {} fits failed", results.len());
    }
    Ok(())
}

fn handle_mask(args: MaskArgs) -> Result<(), AppError> {
    let options = LoadOptions {
        skip_rows: args.skip_rows,
    };
    let data = load_dataset(&args.input, &options)?;
    let masked = data.mask_ranges(&args.keep)?;
    log::info!("kept {} of {} points", masked.len(), data.len());
    write_dataset_csv(&args.out, &masked)?;
    println!("Wrote {} points to {}", masked.len(), args.out.display());
    Ok(())
}

fn handle_combine(args: CombineArgs) -> Result<(), AppError> {
    let options = LoadOptions {
        skip_rows: args.skip_rows,
    };
    let mut data = load_dataset(&args.input, &options)?;
    for path in &args.add {
        let other = load_dataset(path, &options)?;
        data = (&data + &other)?;
    }
    if let Some(offset) = args.offset {
        data = (&data + offset)?;
    }
    if let Some(scale) = args.scale {
        data = (&data * scale)?;
    }
    write_dataset_csv(&args.out, &data)?;
    println!("Wrote {} points to {}", data.len(), args.out.display());
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SampleSpec {
        i0: args.i0,
        rg: args.rg,
        background: args.background,
        q_min: args.q_min,
        q_max: args.q_max,
        points: args.points,
        noise: args.noise,
        seed: args.seed,
    };
    let data = generate_sample(&spec)?;
    write_dataset_csv(&args.out, &data)?;
    println!("Wrote {} points to {}", data.len(), args.out.display());
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let record = read_fit_record(&args.record)?;
    println!("{}", format_record(&record));
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        export_fit_csv: args.export.clone(),
        export_record: args.export_fit.clone(),
        ..fit_config_from_options(&args.options)
    }
}

pub fn fit_config_from_options(options: &FitOptions) -> FitConfig {
    FitConfig {
        skip_rows: options.skip_rows,
        keep: options.keep.clone(),
        model: options.model,
        i0: options.i0,
        rg: options.rg,
        background: options.background,
        solver: SolverSettings {
            max_iterations: options.max_iter,
            max_evaluations: options.max_eval,
            tolerance: options.tol,
        },
        export_fit_csv: None,
        export_record: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_fit_flags() {
        let cli = Cli::try_parse_from([
            "sas", "fit", "a.dat", "--keep", "0:0.1", "--i0", "3", "--max-iter", "50", "--export-fit",
            "out.json",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.keep.len(), 1);
        assert_eq!(config.i0, Some(3.0));
        assert_eq!(config.rg, None);
        assert_eq!(config.solver.max_iterations, 50);
        assert_eq!(config.export_record.as_deref(), Some(std::path::Path::new("out.json")));
        assert!(config.export_fit_csv.is_none());
    }
}
