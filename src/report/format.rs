//! Formatted terminal output for fits, batches and saved records.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{DatasetStats, FitRecord, Interval, ModelKind};
use crate::fit::{BatchResult, FitOutcome};

/// What the pipeline did before fitting, for the summary header.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    pub source: &'a str,
    pub model: ModelKind,
    pub loaded: DatasetStats,
    /// Points left after masking (equal to `loaded.n_points` without ranges).
    pub fitted_points: usize,
    pub keep: &'a [Interval],
}

/// Format the full run summary (dataset stats + fit diagnostics + parameters).
pub fn format_fit_summary(ctx: &RunContext<'_>, outcome: &FitOutcome) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== sas - {} fit ===\n", ctx.model.display_name()));
    out.push_str(&format!("Source: {}\n", ctx.source));
    out.push_str(&format!(
        "Points: n={} | q=[{:.4e}, {:.4e}] | i=[{:.4e}, {:.4e}]\n",
        ctx.loaded.n_points, ctx.loaded.q_min, ctx.loaded.q_max, ctx.loaded.i_min, ctx.loaded.i_max
    ));
    if !ctx.keep.is_empty() {
        out.push_str(&format!(
            "Mask: keep {} -> {} points\n",
            fmt_ranges(ctx.keep),
            ctx.fitted_points
        ));
    }

    out.push_str("\nDiagnostics:\n");
    out.push_str(&format!(
        "- {} after {} iterations ({} evaluations): {}\n",
        if outcome.converged { "converged" } else { "NOT converged" },
        outcome.iterations,
        outcome.evaluations,
        outcome.termination.describe()
    ));
    out.push_str(&format!(
        "- SSE={:.6e} RMSE={:.6e} n={}\n",
        outcome.sse, outcome.rmse, outcome.n_points
    ));

    out.push_str("\nParameters:\n");
    let errors = outcome.std_errors.as_deref();
    let rows: Vec<(&str, f64, Option<f64>)> = outcome
        .names
        .iter()
        .zip(&outcome.params)
        .enumerate()
        .map(|(j, (n, v))| (n.as_str(), *v, errors.and_then(|e| e.get(j).copied())))
        .collect();
    out.push_str(&format_parameter_table(&rows));

    out
}

/// One line per batch entry: label, status and fitted parameters.
pub fn format_batch_line(result: &BatchResult) -> String {
    match &result.outcome {
        Ok(o) => {
            let params: Vec<String> = o
                .names
                .iter()
                .zip(&o.params)
                .map(|(n, v)| format!("{n}={v:.6}"))
                .collect();
            format!(
                "{:<32} {:<5} {} rmse={:.4e}",
                truncate(&result.label, 32),
                if o.converged { "ok" } else { "warn" },
                params.join(" "),
                o.rmse
            )
        }
        Err(e) => format!("{:<32} {:<5} {e}", truncate(&result.label, 32), "error"),
    }
}

/// Format a saved fit record for `sas show`.
pub fn format_record(record: &FitRecord) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== {} fit record ({}) ===\n",
        record.model.display_name(),
        record.tool
    ));
    out.push_str(&format!("Generated: {}\n", record.generated.to_rfc3339()));
    if let Some(src) = &record.source {
        out.push_str(&format!("Source: {}\n", src.display()));
    }
    if !record.keep.is_empty() {
        out.push_str(&format!("Mask: keep {}\n", fmt_ranges(&record.keep)));
    }
    out.push_str(&format!(
        "Fit: {} ({}), {} iterations, {} evaluations\n",
        if record.converged { "converged" } else { "NOT converged" },
        record.termination,
        record.iterations,
        record.evaluations
    ));
    out.push_str(&format!(
        "Quality: SSE={:.6e} RMSE={:.6e} n={}\n",
        record.quality.sse, record.quality.rmse, record.quality.n
    ));

    out.push_str("\nParameters:\n");
    let rows: Vec<(&str, f64, Option<f64>)> = record
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.value, p.std_error))
        .collect();
    out.push_str(&format_parameter_table(&rows));

    if let (Some(q0), Some(q1)) = (record.grid.q.first(), record.grid.q.last()) {
        out.push_str(&format!(
            "\nGrid: {} points over q=[{q0:.4e}, {q1:.4e}]\n",
            record.grid.q.len()
        ));
    }

    out
}

fn format_parameter_table(rows: &[(&str, f64, Option<f64>)]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:>16} {:>16}", "name", "value", "std_error").trim_end());
    out.push('\n');
    out.push_str(&format!("{:-<12} {:-<16} {:-<16}\n", "", "", ""));

    for (name, value, err) in rows {
        let err = err.map(|e| format!("{e:.6e}")).unwrap_or_else(|| "-".to_string());
        out.push_str(format!("{:<12} {:>16.8} {:>16}", truncate(name, 12), value, err).trim_end());
        out.push('\n');
    }

    out
}

fn fmt_ranges(keep: &[Interval]) -> String {
    let parts: Vec<String> = keep.iter().map(Interval::to_string).collect();
    parts.join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
