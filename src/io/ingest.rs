//! Scattering-curve ingest.
//!
//! Turns a two-column `(Q, I)` file into a [`Dataset`] that is safe to mask and
//! fit.
//!
//! Design goals:
//! - **Format by extension**: `.csv` (comma separated), `.json` (serialized
//!   dataset), anything else is whitespace separated columns
//! - **Strict rows**: a malformed row is an error that names its line
//! - **Lenient values**: rows carrying NaN/inf are skipped with a warning
//! - **Separation of concerns**: no masking or fitting logic here

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::data::Dataset;
use crate::error::{Result, SasError};

/// Loader knobs shared by all text formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Header lines to drop before parsing (lab `.dat` files carry 3).
    pub skip_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
    Columns,
}

impl Format {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Format::Csv,
            Some("json") => Format::Json,
            _ => Format::Columns,
        }
    }
}

/// Load a dataset, choosing the parser from the file extension.
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let data: Dataset = match Format::from_path(path) {
        Format::Json => {
            let file = File::open(path)
                .map_err(|e| SasError::io(format!("Failed to open '{}'", path.display()), e))?;
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                SasError::Parse(format!("Invalid dataset JSON '{}': {e}", path.display()))
            })?
        }
        format => {
            let text = fs::read_to_string(path)
                .map_err(|e| SasError::io(format!("Failed to read '{}'", path.display()), e))?;
            if format == Format::Csv {
                parse_csv(&text, options)?
            } else {
                parse_columns(&text, options)?
            }
        }
    };

    if data.is_empty() {
        return Err(SasError::EmptyInput("no usable data rows"));
    }
    log::info!("loaded {} points from {}", data.len(), path.display());
    Ok(data)
}

/// Whitespace separated columns; the first two are `Q` and `I`.
pub fn parse_columns(text: &str, options: &LoadOptions) -> Result<Dataset> {
    let mut points = Points::default();
    for (idx, raw) in text.lines().enumerate().skip(options.skip_rows) {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        points.push_row(line.split_whitespace(), idx + 1)?;
    }
    points.finish()
}

/// Comma separated columns; the first two are `Q` and `I`.
pub fn parse_csv(text: &str, options: &LoadOptions) -> Result<Dataset> {
    // Header lines are dropped up front so they never reach the CSV parser.
    let body: String = text
        .lines()
        .skip(options.skip_rows)
        .flat_map(|l| [l, "\n"])
        .collect();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut points = Points::default();
    for result in reader.records() {
        let record = result.map_err(|e| SasError::Parse(format!("CSV parse error: {e}")))?;
        let line = record
            .position()
            .map(|p| p.line() as usize + options.skip_rows)
            .unwrap_or(0);
        if record.iter().all(str::is_empty) {
            continue;
        }
        points.push_row(record.iter(), line)?;
    }
    points.finish()
}

#[derive(Default)]
struct Points {
    q: Vec<f64>,
    i: Vec<f64>,
    skipped: usize,
}

impl Points {
    fn push_row<'a>(&mut self, mut fields: impl Iterator<Item = &'a str>, line: usize) -> Result<()> {
        let (Some(q), Some(i)) = (fields.next(), fields.next()) else {
            return Err(SasError::Parse(format!(
                "Line {line}: expected at least two columns (Q, I)."
            )));
        };
        let q = parse_value(q, "Q", line)?;
        let i = parse_value(i, "I", line)?;

        if q.is_finite() && i.is_finite() {
            self.q.push(q);
            self.i.push(i);
        } else {
            log::warn!("line {line}: skipping non-finite point (q={q}, i={i})");
            self.skipped += 1;
        }
        Ok(())
    }

    fn finish(self) -> Result<Dataset> {
        if self.skipped > 0 {
            log::warn!("skipped {} non-finite rows", self.skipped);
        }
        Dataset::new(self.q, self.i)
    }
}

fn parse_value(field: &str, column: &str, line: usize) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| SasError::Parse(format!("Line {line}: invalid {column} value '{field}'.")))
}
