//! Error types.
//!
//! - [`SasError`]: typed failures raised by the library (datasets, masking,
//!   models, the fit harness, IO).
//! - [`AppError`]: what the `sas` binary reports; an exit code plus a message.
//!
//! Every `SasError` converts into an `AppError` so orchestration code can use
//! `?` across the boundary.

use thiserror::Error;

/// Library result alias.
pub type Result<T> = std::result::Result<T, SasError>;

#[derive(Debug, Error)]
pub enum SasError {
    /// Two sequences that must be index-aligned have different lengths.
    #[error("shape mismatch: {what} ({left} vs {right})")]
    Shape {
        what: &'static str,
        left: usize,
        right: usize,
    },

    /// Two datasets are not sampled on the same Q-grid.
    #[error("datasets are on different Q-grids: {0}")]
    DomainMismatch(String),

    /// A scalar operand is not a usable number.
    #[error("operand for {op} is not a finite number: {value}")]
    TypeMismatch { op: &'static str, value: f64 },

    /// A model received the wrong number of parameters.
    #[error("{model} expects {expected} parameters, got {got}")]
    Arity {
        model: String,
        expected: usize,
        got: usize,
    },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("no Q intervals given")]
    EmptyIntervalSet,

    #[error("mask has not been built for this selector")]
    EmptyMask,

    #[error("invalid interval [{low}, {high}]")]
    InvalidInterval { low: f64, high: f64 },

    /// The model failed, or produced a non-finite value, for a candidate vector.
    #[error("model evaluation failed: {0}")]
    ModelEvaluation(String),

    #[error("solver failure: {0}")]
    Solver(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Parse(String),
}

impl SasError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SasError::Io {
            context: context.into(),
            source,
        }
    }

    /// Exit code used when this error terminates the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            SasError::EmptyInput(_) | SasError::EmptyIntervalSet | SasError::EmptyMask => 3,
            SasError::Arity { .. } | SasError::ModelEvaluation(_) | SasError::Solver(_) => 4,
            _ => 2,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<SasError> for AppError {
    fn from(err: SasError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sas_errors_map_to_exit_codes() {
        let shape = SasError::Shape {
            what: "q and i",
            left: 2,
            right: 1,
        };
        assert_eq!(AppError::from(shape).exit_code(), 2);
        assert_eq!(AppError::from(SasError::EmptyMask).exit_code(), 3);
        assert_eq!(
            AppError::from(SasError::ModelEvaluation("nan".into())).exit_code(),
            4
        );
    }

    #[test]
    fn app_error_displays_message_only() {
        let err = AppError::from(SasError::EmptyIntervalSet);
        assert_eq!(err.to_string(), "no Q intervals given");
    }
}
