//! Error types.
//!
//! - `CurveError`: typed failures of the curve core (fitting, prediction,
//!   forward rates). Callers and tests match on the variant.
//! - `AppError`: application-level error carrying a process exit code.
//!
//! Exit codes:
//! - `2`: invalid input, configuration or file IO
//! - `3`: no data to work with
//! - `4`: computation, state or network failure

use thiserror::Error;

/// Failures raised by the curve model, optimizer and fitter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("Insufficient quotes: need at least {required}, got {actual}.")]
    InsufficientQuotes { required: usize, actual: usize },

    #[error("Invalid quote at index {index}: maturity={maturity}, yield={yield_percent}.")]
    InvalidQuote {
        index: usize,
        maturity: f64,
        yield_percent: f64,
    },

    #[error("Curve model has not been fitted.")]
    NotFitted,

    #[error("Invalid forward horizon {horizon}: must be finite and > 0.")]
    InvalidHorizon { horizon: f64 },

    #[error("Invalid maturity {maturity}: must be finite and >= 0.")]
    InvalidMaturity { maturity: f64 },

    #[error("Optimizer failure: {0}")]
    Optimizer(String),
}

impl CurveError {
    /// Exit code used when the error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            CurveError::InsufficientQuotes { .. }
            | CurveError::InvalidQuote { .. }
            | CurveError::InvalidHorizon { .. }
            | CurveError::InvalidMaturity { .. } => 2,
            CurveError::NotFitted | CurveError::Optimizer(_) => 4,
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

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CurveError> for AppError {
    fn from(err: CurveError) -> Self {
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
    fn curve_errors_map_to_exit_codes() {
        let input: AppError = CurveError::InvalidHorizon { horizon: 0.0 }.into();
        assert_eq!(input.exit_code(), 2);

        let state: AppError = CurveError::NotFitted.into();
        assert_eq!(state.exit_code(), 4);
        assert_eq!(state.message(), "Curve model has not been fitted.");
    }
}
