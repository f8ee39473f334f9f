//! Reporting utilities: quote residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{CurveParameters, Quote};
use crate::error::AppError;
use crate::models::evaluate;

/// One quote against the fitted curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteResidual {
    pub quote: Quote,
    pub y_fit: f64,
    /// `observed − fitted`, in percentage points.
    pub residual: f64,
}

/// Compute fitted values and residuals for each quote.
pub fn compute_residuals(quotes: &[Quote], params: &CurveParameters) -> Result<Vec<QuoteResidual>, AppError> {
    let mut out = Vec::with_capacity(quotes.len());
    for q in quotes {
        let y_fit = evaluate(q.maturity_years, params);
        if !y_fit.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(QuoteResidual {
            quote: *q,
            y_fit,
            residual: q.yield_percent - y_fit,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_residuals_basic() {
        let flat = CurveParameters {
            beta0: 10.0,
            beta1: 0.0,
            beta2: 0.0,
            beta3: 0.0,
            tau1: 1.0,
            tau2: 5.0,
        };
        let quotes = [Quote::new(1.0, 10.0), Quote::new(2.0, 11.0)];
        let residuals = compute_residuals(&quotes, &flat).unwrap();
        assert_eq!(residuals.len(), 2);
        assert!(residuals[0].residual.abs() < 1e-12);
        assert!((residuals[1].residual - 1.0).abs() < 1e-12);
    }
}
