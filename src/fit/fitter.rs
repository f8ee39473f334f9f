//! Stateful curve fitter.
//!
//! A `CurveFitter` starts unfitted. A successful `fit` stores the calibrated
//! parameters, after which `predict` and `forward_rate` evaluate the curve.
//! A failed `fit` leaves the previous state untouched.

use tracing::info;

use crate::domain::{CurveParameters, FitOutcome, Quote};
use crate::error::CurveError;
use crate::fit::optimizer::CurveFitOptimizer;
use crate::models::{evaluate, evaluate_many};

#[derive(Debug, Clone, Default)]
pub struct CurveFitter {
    optimizer: CurveFitOptimizer,
    params: Option<CurveParameters>,
}

impl CurveFitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fitter holding already calibrated parameters, e.g. from a saved curve.
    pub fn with_params(params: CurveParameters) -> Self {
        Self {
            params: Some(params),
            ..Self::default()
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    pub fn params(&self) -> Option<&CurveParameters> {
        self.params.as_ref()
    }

    /// Calibrate to `quotes` and keep the resulting parameters.
    ///
    /// Quotes are used in the order given; callers that want the level/slope
    /// initial guess to mean "short minus long" sort by maturity first.
    pub fn fit(&mut self, quotes: &[Quote]) -> Result<FitOutcome, CurveError> {
        let outcome = self.optimizer.optimize(quotes)?;
        info!(
            n = outcome.n_points,
            rmse = outcome.rmse(),
            status = ?outcome.status,
            "curve fitted"
        );
        self.params = Some(outcome.params);
        Ok(outcome)
    }

    /// Evaluate the fitted curve at each tenor, preserving order.
    pub fn predict(&self, tenors: &[f64]) -> Result<Vec<f64>, CurveError> {
        let params = self.params.as_ref().ok_or(CurveError::NotFitted)?;
        Ok(evaluate_many(tenors, params))
    }

    /// Simple forward rate between `maturity` and `maturity + horizon`:
    ///
    /// ```text
    /// f = ((m + h)·y(m + h) − m·y(m)) / h
    /// ```
    ///
    /// Inputs are validated before the fitted state is checked.
    pub fn forward_rate(&self, maturity: f64, horizon: f64) -> Result<f64, CurveError> {
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(CurveError::InvalidHorizon { horizon });
        }
        if !maturity.is_finite() || maturity < 0.0 {
            return Err(CurveError::InvalidMaturity { maturity });
        }
        let params = self.params.as_ref().ok_or(CurveError::NotFitted)?;

        let y1 = evaluate(maturity, params);
        let y2 = evaluate(maturity + horizon, params);
        Ok(((maturity + horizon) * y2 - maturity * y1) / horizon)
    }
}
