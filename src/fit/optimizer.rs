//! Two-stage NSS calibration.
//!
//! Given quotes `(t_i, y_i)` we minimize the sum of squared residuals
//!
//! ```text
//! SSE(θ) = Σ (y_i − y(t_i; θ))²,   θ = [β0, β1, β2, β3, τ1, τ2]
//! ```
//!
//! inside a fixed parameter box:
//!
//! 1. global stage: seeded differential evolution over the whole box, seeded
//!    with a level/slope initial guess;
//! 2. local stage: bounded Levenberg–Marquardt started from the global optimum.
//!
//! If the local stage does not converge we keep the global estimate and tag
//! the outcome `Degraded`. A bad fit is never an error; malformed input is.

use tracing::{debug, warn};

use crate::domain::{CurveParameters, FitOutcome, FitStatus, Quote};
use crate::error::CurveError;
use crate::math::{
    BoxConstraints, DifferentialEvolutionOptions, LevenbergMarquardtOptions, OptimizationResult,
    differential_evolution, levenberg_marquardt, sum_of_squares,
};
use crate::models::evaluate_vector;

/// Lower parameter bounds `[β0, β1, β2, β3, τ1, τ2]`.
pub const LOWER_BOUNDS: [f64; 6] = [-5.0, -30.0, -30.0, -30.0, 0.1, 0.1];
/// Upper parameter bounds `[β0, β1, β2, β3, τ1, τ2]`.
pub const UPPER_BOUNDS: [f64; 6] = [30.0, 30.0, 30.0, 30.0, 10.0, 10.0];

/// Minimum number of quotes accepted by a fit.
pub const MIN_QUOTES: usize = 2;

/// Calibrates NSS parameters to a quote sample.
///
/// Bounds, seed and tolerances are a fixed policy; `Default` is the only
/// constructor used outside tests.
#[derive(Debug, Clone)]
pub struct CurveFitOptimizer {
    bounds: BoxConstraints,
    global: DifferentialEvolutionOptions,
    local: LevenbergMarquardtOptions,
}

impl Default for CurveFitOptimizer {
    fn default() -> Self {
        Self {
            bounds: BoxConstraints {
                lower: LOWER_BOUNDS.to_vec(),
                upper: UPPER_BOUNDS.to_vec(),
            },
            global: DifferentialEvolutionOptions::default(),
            local: LevenbergMarquardtOptions::default(),
        }
    }
}

impl CurveFitOptimizer {
    pub fn bounds(&self) -> &BoxConstraints {
        &self.bounds
    }

    /// Calibrate to `quotes` (in the caller's order).
    ///
    /// With fewer than six quotes the problem is underdetermined: the search
    /// still runs and typically reproduces the quotes almost exactly, but the
    /// individual parameters are not identified.
    pub fn optimize(&self, quotes: &[Quote]) -> Result<FitOutcome, CurveError> {
        validate_quotes(quotes)?;

        let tenors: Vec<f64> = quotes.iter().map(|q| q.maturity_years).collect();
        let yields: Vec<f64> = quotes.iter().map(|q| q.yield_percent).collect();
        let n = quotes.len();

        let residuals = |x: &[f64]| -> Vec<f64> {
            tenors
                .iter()
                .zip(&yields)
                .map(|(&t, &y)| y - evaluate_vector(t, x))
                .collect()
        };
        let objective = |x: &[f64]| sum_of_squares(&residuals(x));

        let guess = initial_guess(&yields);
        let global = differential_evolution(&self.bounds, self.global, Some(&guess), objective)
            .map_err(CurveError::Optimizer)?;
        debug!(
            generations = global.iterations,
            evaluations = global.evaluations,
            converged = global.converged,
            sse = global.objective,
            "global stage finished"
        );

        let local = levenberg_marquardt(&global.x, &self.bounds, self.local, residuals);
        Ok(settle(&global, local, n))
    }
}

/// Pick the refined point when the local stage converged to a finite
/// objective, otherwise fall back to the global estimate tagged `Degraded`.
fn settle(global: &OptimizationResult, local: Result<OptimizationResult, String>, n_points: usize) -> FitOutcome {
    let degraded = FitOutcome {
        params: CurveParameters::from_slice(&global.x),
        objective: global.objective,
        global_objective: global.objective,
        n_points,
        status: FitStatus::Degraded,
    };

    let local = match local {
        Ok(local) => local,
        Err(reason) => {
            warn!(%reason, "local refinement failed, using global result");
            return degraded;
        }
    };

    if !local.converged || !local.objective.is_finite() {
        warn!(
            reason = ?local.reason,
            iterations = local.iterations,
            "local refinement did not converge, using global result"
        );
        return degraded;
    }

    debug!(
        iterations = local.iterations,
        reason = ?local.reason,
        sse = local.objective,
        "local stage converged"
    );

    FitOutcome {
        params: CurveParameters::from_slice(&local.x),
        objective: local.objective,
        global_objective: global.objective,
        n_points,
        status: FitStatus::Converged,
    }
}

/// Level/slope starting point `[mean(y), y[0] − y[last], 0, 0, 1, 5]`.
///
/// Uses input order: the slope term is only "short minus long" if the caller
/// sorted the quotes by maturity.
pub fn initial_guess(yields: &[f64]) -> [f64; 6] {
    let n = yields.len().max(1) as f64;
    let mean = yields.iter().sum::<f64>() / n;
    let spread = match (yields.first(), yields.last()) {
        (Some(first), Some(last)) => first - last,
        _ => 0.0,
    };
    [mean, spread, 0.0, 0.0, 1.0, 5.0]
}

fn validate_quotes(quotes: &[Quote]) -> Result<(), CurveError> {
    if quotes.len() < MIN_QUOTES {
        return Err(CurveError::InsufficientQuotes {
            required: MIN_QUOTES,
            actual: quotes.len(),
        });
    }
    for (index, q) in quotes.iter().enumerate() {
        let maturity_ok = q.maturity_years.is_finite() && q.maturity_years > 0.0;
        if !maturity_ok || !q.yield_percent.is_finite() {
            return Err(CurveError::InvalidQuote {
                index,
                maturity: q.maturity_years,
                yield_percent: q.yield_percent,
            });
        }
    }
    Ok(())
}
