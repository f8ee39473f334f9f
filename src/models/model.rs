//! Nelson–Siegel–Svensson yield evaluation.
//!
//! ```text
//! y(t) = β0 + β1·L1(t) + β2·(L1(t) − E1(t)) + β3·(L2(t) − E2(t))
//! L_i(t) = (1 − exp(−t/τi)) / (t/τi),   E_i(t) = exp(−t/τi)
//! ```
//!
//! Pure functions only: the optimizer evaluates raw parameter slices, the
//! fitter evaluates stored `CurveParameters`.

use crate::domain::CurveParameters;
use crate::math::{curvature, loading};

/// Evaluate the NSS yield at tenor `t` (years).
///
/// `t` is floored at a small positive value, so `t <= 0` returns the short-rate
/// limit `β0 + β1` rather than a division by zero.
pub fn evaluate(t: f64, params: &CurveParameters) -> f64 {
    params.beta0
        + params.beta1 * loading(t, params.tau1)
        + params.beta2 * curvature(t, params.tau1)
        + params.beta3 * curvature(t, params.tau2)
}

/// Evaluate from a raw `[β0, β1, β2, β3, τ1, τ2]` vector.
///
/// # Panics
/// Panics if `x` has fewer than six elements.
pub fn evaluate_vector(t: f64, x: &[f64]) -> f64 {
    x[0] + x[1] * loading(t, x[4]) + x[2] * curvature(t, x[4]) + x[3] * curvature(t, x[5])
}

/// Evaluate the NSS yield at each tenor, preserving order.
pub fn evaluate_many(tenors: &[f64], params: &CurveParameters) -> Vec<f64> {
    tenors.iter().map(|&t| evaluate(t, params)).collect()
}
