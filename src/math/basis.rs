//! Stable basis functions for the Nelson–Siegel–Svensson curve.
//!
//! With `x = t/τ` the NSS form is built from:
//!
//! - `loading(t, τ)   = (1 - exp(-x)) / x`          (the `L` term)
//! - `curvature(t, τ) = loading(t, τ) - exp(-x)`    (the `L - E` term)
//!
//! Numerical notes:
//! - `t` is floored at `T_FLOOR` so `t = 0` (or a negative tenor) never divides
//!   by zero.
//! - For small `x`, `1 - exp(-x)` suffers from catastrophic cancellation.
//!   We use `expm1` (and a series fallback) to maintain precision.
//! - For `t → 0⁺` the analytic limits are `loading → 1` and `curvature → 0`.

/// Strictly positive floor applied to `t` before evaluation.
pub const T_FLOOR: f64 = 1e-10;

/// Threshold below which we switch to a small-x series approximation.
const SMALL_X: f64 = 1e-6;

/// `(1 - exp(-t/τ)) / (t/τ)`, computed in a numerically stable way.
pub fn loading(t: f64, tau: f64) -> f64 {
    let t = t.max(T_FLOOR);
    let x = t / tau;

    if x.abs() < SMALL_X {
        // Series: (1 - e^{-x}) / x ≈ 1 - x/2 + x^2/6
        return 1.0 - x / 2.0 + (x * x) / 6.0;
    }

    // 1 - exp(-x) computed as -expm1(-x).
    let numer = -(-x).exp_m1();
    numer / x
}

/// `loading(t, τ) - exp(-t/τ)`, computed in a numerically stable way.
pub fn curvature(t: f64, tau: f64) -> f64 {
    let t = t.max(T_FLOOR);
    let x = t / tau;

    if x.abs() < SMALL_X {
        // loading ≈ 1 - x/2 + x^2/6, exp(-x) ≈ 1 - x + x^2/2
        // => curvature ≈ x/2 - x^2/3
        return x / 2.0 - (x * x) / 3.0;
    }

    loading(t, tau) - (-x).exp()
}
