//! Least squares solver.
//!
//! The local refinement stage repeatedly solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λD) δ = -Jᵀr
//! ```
//!
//! for a six-parameter step `δ`. The system is tiny but can be badly
//! conditioned when the two decay scales collapse onto each other (the
//! `τ1`/`τ2` columns of the Jacobian become nearly collinear), so we solve it
//! with an SVD and accept progressively looser singular value cut-offs rather
//! than relying on an LU factorisation that fails outright.

use nalgebra::{DMatrix, DVector};

/// Solve a (possibly rectangular) least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() != y.len() || x.ncols() == 0 {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_solves_square_system() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);

        let x = solve_least_squares(&a, &b).unwrap();
        let r = &a * &x - &b;
        assert!(r.norm() < 1e-12);
    }

    #[test]
    fn least_squares_rejects_mismatched_shapes() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_least_squares(&a, &b).is_none());
    }
}
