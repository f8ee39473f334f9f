//! Curve calibration.
//!
//! - `optimizer`: two-stage bounded search (differential evolution, then
//!   Levenberg–Marquardt) producing a `FitOutcome`
//! - `fitter`: stateful wrapper exposing `fit`, `predict` and `forward_rate`

pub mod fitter;
pub mod optimizer;

pub use fitter::*;
pub use optimizer::*;
