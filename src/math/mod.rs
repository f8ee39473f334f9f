//! Mathematical utilities: NSS basis functions, least squares and bounded optimizers.

pub mod basis;
pub mod ols;
pub mod optim;

pub use basis::*;
pub use ols::*;
pub use optim::*;
