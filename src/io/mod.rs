//! Input/output helpers.
//!
//! - CSV quote files (`quotes`)
//! - CSV series directory backend (`series`)
//! - curve JSON read/write (`curve`)

pub mod curve;
pub mod quotes;
pub mod series;

pub use curve::*;
pub use quotes::*;
pub use series::*;
