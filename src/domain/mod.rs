//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - market inputs (`Quote`, `QuoteSet`, `PublishedVertex`, `CurveFamily`)
//! - fit outputs (`CurveParameters`, `FitOutcome`, `FitStatus`)
//! - persisted outputs (`CurveRecord`, `SeriesKind`)
//! - run configuration (`PipelineConfig`)

pub mod types;

pub use types::*;
