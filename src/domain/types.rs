//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - persisted as series rows (CSV)
//! - exported as fitted-curve JSON

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// An observed market yield at a single maturity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Time to maturity in years (> 0).
    pub maturity_years: f64,
    /// Observed yield in percent.
    pub yield_percent: f64,
}

impl Quote {
    pub fn new(maturity_years: f64, yield_percent: f64) -> Self {
        Self {
            maturity_years,
            yield_percent,
        }
    }
}

/// Curve family a set of quotes belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CurveFamily {
    /// Fixed-rate (pre-fixado) government bonds.
    Nominal,
    /// Inflation-linked (IPCA) government bonds, quoted as real yields.
    #[serde(rename = "real")]
    #[value(name = "real")]
    InflationLinked,
}

impl CurveFamily {
    pub const ALL: [CurveFamily; 2] = [CurveFamily::Nominal, CurveFamily::InflationLinked];

    pub fn display_name(self) -> &'static str {
        match self {
            CurveFamily::Nominal => "nominal",
            CurveFamily::InflationLinked => "real",
        }
    }

    /// Series the family's tenor grid is persisted under.
    pub fn series_kind(self) -> SeriesKind {
        match self {
            CurveFamily::Nominal => SeriesKind::Nominal,
            CurveFamily::InflationLinked => SeriesKind::Real,
        }
    }
}

/// One vertex of the official curve as published, keyed by business days.
///
/// Rates are in percent; a missing rate means the vertex was not published
/// for that series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishedVertex {
    pub du: f64,
    pub nominal: Option<f64>,
    pub real: Option<f64>,
    /// Implied inflation (breakeven) as published.
    pub breakeven: Option<f64>,
}

/// All quotes observed for one reference date.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSet {
    pub date: NaiveDate,
    pub nominal: Vec<Quote>,
    pub real: Vec<Quote>,
    /// Published vertex curve, when the source has one. Persisted as is.
    pub published: Vec<PublishedVertex>,
}

impl QuoteSet {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            nominal: Vec::new(),
            real: Vec::new(),
            published: Vec::new(),
        }
    }

    pub fn quotes(&self, family: CurveFamily) -> &[Quote] {
        match family {
            CurveFamily::Nominal => &self.nominal,
            CurveFamily::InflationLinked => &self.real,
        }
    }

    pub fn quotes_mut(&mut self, family: CurveFamily) -> &mut Vec<Quote> {
        match family {
            CurveFamily::Nominal => &mut self.nominal,
            CurveFamily::InflationLinked => &mut self.real,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nominal.is_empty() && self.real.is_empty() && self.published.is_empty()
    }
}

/// The six calibrated Nelson–Siegel–Svensson coefficients.
///
/// Betas are in percent, taus in years. `tau1 > 0` and `tau2 > 0` are
/// guaranteed by the optimizer bounds, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParameters {
    pub beta0: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub beta3: f64,
    pub tau1: f64,
    pub tau2: f64,
}

impl CurveParameters {
    /// Number of calibrated coefficients.
    pub const LEN: usize = 6;

    /// Build from `[beta0, beta1, beta2, beta3, tau1, tau2]`.
    ///
    /// # Panics
    /// Panics if `x` has fewer than six elements.
    pub fn from_slice(x: &[f64]) -> Self {
        Self {
            beta0: x[0],
            beta1: x[1],
            beta2: x[2],
            beta3: x[3],
            tau1: x[4],
            tau2: x[5],
        }
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.beta0, self.beta1, self.beta2, self.beta3, self.tau1, self.tau2]
    }

    /// Short-rate limit `y(0⁺) = beta0 + beta1`.
    pub fn short_rate(&self) -> f64 {
        self.beta0 + self.beta1
    }
}

/// How the local refinement stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStatus {
    /// Local refinement converged; parameters come from the refined point.
    Converged,
    /// Local refinement did not converge; parameters are the global-stage estimate.
    Degraded,
}

/// Result of one calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    pub params: CurveParameters,
    /// Sum of squared residuals at `params`.
    pub objective: f64,
    /// Sum of squared residuals at the global-stage estimate.
    pub global_objective: f64,
    pub n_points: usize,
    pub status: FitStatus,
}

impl FitOutcome {
    /// Root mean squared error, `sqrt(objective / n_points)`.
    pub fn rmse(&self) -> f64 {
        (self.objective / self.n_points.max(1) as f64).sqrt()
    }

    pub fn is_degraded(&self) -> bool {
        self.status == FitStatus::Degraded
    }
}

/// A persisted data set of curve outputs.
///
/// Fitted series are keyed by tenor in years; published series by business
/// days to maturity (`du`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Nominal,
    Real,
    Breakeven,
    Forward,
    PublishedNominal,
    PublishedReal,
    PublishedBreakeven,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 7] = [
        SeriesKind::Nominal,
        SeriesKind::Real,
        SeriesKind::Breakeven,
        SeriesKind::Forward,
        SeriesKind::PublishedNominal,
        SeriesKind::PublishedReal,
        SeriesKind::PublishedBreakeven,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SeriesKind::Nominal => "nominal",
            SeriesKind::Real => "real",
            SeriesKind::Breakeven => "breakeven",
            SeriesKind::Forward => "forward",
            SeriesKind::PublishedNominal => "published_nominal",
            SeriesKind::PublishedReal => "published_real",
            SeriesKind::PublishedBreakeven => "published_breakeven",
        }
    }

    pub fn is_published(self) -> bool {
        matches!(
            self,
            SeriesKind::PublishedNominal | SeriesKind::PublishedReal | SeriesKind::PublishedBreakeven
        )
    }

    /// Name of the key column in persisted files.
    pub fn key_column(self) -> &'static str {
        if self.is_published() { "du" } else { "tenor" }
    }

    /// File name of the series inside an output directory.
    pub fn file_name(self) -> String {
        format!("ettj_{}.csv", self.name())
    }
}

/// One persisted output row, keyed by `(date, tenor)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveRecord {
    pub date: NaiveDate,
    /// Tenor in years, or business days for published series.
    pub tenor: f64,
    /// Rate in percent.
    pub value: f64,
    pub kind: SeriesKind,
}

impl CurveRecord {
    pub fn new(date: NaiveDate, tenor: f64, value: f64, kind: SeriesKind) -> Self {
        Self {
            date,
            tenor,
            value,
            kind,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tenor grid (years) for the nominal curve; also drives the forward series.
    pub tenors: Vec<f64>,
    /// Tenor grid (years) for the real curve. `None` reuses `tenors`.
    pub real_tenors: Option<Vec<f64>>,
    /// Directory holding the persisted series files.
    pub output_dir: PathBuf,
}

impl PipelineConfig {
    pub fn real_tenors(&self) -> &[f64] {
        self.real_tenors.as_deref().unwrap_or(&self.tenors)
    }
}

/// A saved fitted-curve file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub date: NaiveDate,
    pub family: CurveFamily,
    pub model: String,
    pub params: CurveParameters,
    pub fit_quality: FitQuality,
    pub grid: CurveGrid,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    pub status: FitStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub tenor_years: Vec<f64>,
    pub y: Vec<f64>,
}
