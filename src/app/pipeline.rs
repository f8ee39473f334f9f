//! Daily curve pipeline shared by the `run` command and the integration tests.
//!
//! Per reference date:
//! quotes -> one fitted curve per family -> tenor-grid yields -> breakeven and
//! forward series. The source's published vertex curve, if any, is carried
//! alongside as its own series keyed by business days. After the whole date
//! range, each series kind is merged into the store once.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::{info, warn};

use crate::data::QuoteSource;
use crate::domain::{
    CurveFamily, CurveRecord, FitOutcome, PipelineConfig, PublishedVertex, Quote, QuoteSet, SeriesKind,
};
use crate::error::{AppError, CurveError};
use crate::fit::CurveFitter;
use crate::store::{CurveSeriesStore, MergeSummary, SeriesBackend};

/// Horizon (years) of the published forward rates.
pub const FORWARD_HORIZON: f64 = 0.25;
/// Shortest grid tenor (years) a forward rate is published for.
pub const MIN_FORWARD_TENOR: f64 = 0.25;

/// One family's calibration for a date.
#[derive(Debug, Clone)]
pub struct FamilyFit {
    pub family: CurveFamily,
    pub outcome: FitOutcome,
}

/// Everything derived for one reference date.
#[derive(Debug, Clone)]
pub struct DailyCurves {
    pub date: NaiveDate,
    pub fits: Vec<FamilyFit>,
    pub series: BTreeMap<SeriesKind, Vec<CurveRecord>>,
}

impl DailyCurves {
    pub fn fit(&self, family: CurveFamily) -> Option<&FitOutcome> {
        self.fits.iter().find(|f| f.family == family).map(|f| &f.outcome)
    }

    pub fn records(&self, kind: SeriesKind) -> &[CurveRecord] {
        self.series.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Outcome of a date-range run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub days: Vec<DailyCurves>,
    /// Dates with nothing published.
    pub skipped: Vec<NaiveDate>,
    /// Dates whose quotes could not be fetched, with the reason.
    pub failed: Vec<(NaiveDate, String)>,
    pub merges: Vec<MergeSummary>,
}

pub struct CurvePipeline<S, B> {
    source: S,
    store: CurveSeriesStore<B>,
    config: PipelineConfig,
}

impl<S: QuoteSource, B: SeriesBackend> CurvePipeline<S, B> {
    pub fn new(source: S, store: CurveSeriesStore<B>, config: PipelineConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &CurveSeriesStore<B> {
        &self.store
    }

    pub fn into_store(self) -> CurveSeriesStore<B> {
        self.store
    }

    /// Process `dates` in order and merge the results into the store.
    ///
    /// A date the source has no data for is skipped. A source error is
    /// logged and the date is skipped too; fit errors abort the run before
    /// anything is written.
    pub fn run(&mut self, dates: &[NaiveDate]) -> Result<RunSummary, AppError> {
        let mut summary = RunSummary::default();

        for &date in dates {
            let quotes = match self.source.fetch_quotes(date) {
                Ok(Some(quotes)) => quotes,
                Ok(None) => {
                    info!(%date, "no quotes, skipping");
                    summary.skipped.push(date);
                    continue;
                }
                Err(err) => {
                    warn!(%date, error = %err, "quote fetch failed, skipping");
                    summary.failed.push((date, err.message().to_string()));
                    continue;
                }
            };

            let day = compute_daily_curves(&quotes, &self.config)
                .map_err(|e| AppError::new(e.exit_code(), format!("{date}: {e}")))?;
            summary.days.push(day);
        }

        for kind in SeriesKind::ALL {
            let batch: Vec<CurveRecord> = summary
                .days
                .iter()
                .flat_map(|d| d.records(kind).iter().copied())
                .collect();
            summary.merges.push(self.store.merge(kind, &batch)?);
        }

        Ok(summary)
    }
}

/// Fit both families of `quotes` and derive every series for that date.
///
/// A family without quotes is skipped (its series and the breakeven series
/// stay empty). A family with a single quote is an error.
pub fn compute_daily_curves(quotes: &QuoteSet, config: &PipelineConfig) -> Result<DailyCurves, CurveError> {
    let date = quotes.date;
    let mut fits = Vec::new();
    let mut series: BTreeMap<SeriesKind, Vec<CurveRecord>> = BTreeMap::new();
    let mut nominal_fitter = None;

    for family in CurveFamily::ALL {
        let raw = quotes.quotes(family);
        if raw.is_empty() {
            warn!(%date, family = family.display_name(), "no quotes for family, skipping");
            continue;
        }

        let sorted = sorted_by_maturity(raw);
        let mut fitter = CurveFitter::new();
        info!(%date, family = family.display_name(), n = sorted.len(), "fitting curve");
        let outcome = fitter.fit(&sorted)?;
        if outcome.is_degraded() {
            warn!(%date, family = family.display_name(), "using global-stage estimate");
        }

        let grid = match family {
            CurveFamily::Nominal => config.tenors.as_slice(),
            CurveFamily::InflationLinked => config.real_tenors(),
        };
        let kind = family.series_kind();
        let values = fitter.predict(grid)?;
        series.insert(kind, to_records(date, grid, &values, kind));

        fits.push(FamilyFit { family, outcome });
        if family == CurveFamily::Nominal {
            nominal_fitter = Some(fitter);
        }
    }

    if let (Some(nominal), Some(real)) = (series.get(&SeriesKind::Nominal), series.get(&SeriesKind::Real)) {
        let breakeven = breakeven_records(nominal, real);
        series.insert(SeriesKind::Breakeven, breakeven);
    }

    if let Some(fitter) = &nominal_fitter {
        series.insert(SeriesKind::Forward, forward_records(date, fitter, &config.tenors)?);
    }

    for (kind, records) in published_records(date, &quotes.published) {
        series.insert(kind, records);
    }

    Ok(DailyCurves { date, fits, series })
}

/// Published vertex rates split per series, keyed by `du`.
///
/// A vertex missing a rate is left out of that series only. Series with no
/// rows are omitted.
pub fn published_records(date: NaiveDate, vertices: &[PublishedVertex]) -> Vec<(SeriesKind, Vec<CurveRecord>)> {
    let columns: [(SeriesKind, fn(&PublishedVertex) -> Option<f64>); 3] = [
        (SeriesKind::PublishedNominal, |v| v.nominal),
        (SeriesKind::PublishedReal, |v| v.real),
        (SeriesKind::PublishedBreakeven, |v| v.breakeven),
    ];

    columns
        .into_iter()
        .map(|(kind, rate)| {
            let records: Vec<CurveRecord> = vertices
                .iter()
                .filter_map(|v| rate(v).map(|r| CurveRecord::new(date, v.du, r, kind)))
                .collect();
            (kind, records)
        })
        .filter(|(_, records)| !records.is_empty())
        .collect()
}

fn sorted_by_maturity(quotes: &[Quote]) -> Vec<Quote> {
    let mut sorted = quotes.to_vec();
    sorted.sort_by(|a, b| a.maturity_years.total_cmp(&b.maturity_years));
    sorted
}

fn to_records(date: NaiveDate, tenors: &[f64], values: &[f64], kind: SeriesKind) -> Vec<CurveRecord> {
    tenors
        .iter()
        .zip(values)
        .map(|(&t, &v)| CurveRecord::new(date, t, v, kind))
        .collect()
}

/// `nominal − real` on tenors present in both series (exact match).
pub fn breakeven_records(nominal: &[CurveRecord], real: &[CurveRecord]) -> Vec<CurveRecord> {
    nominal
        .iter()
        .filter_map(|n| {
            real.iter()
                .find(|r| r.date == n.date && r.tenor == n.tenor)
                .map(|r| CurveRecord::new(n.date, n.tenor, n.value - r.value, SeriesKind::Breakeven))
        })
        .collect()
}

/// Forward rates over `FORWARD_HORIZON` starting at each grid tenor
/// `>= MIN_FORWARD_TENOR`.
pub fn forward_records(date: NaiveDate, fitter: &CurveFitter, tenors: &[f64]) -> Result<Vec<CurveRecord>, CurveError> {
    tenors
        .iter()
        .filter(|&&t| t >= MIN_FORWARD_TENOR)
        .map(|&t| {
            fitter
                .forward_rate(t, FORWARD_HORIZON)
                .map(|f| CurveRecord::new(date, t, f, SeriesKind::Forward))
        })
        .collect()
}

/// Weekdays (Mon–Fri) in `[start, end]`, ascending. Empty if `start > end`.
pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

/// Monday and Friday of the week before the one containing `today`.
///
/// On a Monday the reference week is the one starting a week earlier, so the
/// range covers the week before last.
pub fn previous_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let days_since_monday = i64::from(today.weekday().num_days_from_monday());
    let last_monday = if days_since_monday == 0 {
        today - Duration::days(7)
    } else {
        today - Duration::days(days_since_monday)
    };
    let start = last_monday - Duration::days(7);
    (start, start + Duration::days(4))
}
