//! Synthetic ETTJ quotes for offline runs.
//!
//! Each weekday gets quotes on a fixed business-day vertex grid, drawn around
//! fixed nominal and real NSS baselines with Gaussian noise. The noise is
//! seeded from `(seed, date)`, so a date always produces the same quotes.
//! The same vertices are published as the day's official curve, with the
//! implied inflation taken from the Fisher relation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, NaiveDate, Weekday};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::data::anbima::BUSINESS_DAYS_PER_YEAR;
use crate::data::source::QuoteSource;
use crate::domain::{CurveParameters, PublishedVertex, Quote, QuoteSet};
use crate::error::AppError;
use crate::models::evaluate;

/// Vertices (business days) quoted every day.
pub const SAMPLE_VERTICES_DU: [u32; 12] = [21, 63, 126, 252, 378, 504, 756, 1008, 1260, 1764, 2520, 3780];

/// Noise standard deviation, in percentage points.
pub const NOISE_SD: f64 = 0.03;

pub const NOMINAL_BASELINE: CurveParameters = CurveParameters {
    beta0: 12.2,
    beta1: -1.4,
    beta2: 2.0,
    beta3: -0.6,
    tau1: 1.2,
    tau2: 6.0,
};

pub const REAL_BASELINE: CurveParameters = CurveParameters {
    beta0: 6.3,
    beta1: -0.8,
    beta2: 1.1,
    beta3: 0.4,
    tau1: 1.5,
    tau2: 7.0,
};

#[derive(Debug, Clone, Copy)]
pub struct SampleSource {
    seed: u64,
}

impl SampleSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn generate(&self, date: NaiveDate) -> Result<Option<QuoteSet>, AppError> {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Ok(None);
        }

        let mut rng = StdRng::seed_from_u64(sample_seed(self.seed, date));
        let normal = Normal::new(0.0, NOISE_SD)
            .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

        let mut set = QuoteSet::new(date);
        for du in SAMPLE_VERTICES_DU {
            let t = f64::from(du) / BUSINESS_DAYS_PER_YEAR;
            let nominal = evaluate(t, &NOMINAL_BASELINE) + normal.sample(&mut rng);
            let real = evaluate(t, &REAL_BASELINE) + normal.sample(&mut rng);
            set.nominal.push(Quote::new(t, nominal));
            set.real.push(Quote::new(t, real));
            set.published.push(PublishedVertex {
                du: f64::from(du),
                nominal: Some(nominal),
                real: Some(real),
                breakeven: Some(implied_inflation(nominal, real)),
            });
        }
        Ok(Some(set))
    }
}

impl QuoteSource for SampleSource {
    fn fetch_quotes(&self, date: NaiveDate) -> Result<Option<QuoteSet>, AppError> {
        self.generate(date)
    }
}

/// `((1 + n) / (1 + r) − 1)`, all rates in percent.
fn implied_inflation(nominal: f64, real: f64) -> f64 {
    ((1.0 + nominal / 100.0) / (1.0 + real / 100.0) - 1.0) * 100.0
}

fn sample_seed(seed: u64, date: NaiveDate) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    date.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
    }

    #[test]
    fn weekends_have_no_quotes() {
        let source = SampleSource::new(7);
        // 2024-11-16 is a Saturday
        assert!(source.fetch_quotes(d(16)).unwrap().is_none());
        assert!(source.fetch_quotes(d(17)).unwrap().is_none());
        assert!(source.fetch_quotes(d(18)).unwrap().is_some());
    }

    #[test]
    fn same_seed_and_date_give_same_quotes() {
        let a = SampleSource::new(7).fetch_quotes(d(14)).unwrap().unwrap();
        let b = SampleSource::new(7).fetch_quotes(d(14)).unwrap().unwrap();
        let other_day = SampleSource::new(7).fetch_quotes(d(15)).unwrap().unwrap();
        assert_eq!(a, b);
        assert_ne!(a.nominal, other_day.nominal);
    }

    #[test]
    fn quotes_stay_near_baseline() {
        let set = SampleSource::new(1).fetch_quotes(d(14)).unwrap().unwrap();
        assert_eq!(set.nominal.len(), SAMPLE_VERTICES_DU.len());
        assert_eq!(set.real.len(), SAMPLE_VERTICES_DU.len());
        for q in &set.nominal {
            let base = evaluate(q.maturity_years, &NOMINAL_BASELINE);
            assert!((q.yield_percent - base).abs() < 10.0 * NOISE_SD);
        }
        assert!((set.nominal[3].maturity_years - 1.0).abs() < 1e-12);
    }

    #[test]
    fn published_curve_matches_quotes() {
        let set = SampleSource::new(3).fetch_quotes(d(14)).unwrap().unwrap();
        assert_eq!(set.published.len(), SAMPLE_VERTICES_DU.len());

        let v = set.published[3];
        assert_eq!(v.du, 252.0);
        assert_eq!(v.nominal, Some(set.nominal[3].yield_percent));
        assert_eq!(v.real, Some(set.real[3].yield_percent));
        // 12% nominal over 6% real is 5.66% implied inflation
        assert!((implied_inflation(12.0, 6.0) - 5.660377358490566).abs() < 1e-9);
    }
}
