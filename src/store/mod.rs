//! Persisted curve series.
//!
//! Each `SeriesKind` is one data set of `(date, tenor, rate)` rows. Updating a
//! series is a read-merge-replace cycle:
//!
//! 1. load the prior rows (a missing data set is empty)
//! 2. `merge_records(prior, new)`: last write wins per `(date, tenor)`
//! 3. replace the whole data set through the backend
//!
//! Backends only need whole-set load/replace. The CSV directory backend lives
//! in `io::series`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::{CurveRecord, SeriesKind};
use crate::error::AppError;

/// Whole-data-set storage for curve series.
pub trait SeriesBackend {
    /// Load every row of `kind`. `Ok(None)` means the data set does not exist yet.
    fn load(&self, kind: SeriesKind) -> Result<Option<Vec<CurveRecord>>, AppError>;

    /// Replace the data set of `kind` with `records`.
    ///
    /// On error the previous data set must still be readable.
    fn replace(&mut self, kind: SeriesKind, records: &[CurveRecord]) -> Result<(), AppError>;
}

/// Tenor as an ordered map key.
///
/// Uses IEEE total ordering; `-0.0` is folded into `0.0` so both land on the
/// same key.
#[derive(Debug, Clone, Copy)]
struct TenorKey(f64);

impl TenorKey {
    fn new(tenor: f64) -> Self {
        Self(if tenor == 0.0 { 0.0 } else { tenor })
    }
}

impl PartialEq for TenorKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TenorKey {}

impl PartialOrd for TenorKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TenorKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Merge `new` into `prior`.
///
/// Rows are keyed by `(date, tenor)`; on conflict the row appearing later in
/// `prior ++ new` wins. The result is sorted ascending by `(date, tenor)` and
/// has no duplicate keys. `kind` is carried through untouched.
pub fn merge_records(prior: &[CurveRecord], new: &[CurveRecord]) -> Vec<CurveRecord> {
    let mut merged: BTreeMap<(NaiveDate, TenorKey), CurveRecord> = BTreeMap::new();
    for record in prior.iter().chain(new) {
        merged.insert((record.date, TenorKey::new(record.tenor)), *record);
    }
    merged.into_values().collect()
}

/// What a `CurveSeriesStore::merge` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub kind: SeriesKind,
    /// Rows stored before the merge.
    pub prior: usize,
    /// Rows handed in.
    pub incoming: usize,
    /// Rows stored after the merge.
    pub total: usize,
    /// Whether the backend data set was rewritten.
    pub written: bool,
}

/// In-process backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    series: BTreeMap<SeriesKind, Vec<CurveRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: SeriesKind) -> Option<&[CurveRecord]> {
        self.series.get(&kind).map(Vec::as_slice)
    }
}

impl SeriesBackend for MemoryBackend {
    fn load(&self, kind: SeriesKind) -> Result<Option<Vec<CurveRecord>>, AppError> {
        Ok(self.series.get(&kind).cloned())
    }

    fn replace(&mut self, kind: SeriesKind, records: &[CurveRecord]) -> Result<(), AppError> {
        self.series.insert(kind, records.to_vec());
        Ok(())
    }
}

/// Curve series persistence on top of a `SeriesBackend`.
#[derive(Debug)]
pub struct CurveSeriesStore<B> {
    backend: B,
}

impl<B: SeriesBackend> CurveSeriesStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Current rows of `kind` (empty if the data set does not exist).
    pub fn records(&self, kind: SeriesKind) -> Result<Vec<CurveRecord>, AppError> {
        Ok(self.backend.load(kind)?.unwrap_or_default())
    }

    /// Merge `new` into the stored `kind` series and persist the result.
    ///
    /// An empty batch leaves the data set untouched. Every row must belong to
    /// `kind`; a mismatch is rejected before the backend is touched.
    pub fn merge(&mut self, kind: SeriesKind, new: &[CurveRecord]) -> Result<MergeSummary, AppError> {
        if let Some(bad) = new.iter().find(|r| r.kind != kind) {
            return Err(AppError::new(
                2,
                format!(
                    "Record for {} {} (tenor {}) cannot be merged into the {} series.",
                    bad.kind.name(),
                    bad.date,
                    bad.tenor,
                    kind.name()
                ),
            ));
        }

        let prior = self.records(kind)?;

        if new.is_empty() {
            debug!(series = kind.name(), "no new rows, series left untouched");
            return Ok(MergeSummary {
                kind,
                prior: prior.len(),
                incoming: 0,
                total: prior.len(),
                written: false,
            });
        }

        let merged = merge_records(&prior, new);
        self.backend.replace(kind, &merged)?;

        info!(
            series = kind.name(),
            prior = prior.len(),
            incoming = new.len(),
            total = merged.len(),
            "series updated"
        );

        Ok(MergeSummary {
            kind,
            prior: prior.len(),
            incoming: new.len(),
            total: merged.len(),
            written: true,
        })
    }
}
