//! CSV directory backend for curve series.
//!
//! Layout: one file per series kind, `<dir>/ettj_<kind>.csv`, with a
//! `date,tenor,rate` header (`date,du,rate` for published series). Replacing a series writes a temp file in the same
//! directory and renames it over the target, so readers see either the old or
//! the new file, never a partial one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::{CurveRecord, SeriesKind};
use crate::error::AppError;
use crate::store::SeriesBackend;

/// `(date, key, rate)`, where the key column is named by the series kind.
type SeriesRow = (NaiveDate, f64, f64);

fn header(kind: SeriesKind) -> [&'static str; 3] {
    ["date", kind.key_column(), "rate"]
}

#[derive(Debug, Clone)]
pub struct CsvSeriesDirectory {
    dir: PathBuf,
}

impl CsvSeriesDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: SeriesKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

impl SeriesBackend for CsvSeriesDirectory {
    fn load(&self, kind: SeriesKind) -> Result<Option<Vec<CurveRecord>>, AppError> {
        let path = self.path_for(kind);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::new(
                    2,
                    format!("Failed to open series '{}': {e}", path.display()),
                ));
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let expected = header(kind);
        let found = reader.headers().map_err(|e| {
            AppError::new(2, format!("Failed to read header of '{}': {e}", path.display()))
        })?;
        if found.iter().ne(expected.iter().copied()) {
            return Err(AppError::new(
                2,
                format!(
                    "Unexpected header in '{}': expected '{}', found '{}'.",
                    path.display(),
                    expected.join(","),
                    found.iter().collect::<Vec<_>>().join(",")
                ),
            ));
        }

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<SeriesRow>().enumerate() {
            // header is line 1
            let line = idx + 2;
            let row = row.map_err(|e| {
                AppError::new(
                    2,
                    format!("Invalid row in '{}' at line {line}: {e}", path.display()),
                )
            })?;
            let (date, key, rate) = row;
            records.push(CurveRecord::new(date, key, rate, kind));
        }

        debug!(path = %path.display(), rows = records.len(), "series loaded");
        Ok(Some(records))
    }

    fn replace(&mut self, kind: SeriesKind, records: &[CurveRecord]) -> Result<(), AppError> {
        let path = self.path_for(kind);
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to create output directory '{}': {e}", self.dir.display()),
            )
        })?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| AppError::new(2, format!("Failed to create temp file: {e}")))?;

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer
                .write_record(header(kind))
                .map_err(|e| AppError::new(2, format!("Failed to write series header: {e}")))?;
            for r in records {
                let row: SeriesRow = (r.date, r.tenor, r.value);
                writer
                    .serialize(row)
                    .map_err(|e| AppError::new(2, format!("Failed to write series row: {e}")))?;
            }
            writer
                .flush()
                .map_err(|e| AppError::new(2, format!("Failed to flush series: {e}")))?;
        }

        tmp.as_file_mut()
            .flush()
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AppError::new(2, format!("Failed to sync series: {e}")))?;

        tmp.persist(&path).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to replace series '{}': {}", path.display(), e.error),
            )
        })?;

        debug!(path = %path.display(), rows = records.len(), "series written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CurveSeriesStore;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = CsvSeriesDirectory::new(dir.path());
        assert!(backend.load(SeriesKind::Nominal).unwrap().is_none());
    }

    #[test]
    fn replace_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = CsvSeriesDirectory::new(dir.path());
        let rows = vec![
            CurveRecord::new(d(2), 0.5, 10.25, SeriesKind::Real),
            CurveRecord::new(d(2), 10.0, 6.125, SeriesKind::Real),
        ];
        backend.replace(SeriesKind::Real, &rows).unwrap();

        let text = fs::read_to_string(dir.path().join("ettj_real.csv")).unwrap();
        assert!(text.starts_with("date,tenor,rate\n2024-01-02,0.5,10.25\n"));

        assert_eq!(backend.load(SeriesKind::Real).unwrap().unwrap(), rows);
    }

    #[test]
    fn rerun_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let batch = vec![
            CurveRecord::new(d(3), 1.0, 11.0, SeriesKind::Nominal),
            CurveRecord::new(d(2), 1.0, 10.5, SeriesKind::Nominal),
        ];

        let mut store = CurveSeriesStore::new(CsvSeriesDirectory::new(dir.path()));
        store.merge(SeriesKind::Nominal, &batch).unwrap();
        let path = store.backend().path_for(SeriesKind::Nominal);
        let first = fs::read(&path).unwrap();

        store.merge(SeriesKind::Nominal, &batch).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn published_series_are_keyed_by_business_days() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = CsvSeriesDirectory::new(dir.path());
        let rows = vec![
            CurveRecord::new(d(2), 252.0, 12.5, SeriesKind::PublishedNominal),
            CurveRecord::new(d(2), 504.0, 12.9, SeriesKind::PublishedNominal),
        ];
        backend.replace(SeriesKind::PublishedNominal, &rows).unwrap();

        let path = dir.path().join("ettj_published_nominal.csv");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date,du,rate\n"), "{text}");
        assert_eq!(backend.load(SeriesKind::PublishedNominal).unwrap().unwrap(), rows);

        // files with integer business days load too
        fs::write(&path, "date,du,rate\n2024-01-03,252,12.6\n").unwrap();
        let loaded = backend.load(SeriesKind::PublishedNominal).unwrap().unwrap();
        assert_eq!(loaded, vec![CurveRecord::new(d(3), 252.0, 12.6, SeriesKind::PublishedNominal)]);
    }

    #[test]
    fn wrong_key_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ettj_real.csv"), "date,du,rate\n2024-01-02,252,6.1\n").unwrap();

        let err = CsvSeriesDirectory::new(dir.path()).load(SeriesKind::Real).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("date,tenor,rate"), "{}", err.message());
    }

    #[test]
    fn bad_row_reports_line_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ettj_forward.csv");
        fs::write(&path, "date,tenor,rate\n2024-01-02,1.0,11.0\n2024-01-03,abc,11.0\n").unwrap();

        let mut store = CurveSeriesStore::new(CsvSeriesDirectory::new(dir.path()));
        let err = store
            .merge(
                SeriesKind::Forward,
                &[CurveRecord::new(d(4), 1.0, 12.0, SeriesKind::Forward)],
            )
            .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("line 3"), "{}", err.message());
        assert!(fs::read_to_string(&path).unwrap().contains("abc"));
    }
}
