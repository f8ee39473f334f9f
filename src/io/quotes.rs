//! CSV quote files.
//!
//! Expected columns (case-insensitive, any order, extra columns ignored):
//!
//! ```text
//! date,family,maturity_years,yield_percent
//! 2024-11-14,nominal,1.0,12.5
//! 2024-11-14,real,1.0,6.4
//! ```
//!
//! `family` is `nominal` or `real`. The file is loaded eagerly; any invalid
//! row fails the whole load with its line number.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::debug;

use crate::data::QuoteSource;
use crate::domain::{CurveFamily, Quote, QuoteSet};
use crate::error::AppError;

const REQUIRED_COLUMNS: [&str; 4] = ["date", "family", "maturity_years", "yield_percent"];

/// Quotes loaded from a CSV file, grouped by reference date.
#[derive(Debug, Clone)]
pub struct CsvQuoteFile {
    path: PathBuf,
    sets: BTreeMap<NaiveDate, QuoteSet>,
}

impl CsvQuoteFile {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open quotes CSV '{}': {e}", path.display())))?;
        let sets = read_quotes(file)
            .map_err(|e| AppError::new(e.exit_code(), format!("{} ({})", e.message(), path.display())))?;
        debug!(path = %path.display(), dates = sets.len(), "quotes loaded");
        Ok(Self {
            path: path.to_path_buf(),
            sets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reference dates present in the file, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.sets.keys().copied().collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&QuoteSet> {
        self.sets.get(&date)
    }
}

impl QuoteSource for CsvQuoteFile {
    fn fetch_quotes(&self, date: NaiveDate) -> Result<Option<QuoteSet>, AppError> {
        Ok(self.sets.get(&date).cloned())
    }
}

/// Parse quote rows from any reader.
pub fn read_quotes<R: std::io::Read>(reader: R) -> Result<BTreeMap<NaiveDate, QuoteSet>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for col in REQUIRED_COLUMNS {
        if !header_map.contains_key(col) {
            return Err(AppError::new(2, format!("Missing required column: `{col}`")));
        }
    }

    let mut sets: BTreeMap<NaiveDate, QuoteSet> = BTreeMap::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; lines are 1-based
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error at line {line}: {e}")))?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let (date, family, quote) = parse_row(&record, &header_map)
            .map_err(|msg| AppError::new(2, format!("Invalid quote at line {line}: {msg}")))?;
        sets.entry(date)
            .or_insert_with(|| QuoteSet::new(date))
            .quotes_mut(family)
            .push(quote);
    }

    if sets.is_empty() {
        return Err(AppError::new(3, "Quotes CSV has no data rows."));
    }
    Ok(sets)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // spreadsheet exports may prefix the first header with a BOM
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    key: &str,
) -> Result<&'a str, String> {
    header_map
        .get(key)
        .and_then(|&idx| record.get(idx))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing `{key}` value"))
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<(NaiveDate, CurveFamily, Quote), String> {
    let raw_date = get_required(record, header_map, "date")?;
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{raw_date}': {e}"))?;

    let family = match get_required(record, header_map, "family")?.to_ascii_lowercase().as_str() {
        "nominal" => CurveFamily::Nominal,
        "real" => CurveFamily::InflationLinked,
        other => return Err(format!("unknown family '{other}' (expected nominal|real)")),
    };

    let maturity = parse_f64(get_required(record, header_map, "maturity_years")?, "maturity_years")?;
    if maturity <= 0.0 {
        return Err(format!("maturity_years must be > 0, got {maturity}"));
    }
    let yield_percent = parse_f64(get_required(record, header_map, "yield_percent")?, "yield_percent")?;

    Ok((date, family, Quote::new(maturity, yield_percent)))
}

fn parse_f64(raw: &str, name: &str) -> Result<f64, String> {
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("invalid `{name}` value '{raw}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("non-finite `{name}` value"))
    }
}
