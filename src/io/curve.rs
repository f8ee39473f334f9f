//! Read/write curve JSON files.
//!
//! Curve JSON is the portable representation of one fitted curve:
//! - reference date and curve family
//! - NSS parameters and fit quality
//! - the curve evaluated on a tenor grid
//!
//! The schema is defined by `domain::CurveFile`.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{CurveFamily, CurveFile, CurveGrid, FitOutcome, FitQuality};
use crate::error::AppError;
use crate::models::evaluate_many;

pub const TOOL_NAME: &str = "ettj";
pub const MODEL_NAME: &str = "nss";

/// Assemble the curve document for one fit.
pub fn curve_file(date: NaiveDate, family: CurveFamily, outcome: &FitOutcome, tenors: &[f64]) -> CurveFile {
    CurveFile {
        tool: TOOL_NAME.to_string(),
        date,
        family,
        model: MODEL_NAME.to_string(),
        params: outcome.params,
        fit_quality: FitQuality {
            sse: outcome.objective,
            rmse: outcome.rmse(),
            n: outcome.n_points,
            status: outcome.status,
        },
        grid: CurveGrid {
            tenor_years: tenors.to_vec(),
            y: evaluate_many(tenors, &outcome.params),
        },
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, curve)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveParameters, FitStatus};

    #[test]
    fn written_curve_reads_back() {
        let outcome = FitOutcome {
            params: CurveParameters {
                beta0: 12.0,
                beta1: -1.5,
                beta2: 2.0,
                beta3: -0.5,
                tau1: 1.2,
                tau2: 6.0,
            },
            objective: 0.004,
            global_objective: 0.005,
            n_points: 4,
            status: FitStatus::Converged,
        };
        let date = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        let curve = curve_file(date, CurveFamily::InflationLinked, &outcome, &[1.0, 5.0]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.json");
        write_curve_json(&path, &curve).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"family\": \"real\""));
        assert!(text.contains("\"status\": \"converged\""));

        let back = read_curve_json(&path).unwrap();
        assert_eq!(back.params, outcome.params);
        assert_eq!(back.grid.y, curve.grid.y);
        assert!((back.fit_quality.rmse - (0.001f64).sqrt()).abs() < 1e-12);
    }
}
