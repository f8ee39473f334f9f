//! Formatted terminal output.
//!
//! We keep formatting code in one place so the fitting and storage code stays
//! free of presentation concerns and output changes are localized.

use chrono::NaiveDate;

use crate::app::pipeline::{FORWARD_HORIZON, RunSummary};
use crate::domain::{CurveFamily, CurveFile, FitOutcome, FitStatus};
use crate::report::QuoteResidual;

/// Summary of a `ettj run` over a date range.
pub fn format_run_summary(summary: &RunSummary, start: NaiveDate, end: NaiveDate) -> String {
    let mut out = String::new();

    out.push_str("=== ettj - ETTJ curve run ===\n");
    out.push_str(&format!("Range: {start} .. {end}\n"));
    out.push_str(&format!(
        "Dates: fitted={} | no data={} | failed={}\n",
        summary.days.len(),
        summary.skipped.len(),
        summary.failed.len()
    ));

    if !summary.days.is_empty() {
        out.push_str("\nFits:\n");
        out.push_str(&format!(
            "{:<10} {:<8} {:>4} {:>10} {:<9}\n",
            "date", "family", "n", "rmse", "status"
        ));
        out.push_str(&format!("{:-<10} {:-<8} {:-<4} {:-<10} {:-<9}\n", "", "", "", "", ""));
        for day in &summary.days {
            for fit in &day.fits {
                out.push_str(
                    format!(
                        "{:<10} {:<8} {:>4} {:>10.5} {:<9}\n",
                        day.date,
                        fit.family.display_name(),
                        fit.outcome.n_points,
                        fit.outcome.rmse(),
                        status_label(fit.outcome.status),
                    )
                    .trim_end(),
                );
                out.push('\n');
            }
        }
    }

    for (date, reason) in &summary.failed {
        out.push_str(&format!("  (failed {date}) {reason}\n"));
    }

    out.push_str("\nSeries:\n");
    for merge in &summary.merges {
        let action = if merge.written { "updated" } else { "unchanged" };
        out.push_str(&format!(
            "- {:<9} {action}: +{} rows, {} -> {} total\n",
            merge.kind.name(),
            merge.incoming,
            merge.prior,
            merge.total
        ));
    }

    out
}

/// Report for a single `ettj fit`.
pub fn format_fit_report(
    date: NaiveDate,
    family: CurveFamily,
    outcome: &FitOutcome,
    residuals: &[QuoteResidual],
    grid: &[(f64, f64)],
    forwards: &[(f64, f64)],
) -> String {
    let mut out = String::new();
    let p = &outcome.params;

    out.push_str("=== ettj - NSS curve fit ===\n");
    out.push_str(&format!("Date: {date} | Family: {}\n", family.display_name()));
    out.push_str(&format!(
        "Quotes: n={} | SSE={:.6} | RMSE={:.5} | status={}\n",
        outcome.n_points,
        outcome.objective,
        outcome.rmse(),
        status_label(outcome.status)
    ));
    if outcome.n_points < 6 {
        out.push_str("Note: fewer quotes than parameters; parameters are not identified.\n");
    }

    out.push_str("\nParameters:\n");
    out.push_str(&format!(
        "- betas: [{:.6}, {:.6}, {:.6}, {:.6}]\n",
        p.beta0, p.beta1, p.beta2, p.beta3
    ));
    out.push_str(&format!("- taus : [{:.6}, {:.6}]\n", p.tau1, p.tau2));

    out.push_str("\nQuotes vs fit:\n");
    out.push_str(&format!("{:>8} {:>10} {:>10} {:>10}\n", "tenor", "y_obs", "y_fit", "residual"));
    out.push_str(&format!("{:-<8} {:-<10} {:-<10} {:-<10}\n", "", "", "", ""));
    for r in residuals {
        out.push_str(&format!(
            "{:>8.4} {:>10.4} {:>10.4} {:>10.4}\n",
            r.quote.maturity_years, r.quote.yield_percent, r.y_fit, r.residual
        ));
    }

    push_curve_table(&mut out, grid, forwards);
    out
}

/// Report for a curve loaded back from JSON (`ettj curve`).
pub fn format_curve_report(curve: &CurveFile, grid: &[(f64, f64)], forwards: &[(f64, f64)]) -> String {
    let mut out = String::new();
    let p = &curve.params;
    let q = &curve.fit_quality;

    out.push_str(&format!("=== {} - saved {} curve ===\n", curve.tool, curve.model.to_uppercase()));
    out.push_str(&format!("Date: {} | Family: {}\n", curve.date, curve.family.display_name()));
    out.push_str(&format!(
        "Fitted on n={} | RMSE={:.5} | status={}\n",
        q.n,
        q.rmse,
        status_label(q.status)
    ));
    out.push_str(&format!(
        "- betas: [{:.6}, {:.6}, {:.6}, {:.6}]\n",
        p.beta0, p.beta1, p.beta2, p.beta3
    ));
    out.push_str(&format!("- taus : [{:.6}, {:.6}]\n", p.tau1, p.tau2));

    push_curve_table(&mut out, grid, forwards);
    out
}

fn push_curve_table(out: &mut String, grid: &[(f64, f64)], forwards: &[(f64, f64)]) {
    out.push_str(&format!("\nCurve (forward over {FORWARD_HORIZON}y):\n"));
    out.push_str(&format!("{:>8} {:>10} {:>10}\n", "tenor", "yield", "forward"));
    out.push_str(&format!("{:-<8} {:-<10} {:-<10}\n", "", "", ""));
    for &(t, y) in grid {
        let fwd = forwards
            .iter()
            .find(|(ft, _)| *ft == t)
            .map(|(_, f)| format!("{f:>10.4}"))
            .unwrap_or_else(|| format!("{:>10}", "-"));
        out.push_str(&format!("{t:>8.4} {y:>10.4} {fwd}\n"));
    }
}

fn status_label(status: FitStatus) -> &'static str {
    match status {
        FitStatus::Converged => "converged",
        FitStatus::Degraded => "degraded",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveParameters, Quote, SeriesKind};
    use crate::store::MergeSummary;

    fn outcome(status: FitStatus) -> FitOutcome {
        FitOutcome {
            params: CurveParameters {
                beta0: 12.0,
                beta1: -2.0,
                beta2: 1.0,
                beta3: 0.5,
                tau1: 1.0,
                tau2: 5.0,
            },
            objective: 0.0004,
            global_objective: 0.001,
            n_points: 4,
            status,
        }
    }

    #[test]
    fn fit_report_marks_missing_forwards_and_degraded_status() {
        let residual = QuoteResidual {
            quote: Quote::new(1.0, 11.0),
            y_fit: 10.99,
            residual: 0.01,
        };
        let text = format_fit_report(
            NaiveDate::from_ymd_opt(2024, 11, 14).unwrap(),
            CurveFamily::Nominal,
            &outcome(FitStatus::Degraded),
            &[residual],
            &[(0.1, 10.2), (1.0, 11.0)],
            &[(1.0, 11.3)],
        );

        assert!(text.contains("status=degraded"));
        assert!(text.contains("not identified"));
        let short_row = text.lines().find(|l| l.trim_start().starts_with("0.1000")).unwrap();
        assert!(short_row.trim_end().ends_with('-'));
        assert!(text.contains("11.3000"));
    }

    #[test]
    fn curve_report_shows_saved_quality() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        let curve = crate::io::curve_file(date, CurveFamily::Nominal, &outcome(FitStatus::Converged), &[1.0]);
        let text = format_curve_report(&curve, &[(1.0, 11.0), (30.0, 12.4)], &[(1.0, 11.3)]);

        assert!(text.contains("saved NSS curve"));
        assert!(text.contains("Fitted on n=4 | RMSE=0.01000 | status=converged"));
        assert!(text.contains("30.0000"));
    }

    #[test]
    fn run_summary_lists_merges() {
        let summary = RunSummary {
            skipped: vec![NaiveDate::from_ymd_opt(2024, 11, 15).unwrap()],
            merges: vec![MergeSummary {
                kind: SeriesKind::Breakeven,
                prior: 10,
                incoming: 5,
                total: 15,
                written: true,
            }],
            ..RunSummary::default()
        };
        let text = format_run_summary(
            &summary,
            NaiveDate::from_ymd_opt(2024, 11, 11).unwrap(),
            NaiveDate::from_ymd_opt(2024, 11, 15).unwrap(),
        );
        assert!(text.contains("no data=1"));
        assert!(text.contains("breakeven updated: +5 rows, 10 -> 15 total"));
    }
}
