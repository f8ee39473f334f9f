//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - initialises logging
//! - builds the quote source and series store for `run`
//! - fits and prints a single curve for `fit`
//! - re-evaluates a saved curve for `curve`

use std::path::Path;

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CurveArgs, DEFAULT_TENORS, FitArgs, RunArgs, SourceKind};
use crate::data::{AnbimaClient, QuoteSource, SampleSource};
use crate::domain::{CurveFamily, PipelineConfig};
use crate::error::{AppError, CurveError};
use crate::fit::CurveFitter;
use crate::io::{CsvQuoteFile, CsvSeriesDirectory, MODEL_NAME, curve_file, read_curve_json, write_curve_json};
use crate::store::CurveSeriesStore;

pub mod pipeline;

use pipeline::{CurvePipeline, FORWARD_HORIZON, MIN_FORWARD_TENOR, previous_week, weekdays};

/// Entry point for the `ettj` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Fit(args) => handle_fit(args),
        Command::Curve(args) => handle_curve(args),
    }
}

/// Logs go to stderr so stdout carries only reports.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args)?;
    let (start, end) = match (args.start, args.end) {
        (Some(start), Some(end)) => (start, end),
        _ => previous_week(Local::now().date_naive()),
    };
    if start > end {
        return Err(AppError::new(2, format!("Start date {start} is after end date {end}.")));
    }

    let dates = weekdays(start, end);
    info!(%start, %end, weekdays = dates.len(), output = %config.output_dir.display(), "starting run");

    let source = build_source(&args)?;
    let store = CurveSeriesStore::new(CsvSeriesDirectory::new(&config.output_dir));
    let mut pipeline = CurvePipeline::new(source, store, config);

    let summary = pipeline.run(&dates)?;
    println!("{}", crate::report::format_run_summary(&summary, start, end));

    if summary.days.is_empty() {
        return Err(AppError::new(3, format!("No quotes found between {start} and {end}.")));
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let tenors = resolve_tenors(args.tenors.as_deref(), "--tenors")?;
    let file = CsvQuoteFile::open(&args.quotes)?;

    let set = file
        .get(args.date)
        .ok_or_else(|| AppError::new(3, format!("No quotes for {} in '{}'.", args.date, args.quotes.display())))?;
    let mut quotes = set.quotes(args.family).to_vec();
    if quotes.is_empty() {
        return Err(AppError::new(
            3,
            format!("No {} quotes for {}.", args.family.display_name(), args.date),
        ));
    }
    quotes.sort_by(|a, b| a.maturity_years.total_cmp(&b.maturity_years));

    let mut fitter = CurveFitter::new();
    let outcome = fitter.fit(&quotes)?;

    let residuals = crate::report::compute_residuals(&quotes, &outcome.params)?;
    let (grid, forwards) = curve_table(&fitter, &tenors)?;

    println!(
        "{}",
        crate::report::format_fit_report(args.date, args.family, &outcome, &residuals, &grid, &forwards)
    );

    if let Some(path) = &args.export_curve {
        export_curve(path, args.date, args.family, &outcome, &tenors)?;
    }
    Ok(())
}

fn handle_curve(args: CurveArgs) -> Result<(), AppError> {
    let curve = read_curve_json(&args.curve)?;
    if curve.model != MODEL_NAME {
        return Err(AppError::new(
            2,
            format!("Unsupported curve model '{}' in '{}'.", curve.model, args.curve.display()),
        ));
    }

    let tenors = match args.tenors.as_deref() {
        Some(list) => resolve_tenors(Some(list), "--tenors")?,
        None if curve.grid.tenor_years.is_empty() => DEFAULT_TENORS.to_vec(),
        None => curve.grid.tenor_years.clone(),
    };
    debug!(path = %args.curve.display(), tenors = tenors.len(), "evaluating saved curve");

    let fitter = CurveFitter::with_params(curve.params);
    let (grid, forwards) = curve_table(&fitter, &tenors)?;
    println!("{}", crate::report::format_curve_report(&curve, &grid, &forwards));
    Ok(())
}

/// Yields on `tenors` plus forwards for the tenors that get one.
fn curve_table(fitter: &CurveFitter, tenors: &[f64]) -> Result<(Vec<(f64, f64)>, Vec<(f64, f64)>), CurveError> {
    let values = fitter.predict(tenors)?;
    let grid: Vec<(f64, f64)> = tenors.iter().copied().zip(values).collect();
    let forwards = tenors
        .iter()
        .filter(|&&t| t >= MIN_FORWARD_TENOR)
        .map(|&t| fitter.forward_rate(t, FORWARD_HORIZON).map(|f| (t, f)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((grid, forwards))
}

fn export_curve(
    path: &Path,
    date: NaiveDate,
    family: CurveFamily,
    outcome: &crate::domain::FitOutcome,
    tenors: &[f64],
) -> Result<(), AppError> {
    write_curve_json(path, &curve_file(date, family, outcome, tenors))?;
    info!(path = %path.display(), "curve exported");
    Ok(())
}

fn build_source(args: &RunArgs) -> Result<Box<dyn QuoteSource>, AppError> {
    Ok(match args.source {
        SourceKind::Anbima => Box::new(AnbimaClient::from_env()),
        SourceKind::Sample => {
            debug!(seed = args.seed, "using synthetic quotes");
            Box::new(SampleSource::new(args.seed))
        }
        SourceKind::Csv => {
            let path = args
                .quotes
                .as_ref()
                .ok_or_else(|| AppError::new(2, "`--source csv` requires `--quotes`."))?;
            Box::new(CsvQuoteFile::open(path)?)
        }
    })
}

pub fn pipeline_config_from_args(args: &RunArgs) -> Result<PipelineConfig, AppError> {
    let tenors = resolve_tenors(args.tenors.as_deref(), "--tenors")?;
    let real_tenors = match args.real_tenors.as_deref() {
        Some(list) => Some(resolve_tenors(Some(list), "--real-tenors")?),
        None => None,
    };
    Ok(PipelineConfig {
        tenors,
        real_tenors,
        output_dir: args.output_dir.clone(),
    })
}

/// Validate a tenor list, falling back to `DEFAULT_TENORS`.
fn resolve_tenors(list: Option<&[f64]>, flag: &str) -> Result<Vec<f64>, AppError> {
    let Some(list) = list else {
        return Ok(DEFAULT_TENORS.to_vec());
    };
    if list.is_empty() {
        return Err(AppError::new(2, format!("`{flag}` must list at least one tenor.")));
    }
    if let Some(bad) = list.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
        return Err(AppError::new(2, format!("`{flag}` has an invalid tenor: {bad}.")));
    }
    Ok(list.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_real_override() {
        let cli = Cli::parse_from(["ettj", "run", "--real-tenors", "1,5"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = pipeline_config_from_args(&args).unwrap();
        assert_eq!(config.tenors, DEFAULT_TENORS.to_vec());
        assert_eq!(config.real_tenors(), &[1.0, 5.0]);
        assert_eq!(config.output_dir, Path::new("output"));
    }

    #[test]
    fn curve_table_skips_forwards_below_minimum_tenor() {
        let fitter = CurveFitter::with_params(crate::domain::CurveParameters {
            beta0: 12.0,
            beta1: -2.0,
            beta2: 1.0,
            beta3: 0.0,
            tau1: 1.0,
            tau2: 5.0,
        });
        let (grid, forwards) = curve_table(&fitter, &[0.1, 1.0, 5.0]).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(forwards.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![1.0, 5.0]);
        assert_eq!(forwards[0].1, fitter.forward_rate(1.0, FORWARD_HORIZON).unwrap());
    }

    #[test]
    fn negative_tenor_is_rejected() {
        let err = resolve_tenors(Some(&[1.0, -2.0]), "--tenors").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
