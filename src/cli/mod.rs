//! Command-line parsing for the ETTJ curve pipeline.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting and storage code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::CurveFamily;

/// Tenor grid (years) used when `--tenors` is not given.
pub const DEFAULT_TENORS: [f64; 11] = [0.25, 0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 15.0, 20.0];

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ettj", version, about = "Brazilian ETTJ curve fitter (Nelson-Siegel-Svensson)")]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every weekday in a date range and update the series files.
    Run(RunArgs),
    /// Fit one family for one date from a quotes CSV and print the curve.
    Fit(FitArgs),
    /// Re-evaluate a curve saved with `fit --export-curve`.
    Curve(CurveArgs),
}

/// Where `run` gets its quotes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// ANBIMA ETTJ feed.
    Anbima,
    /// Deterministic synthetic quotes.
    Sample,
    /// Quotes CSV (`--quotes`).
    Csv,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// First date (YYYY-MM-DD). Defaults to Monday of the previous week.
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last date (YYYY-MM-DD), inclusive. Defaults to Friday of the previous week.
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,

    /// Quote source.
    #[arg(long, value_enum, default_value_t = SourceKind::Anbima)]
    pub source: SourceKind,

    /// Quotes CSV (`date,family,maturity_years,yield_percent`), for `--source csv`.
    #[arg(long, value_name = "CSV", required_if_eq("source", "csv"))]
    pub quotes: Option<PathBuf>,

    /// Seed for `--source sample`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Directory holding the `ettj_<series>.csv` files.
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Nominal tenor grid in years, comma separated.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub tenors: Option<Vec<f64>>,

    /// Real tenor grid in years, comma separated. Defaults to `--tenors`.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub real_tenors: Option<Vec<f64>>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Quotes CSV (`date,family,maturity_years,yield_percent`).
    #[arg(long, value_name = "CSV")]
    pub quotes: PathBuf,

    /// Reference date (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,

    /// Curve family to fit.
    #[arg(long, value_enum, default_value_t = CurveFamily::Nominal)]
    pub family: CurveFamily,

    /// Tenor grid in years, comma separated.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub tenors: Option<Vec<f64>>,

    /// Export curve (params + fit quality + grid) to JSON.
    #[arg(long = "export-curve", value_name = "JSON")]
    pub export_curve: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CurveArgs {
    /// Curve JSON file produced by `ettj fit --export-curve`.
    #[arg(long, value_name = "JSON")]
    pub curve: PathBuf,

    /// Tenor grid in years, comma separated. Defaults to the saved grid.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub tenors: Option<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_parses_tenor_lists_and_dates() {
        let cli = Cli::parse_from([
            "ettj",
            "run",
            "--start",
            "2024-11-11",
            "--end",
            "2024-11-15",
            "--source",
            "sample",
            "--tenors",
            "0.5,1,5",
            "-v",
        ]);
        assert!(cli.verbose);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2024, 11, 11));
        assert_eq!(args.source, SourceKind::Sample);
        assert_eq!(args.tenors, Some(vec![0.5, 1.0, 5.0]));
        assert!(args.real_tenors.is_none());
    }

    #[test]
    fn csv_source_requires_quotes() {
        assert!(Cli::try_parse_from(["ettj", "run", "--source", "csv"]).is_err());
        assert!(Cli::try_parse_from(["ettj", "run", "--start", "2024-11-11"]).is_err());
    }

    #[test]
    fn fit_accepts_real_family() {
        let cli = Cli::try_parse_from([
            "ettj", "fit", "--quotes", "q.csv", "--date", "2024-11-14", "--family", "real",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.family, CurveFamily::InflationLinked);
    }

    #[test]
    fn curve_takes_a_saved_file() {
        let cli = Cli::try_parse_from(["ettj", "curve", "--curve", "c.json", "--tenors", "2,30"]).unwrap();
        let Command::Curve(args) = cli.command else {
            panic!("expected curve");
        };
        assert_eq!(args.curve, PathBuf::from("c.json"));
        assert_eq!(args.tenors, Some(vec![2.0, 30.0]));
        assert!(Cli::try_parse_from(["ettj", "curve"]).is_err());
    }
}
