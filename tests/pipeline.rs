use std::fs;

use chrono::NaiveDate;
use ettj_curves::app::pipeline::{CurvePipeline, weekdays};
use ettj_curves::data::SampleSource;
use ettj_curves::data::sample::SAMPLE_VERTICES_DU;
use ettj_curves::domain::{CurveRecord, PipelineConfig, SeriesKind};
use ettj_curves::fit::CurveFitter;
use ettj_curves::io::CsvSeriesDirectory;
use ettj_curves::store::{CurveSeriesStore, SeriesBackend, merge_records};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn config(dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        tenors: vec![0.25, 1.0, 2.0, 5.0, 10.0],
        real_tenors: Some(vec![1.0, 2.0, 5.0, 10.0, 15.0]),
        output_dir: dir.to_path_buf(),
    }
}

#[test]
fn sample_week_writes_all_series_and_reruns_identically() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    // Mon 2024-11-11 .. Sun 2024-11-17
    let dates = weekdays(d(2024, 11, 11), d(2024, 11, 17));
    assert_eq!(dates.len(), 5);

    let store = CurveSeriesStore::new(CsvSeriesDirectory::new(dir.path()));
    let mut pipeline = CurvePipeline::new(SampleSource::new(42), store, cfg.clone());
    let summary = pipeline.run(&dates).unwrap();

    assert_eq!(summary.days.len(), 5);
    for day in &summary.days {
        for fit in &day.fits {
            assert!(fit.outcome.rmse() < 0.1, "{} rmse {}", day.date, fit.outcome.rmse());
        }
    }

    let backend = pipeline.store().backend();
    let nominal = backend.load(SeriesKind::Nominal).unwrap().unwrap();
    let real = backend.load(SeriesKind::Real).unwrap().unwrap();
    let breakeven = backend.load(SeriesKind::Breakeven).unwrap().unwrap();
    let forward = backend.load(SeriesKind::Forward).unwrap().unwrap();
    assert_eq!(nominal.len(), 5 * 5);
    assert_eq!(real.len(), 5 * 5);
    // inner join: 1, 2, 5, 10
    assert_eq!(breakeven.len(), 5 * 4);
    assert!(breakeven.iter().all(|r| r.tenor != 0.25 && r.tenor != 15.0));
    assert_eq!(forward.len(), 5 * 5);

    // published curves keep the source's business-day vertices
    for kind in [SeriesKind::PublishedNominal, SeriesKind::PublishedReal, SeriesKind::PublishedBreakeven] {
        let rows = backend.load(kind).unwrap().unwrap();
        assert_eq!(rows.len(), 5 * SAMPLE_VERTICES_DU.len(), "{}", kind.name());
        assert_eq!(rows[0].tenor, f64::from(SAMPLE_VERTICES_DU[0]));
    }
    let published = fs::read_to_string(dir.path().join("ettj_published_breakeven.csv")).unwrap();
    assert!(published.starts_with("date,du,rate\n2024-11-11,21"), "{published}");

    let snapshot: Vec<Vec<u8>> = SeriesKind::ALL
        .iter()
        .map(|k| fs::read(dir.path().join(k.file_name())).unwrap())
        .collect();

    let store = CurveSeriesStore::new(CsvSeriesDirectory::new(dir.path()));
    let mut rerun = CurvePipeline::new(SampleSource::new(42), store, cfg);
    rerun.run(&dates).unwrap();

    for (kind, before) in SeriesKind::ALL.iter().zip(&snapshot) {
        let after = fs::read(dir.path().join(kind.file_name())).unwrap();
        assert_eq!(&after, before, "{} changed on re-run", kind.name());
    }
}

#[test]
fn later_run_overwrites_overlapping_dates_only() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());

    let store = CurveSeriesStore::new(CsvSeriesDirectory::new(dir.path()));
    let mut first = CurvePipeline::new(SampleSource::new(1), store, cfg.clone());
    first.run(&weekdays(d(2024, 11, 11), d(2024, 11, 12))).unwrap();
    let before = first.store().records(SeriesKind::Nominal).unwrap();

    let store = CurveSeriesStore::new(CsvSeriesDirectory::new(dir.path()));
    let mut second = CurvePipeline::new(SampleSource::new(2), store, cfg);
    second.run(&weekdays(d(2024, 11, 12), d(2024, 11, 13))).unwrap();
    let after = second.store().records(SeriesKind::Nominal).unwrap();

    assert_eq!(after.len(), 3 * 5);
    let monday = |rs: &[CurveRecord]| -> Vec<CurveRecord> {
        rs.iter().filter(|r| r.date == d(2024, 11, 11)).copied().collect()
    };
    assert_eq!(monday(before.as_slice()), monday(after.as_slice()));

    let tuesday_before: Vec<f64> = before.iter().filter(|r| r.date == d(2024, 11, 12)).map(|r| r.value).collect();
    let tuesday_after: Vec<f64> = after.iter().filter(|r| r.date == d(2024, 11, 12)).map(|r| r.value).collect();
    assert_ne!(tuesday_before, tuesday_after);
}

#[test]
fn documented_fit_and_merge_examples() {
    let quotes = [
        ettj_curves::domain::Quote::new(0.25, 10.0),
        ettj_curves::domain::Quote::new(1.0, 11.0),
        ettj_curves::domain::Quote::new(5.0, 11.8),
        ettj_curves::domain::Quote::new(10.0, 12.0),
    ];
    let mut fitter = CurveFitter::new();
    fitter.fit(&quotes).unwrap();
    let y = fitter.predict(&[1.0, 5.0]).unwrap();
    assert!((y[0] - 11.0).abs() < 0.1);
    assert!((y[1] - 11.8).abs() < 0.1);
    let forward = fitter.forward_rate(1.0, 0.25).unwrap();
    let pair = fitter.predict(&[1.0, 1.25]).unwrap();
    assert!((forward - (1.25 * pair[1] - 1.0 * pair[0]) / 0.25).abs() < 1e-12);

    let rec = |date, value| CurveRecord::new(date, 1.0, value, SeriesKind::Nominal);
    let merged = merge_records(
        &[rec(d(2024, 1, 1), 10.5), rec(d(2023, 12, 31), 10.0)],
        &[rec(d(2024, 1, 1), 11.0)],
    );
    assert_eq!(merged, vec![rec(d(2023, 12, 31), 10.0), rec(d(2024, 1, 1), 11.0)]);
}
