use approx::assert_relative_eq;
use ev_insights::app::{DashboardError, ModelStatus};
use ev_insights::charts::ImageFormat;
use ev_insights::config::TrainingConfig;
use ev_insights::data::{LoaderError, ProcessorError};
use ev_insights::model::BoostingParams;
use ev_insights::{AppConfig, Dashboard, ForecastInput};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const REGIONS: [(&str, f64); 4] = [
    ("China", 800_000.0),
    ("Europe", 450_000.0),
    ("USA", 120_000.0),
    ("World", 1_500_000.0),
];

fn sales(base: f64, year: i32) -> f64 {
    (base * 1.4f64.powi(year - 2018)).round()
}

fn write_dataset(path: &Path) {
    let mut csv = String::from("region,category,parameter,mode,powertrain,year,unit,value\n");
    for (region, base) in REGIONS {
        for year in 2018..=2023 {
            writeln!(csv, "{region},Historical,EV sales,Cars,BEV,{year},Vehicles,{}", sales(base, year)).unwrap();
            writeln!(csv, "{region},Historical,EV stock,Cars,BEV,{year},Vehicles,{}", sales(base, year) * 3.0).unwrap();
        }
    }
    fs::write(path, csv).unwrap();
}

fn config(dir: &Path) -> AppConfig {
    let data_path = dir.join("sales.csv");
    write_dataset(&data_path);
    AppConfig {
        data_path,
        model_path: dir.join("models").join("gbr_pipeline.json"),
        typing_delay_ms: 0,
        training: TrainingConfig {
            boosting: BoostingParams {
                n_estimators: 300,
                ..BoostingParams::default()
            },
            test_fraction: 0.0,
            seed: 42,
        },
        ..AppConfig::default()
    }
}

fn input(region: &str, year: i32) -> ForecastInput {
    ForecastInput {
        region: region.to_string(),
        mode: "Cars".to_string(),
        powertrain: "BEV".to_string(),
        category: "Historical".to_string(),
        year,
    }
}

#[test]
fn chat_answers_come_from_named_regions_only() {
    let dir = tempfile::tempdir().unwrap();
    let dashboard = Dashboard::initialise(config(dir.path()));

    let summary = dashboard.summary();
    assert_eq!(summary.regions, 3);
    assert_eq!(summary.latest_year, Some(2023));
    assert_eq!(summary.records, 18);

    let top = dashboard.answer("What are the top 2 regions?");
    assert!(top.starts_with("Here are the Top 2 regions by total EV sales:"));
    assert!(top.contains("1. **China**"));
    assert!(top.contains("2. **Europe**"));
    assert!(!top.contains("World"));

    let peak = dashboard.answer("Which year had the highest sales?");
    assert!(peak.contains("**2023**"), "{peak}");

    let options = dashboard.prediction_options().unwrap();
    assert_eq!(options.regions, vec!["China", "Europe", "USA", "World"]);
    assert_eq!(options.modes, vec!["Cars"]);
}

#[test]
fn reload_reuses_views_loaded_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let data_path = config.data_path.clone();
    let mut dashboard = Dashboard::initialise(config);
    assert!(dashboard.data().is_some());

    fs::remove_file(&data_path).unwrap();
    assert!(dashboard.reload_data().unwrap());
    assert_eq!(dashboard.summary().records, 18);
}

#[test]
fn trained_model_reproduces_training_rows_and_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let model_path = config.model_path.clone();

    let mut dashboard = Dashboard::initialise(config.clone());
    assert!(matches!(dashboard.model_status(), ModelStatus::Unavailable(_)));

    let report = dashboard.train().unwrap();
    assert_eq!(report.train_rows, 24);
    assert_eq!(report.holdout_rows, 0);
    assert!(model_path.exists());

    let model = dashboard.model_status().model().unwrap();
    for (region, base) in REGIONS {
        let actual = sales(base, 2021);
        assert_relative_eq!(model.predict(&input(region, 2021)), actual, max_relative = 0.01);
    }

    let reloaded = Dashboard::initialise(config);
    let a = dashboard.predict(&input("Europe", 2030)).unwrap();
    let b = reloaded.predict(&input("Europe", 2030)).unwrap();
    assert_eq!(a.to_bits(), b.to_bits());
}

#[test]
fn unseen_region_still_gets_a_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let mut dashboard = Dashboard::initialise(config(dir.path()));
    dashboard.train().unwrap();

    let estimate = dashboard.predict(&input("Mars", 2030)).unwrap();
    assert!(estimate.is_finite());
    assert!(estimate >= 0.0);
}

#[test]
fn upload_without_value_column_is_rejected_before_charting() {
    let dir = tempfile::tempdir().unwrap();
    let dashboard = Dashboard::initialise(config(dir.path()));

    let upload = dir.path().join("upload.csv");
    fs::write(&upload, "region,year,parameter\nChina,2021,EV sales\n").unwrap();
    let out_dir = dir.path().join("charts");

    let err = dashboard
        .analyze_upload(&upload, &out_dir, ImageFormat::Png)
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("Your CSV is missing required columns: value"));
    match err {
        DashboardError::Loader(LoaderError::Processor(ProcessorError::MissingColumns { missing })) => {
            assert_eq!(missing, vec!["value".to_string()]);
        }
        other => panic!("expected missing column error, got {other:?}"),
    }
    assert!(!out_dir.exists());
}
