//! End-to-end refresh and the bounded retry around it.

use churn_intel_core::{
    compute_insights,
    config::{PipelineConfig, SynthesisMode},
    error::PipelineError,
    generate_dataset,
    insight,
    pipeline::{self, RefreshSchedule},
    store::DatasetStore,
};
use std::{cell::Cell, time::Duration};

fn file_config(dir: &std::path::Path) -> PipelineConfig {
    let mut config = PipelineConfig::default_test();
    config.db_path = dir.join("enterprise_data.db").to_string_lossy().into_owned();
    config.artifact_path = dir.join("data").join("ml_insights.json");
    config
}

#[test]
fn generate_then_compute_writes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());

    assert_eq!(generate_dataset(&config).unwrap(), config.population);
    let report = compute_insights(&config).unwrap();

    assert_eq!(insight::load(&config.artifact_path).unwrap(), report);
    assert_eq!(report.summary.total_customers, config.population);
}

#[test]
fn run_pipeline_on_in_memory_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default_test();
    config.artifact_path = dir.path().join("ml_insights.json");
    let mut store = DatasetStore::in_memory().unwrap();

    let run = pipeline::run_pipeline_on(&mut store, &config).unwrap();

    assert_eq!(run.rows_written, config.population);
    assert_eq!(run.total_customers, config.population);
    assert!(run.accuracy.is_some());
    assert!(config.artifact_path.exists());
}

#[test]
fn insights_without_a_table_fail_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());

    let err = compute_insights(&config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingSource(_)), "got {err:?}");
    assert!(!config.artifact_path.exists());
}

#[test]
fn retry_recovers_from_one_failure() {
    let schedule = RefreshSchedule {
        max_retries: 1,
        retry_delay: Duration::ZERO,
    };
    let calls = Cell::new(0);

    let out = schedule.run_with_retry(|attempt| {
        calls.set(calls.get() + 1);
        if attempt == 0 {
            Err(PipelineError::Persistence("disk full".into()))
        } else {
            Ok(attempt)
        }
    });

    assert_eq!(out.unwrap(), 1);
    assert_eq!(calls.get(), 2);
}

#[test]
fn retry_gives_up_after_budget() {
    let schedule = RefreshSchedule {
        max_retries: 1,
        retry_delay: Duration::ZERO,
    };
    let calls = Cell::new(0);

    let out: Result<(), _> = schedule.run_with_retry(|_| {
        calls.set(calls.get() + 1);
        Err(PipelineError::EmptyDataset("nothing".into()))
    });

    assert!(matches!(out, Err(PipelineError::EmptyDataset(_))));
    assert_eq!(calls.get(), 2);
}

#[test]
fn daily_refresh_surfaces_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = file_config(dir.path());
    config.mode = SynthesisMode::Import;
    config.source_path = dir.path().join("absent.csv");

    let err = pipeline::run_daily_refresh(&config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingSource(_)), "got {err:?}");
}
