//! Pipeline entry points.
//!
//! EXECUTION ORDER (fixed):
//!   1. Synthesizer      writes the customer table (full replace)
//!   2. Risk model       reads the table, writes nothing
//!   3. Insight          reads model output, writes the JSON artifact
//!
//! RULES:
//!   - Stages share no state except the storage table.
//!   - All randomness flows through the RngBank seeded from the config.
//!   - The pipeline is not retry-aware; RefreshSchedule wraps the whole run.

use crate::{
    config::{PipelineConfig, ScheduleParams},
    error::PipelineResult,
    insight::{self, InsightReport},
    risk_model,
    rng::RngBank,
    schema::TableSchema,
    store::DatasetStore,
    synthesizer,
};
use serde::Serialize;
use std::{path::PathBuf, thread, time::Duration};

/// Outcome of one full refresh.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub rows_written: usize,
    pub total_customers: usize,
    pub at_risk_count: usize,
    pub accuracy: Option<f64>,
    pub artifact_path: PathBuf,
}

/// Synthesize or import the dataset into `config.db_path`.
pub fn generate_dataset(config: &PipelineConfig) -> PipelineResult<usize> {
    let mut store = DatasetStore::open(&config.db_path)?;
    synthesizer::write_dataset(config, &mut store)
}

/// Score the stored table and write the artifact to `config.artifact_path`.
pub fn compute_insights(config: &PipelineConfig) -> PipelineResult<InsightReport> {
    let store = DatasetStore::open(&config.db_path)?;
    compute_insights_from(&store, config)
}

/// As compute_insights, against an already-open store.
pub fn compute_insights_from(
    store: &DatasetStore,
    config: &PipelineConfig,
) -> PipelineResult<InsightReport> {
    score_and_report(store, config).map(|(report, _)| report)
}

fn score_and_report(
    store: &DatasetStore,
    config: &PipelineConfig,
) -> PipelineResult<(InsightReport, Option<f64>)> {
    let schema = TableSchema::for_mode(config.mode, &config.table);
    let records = store.load_table(&schema)?;
    let bank = RngBank::new(config.seed);
    let model = risk_model::train_and_score(&records, &schema, &config.model, &bank)?;
    let report = insight::synthesize_insights(
        &model.scored,
        &schema,
        model.accuracy,
        &model.top_features,
        config.model.high_risk_threshold,
        &config.insight,
    )?;
    insight::persist(&report, &config.artifact_path)?;
    Ok((report, model.accuracy))
}

/// Both stages in order against one store.
pub fn run_pipeline_on(
    store: &mut DatasetStore,
    config: &PipelineConfig,
) -> PipelineResult<PipelineRun> {
    let rows_written = synthesizer::write_dataset(config, store)?;
    let (report, accuracy) = score_and_report(store, config)?;
    log::info!("pipeline: refresh complete ({rows_written} rows)");
    Ok(PipelineRun {
        rows_written,
        total_customers: report.summary.total_customers,
        at_risk_count: report.summary.at_risk_count,
        accuracy,
        artifact_path: config.artifact_path.clone(),
    })
}

/// Both stages in order, opening the store at `config.db_path`.
pub fn run_pipeline(config: &PipelineConfig) -> PipelineResult<PipelineRun> {
    let mut store = DatasetStore::open(&config.db_path)?;
    run_pipeline_on(&mut store, config)
}

/// Bounded retry around a whole pipeline invocation.
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RefreshSchedule {
    pub fn from_params(params: &ScheduleParams) -> Self {
        Self {
            max_retries: params.max_retries,
            retry_delay: Duration::from_secs(params.retry_delay_secs),
        }
    }

    /// Call `attempt` (with the 0-based attempt number) until it succeeds
    /// or `max_retries` retries are spent. Returns the last error.
    pub fn run_with_retry<T, F>(&self, mut attempt: F) -> PipelineResult<T>
    where
        F: FnMut(u32) -> PipelineResult<T>,
    {
        let mut n = 0;
        loop {
            match attempt(n) {
                Ok(v) => return Ok(v),
                Err(e) if n < self.max_retries => {
                    log::warn!(
                        "pipeline: attempt {} failed ({e}); retrying in {}s",
                        n + 1,
                        self.retry_delay.as_secs()
                    );
                    if !self.retry_delay.is_zero() {
                        thread::sleep(self.retry_delay);
                    }
                    n += 1;
                }
                Err(e) => {
                    log::error!("pipeline: attempt {} failed ({e}); giving up", n + 1);
                    return Err(e);
                }
            }
        }
    }
}

/// The daily refresh: synthesize, then insights, under the retry policy.
pub fn run_daily_refresh(config: &PipelineConfig) -> PipelineResult<PipelineRun> {
    RefreshSchedule::from_params(&config.schedule).run_with_retry(|_| run_pipeline(config))
}
