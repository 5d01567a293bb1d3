//! intel-runner: headless runner for the churn insight pipeline.
//!
//! Usage:
//!   intel-runner generate --seed 42 --population 1000 --db data/enterprise_data.db
//!   intel-runner generate --mode import --source data/telco.csv
//!   intel-runner insights --artifact data/ml_insights.json
//!   intel-runner refresh  --config pipeline.json
//!   intel-runner policy retention

use anyhow::Result;
use churn_intel_core::{
    config::{PipelineConfig, SynthesisMode},
    insight::InsightReport,
    pipeline,
    policy::PolicyLibrary,
};
use std::env;
use std::path::PathBuf;

#[derive(serde::Serialize)]
struct RunSummary<'a> {
    command: &'a str,
    started_at: String,
    finished_at: String,
    seed: u64,
    mode: SynthesisMode,
    rows_written: Option<usize>,
    total_customers: Option<usize>,
    at_risk_count: Option<usize>,
    artifact_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("refresh");
    let config = build_config(&args)?;

    if command == "policy" {
        let topic = args.get(2).map(String::as_str).unwrap_or_default();
        println!("{}", PolicyLibrary::new(&config.policy_dir).lookup_or_explain(topic));
        return Ok(());
    }

    let started_at = chrono::Utc::now();
    let mut summary = RunSummary {
        command,
        started_at: started_at.to_rfc3339(),
        finished_at: String::new(),
        seed: config.seed,
        mode: config.mode,
        rows_written: None,
        total_customers: None,
        at_risk_count: None,
        artifact_path: None,
    };

    match command {
        "generate" => {
            summary.rows_written = Some(pipeline::generate_dataset(&config)?);
        }
        "insights" => {
            let report = pipeline::compute_insights(&config)?;
            fill_from_report(&mut summary, &report, &config);
        }
        "refresh" => {
            let run = pipeline::run_daily_refresh(&config)?;
            summary.rows_written = Some(run.rows_written);
            summary.total_customers = Some(run.total_customers);
            summary.at_risk_count = Some(run.at_risk_count);
            summary.artifact_path = Some(run.artifact_path);
        }
        other => anyhow::bail!("unknown command '{other}' (expected generate|insights|refresh|policy)"),
    }

    summary.finished_at = chrono::Utc::now().to_rfc3339();
    log::info!(
        "runner: {command} finished in {}ms",
        (chrono::Utc::now() - started_at).num_milliseconds()
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn fill_from_report(summary: &mut RunSummary<'_>, report: &InsightReport, config: &PipelineConfig) {
    summary.total_customers = Some(report.summary.total_customers);
    summary.at_risk_count = Some(report.summary.at_risk_count);
    summary.artifact_path = Some(config.artifact_path.clone());
}

/// Config file (if given) with command-line overrides on top.
fn build_config(args: &[String]) -> Result<PipelineConfig> {
    let mut config = match flag(args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.seed = parse_arg(args, "--seed", config.seed);
    config.population = parse_arg(args, "--population", config.population);
    if let Some(mode) = flag(args, "--mode") {
        config.mode = mode.parse()?;
    }
    if let Some(db) = flag(args, "--db") {
        config.db_path = db.to_string();
    }
    if let Some(source) = flag(args, "--source") {
        config.source_path = PathBuf::from(source);
    }
    if let Some(artifact) = flag(args, "--artifact") {
        config.artifact_path = PathBuf::from(artifact);
    }
    if let Some(dir) = flag(args, "--policy-dir") {
        config.policy_dir = PathBuf::from(dir);
    }
    config.validate()?;
    Ok(config)
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
