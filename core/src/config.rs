//! Pipeline configuration.
//!
//! RULE: No stage reads paths or tunables from the environment.
//! Every entry point receives a PipelineConfig explicitly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the customer table comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// Pure random generation from the configured seed.
    Synthetic,
    /// Cleaned import of the Telco customer-churn CSV.
    Import,
}

impl std::str::FromStr for SynthesisMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Self::Synthetic),
            "import" => Ok(Self::Import),
            other => Err(anyhow::anyhow!("unknown synthesis mode '{other}'")),
        }
    }
}

/// How synthetic churn labels are drawn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelRule {
    /// Baseline draw, then unconditional redraws for each tripped
    /// threshold in order (tickets, then recency). Last redraw wins.
    Sequential,
    /// One draw with the probability the sequential chain ends on.
    Combined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisParams {
    pub label_rule: LabelRule,
    pub base_churn_probability: f64,
    /// Ticket count strictly above this triggers the support-load redraw.
    pub ticket_threshold: u64,
    pub high_ticket_churn_probability: f64,
    /// Days since last login strictly above this triggers the recency redraw.
    pub recency_threshold_days: u64,
    pub inactive_churn_probability: f64,
    pub max_tickets: u64,
    pub max_recency_days: u64,
    pub max_tenure_months: u64,
    pub min_monthly_spend: f64,
    pub max_monthly_spend: f64,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            label_rule: LabelRule::Combined,
            base_churn_probability: 0.10,
            ticket_threshold: 5,
            high_ticket_churn_probability: 0.60,
            recency_threshold_days: 20,
            inactive_churn_probability: 0.50,
            max_tickets: 10,
            max_recency_days: 30,
            max_tenure_months: 72,
            min_monthly_spend: 50.0,
            max_monthly_spend: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Fraction of labeled rows held out for accuracy.
    pub test_fraction: f64,
    pub high_risk_threshold: f64,
    pub top_features: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            test_fraction: 0.2,
            high_risk_threshold: crate::types::HIGH_RISK_THRESHOLD,
            top_features: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightParams {
    /// Average ticket load above which the support segment is Critical.
    pub ticket_threshold: f64,
}

impl Default for InsightParams {
    fn default() -> Self {
        Self { ticket_threshold: 5.0 }
    }
}

/// Retry policy for the daily refresh (synthesize, then insights).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleParams {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_delay_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: SynthesisMode,
    /// CSV input for import mode.
    pub source_path: PathBuf,
    pub db_path: String,
    pub table: String,
    pub artifact_path: PathBuf,
    pub policy_dir: PathBuf,
    pub seed: u64,
    pub population: usize,
    pub synthesis: SynthesisParams,
    pub model: ModelParams,
    pub insight: InsightParams,
    pub schedule: ScheduleParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: SynthesisMode::Synthetic,
            source_path: PathBuf::from("data/WA_Fn-UseC_-Telco-Customer-Churn.csv"),
            db_path: "data/enterprise_data.db".into(),
            table: "customer_metrics".into(),
            artifact_path: PathBuf::from("data/ml_insights.json"),
            policy_dir: PathBuf::from("docs"),
            seed: 42,
            population: 1000,
            synthesis: SynthesisParams::default(),
            model: ModelParams::default(),
            insight: InsightParams::default(),
            schedule: ScheduleParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage can run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let probs = [
            ("base_churn_probability", self.synthesis.base_churn_probability),
            ("high_ticket_churn_probability", self.synthesis.high_ticket_churn_probability),
            ("inactive_churn_probability", self.synthesis.inactive_churn_probability),
            ("test_fraction", self.model.test_fraction),
            ("high_risk_threshold", self.model.high_risk_threshold),
        ];
        for (name, p) in probs {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("{name} must be in [0, 1], got {p}");
            }
        }
        if self.model.n_trees == 0 {
            anyhow::bail!("model.n_trees must be > 0");
        }
        if self.synthesis.min_monthly_spend < 0.0
            || self.synthesis.max_monthly_spend < self.synthesis.min_monthly_spend
        {
            anyhow::bail!("monthly spend range is invalid");
        }
        if self.synthesis.max_tenure_months == 0 {
            anyhow::bail!("synthesis.max_tenure_months must be > 0");
        }
        Ok(())
    }

    /// Config with small, fast settings for use in tests.
    pub fn default_test() -> Self {
        Self {
            db_path: ":memory:".into(),
            artifact_path: PathBuf::from("ml_insights.json"),
            population: 200,
            model: ModelParams {
                n_trees: 15,
                max_depth: 6,
                ..ModelParams::default()
            },
            schedule: ScheduleParams {
                max_retries: 1,
                retry_delay_secs: 0,
            },
            ..Self::default()
        }
    }
}
