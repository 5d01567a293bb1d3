//! Churn risk model: encode, split, train, rank features, score.
//!
//! Execution:
//!   1. Validate records against the schema descriptor.
//!   2. Encode categoricals to first-seen integer codes (one encoder per run).
//!   3. Shuffle labeled rows (split stream) and hold out the test fraction.
//!   4. Fit the forest on the training rows (forest stream).
//!   5. Score every record, labeled or not.

use crate::{
    config::ModelParams,
    error::{PipelineError, PipelineResult},
    forest::{ForestParams, RandomForest},
    record::{CustomerRecord, ScoredRecord, Value},
    rng::{RngBank, StageSlot},
    schema::TableSchema,
    types::UNKNOWN,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One ranked feature, as written to the insight artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone)]
pub struct RiskModelOutput {
    /// Held-out accuracy; None when too few labeled rows for a test split.
    pub accuracy: Option<f64>,
    /// Top features by importance, descending.
    pub top_features: Vec<RiskFactor>,
    pub scored: Vec<ScoredRecord>,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl RiskModelOutput {
    pub fn high_risk_count(&self, threshold: f64) -> usize {
        self.scored.iter().filter(|s| s.is_high_risk(threshold)).count()
    }
}

/// Maps each categorical column's values to integer codes.
#[derive(Debug, Default)]
pub struct CategoryEncoder {
    codes: HashMap<usize, HashMap<String, f64>>,
}

impl CategoryEncoder {
    pub fn encode(&mut self, column: usize, value: &str) -> f64 {
        let codes = self.codes.entry(column).or_default();
        let next = codes.len() as f64;
        *codes.entry(value.to_string()).or_insert(next)
    }

    pub fn encode_row(&mut self, record: &CustomerRecord) -> Vec<f64> {
        record
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                Value::Number(n) => *n,
                Value::Text(s) => self.encode(i, s),
            })
            .collect()
    }
}

pub fn train_and_score(
    records: &[CustomerRecord],
    schema: &TableSchema,
    params: &ModelParams,
    bank: &RngBank,
) -> PipelineResult<RiskModelOutput> {
    if records.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "table '{}' has no rows",
            schema.table
        )));
    }
    let Some(label) = schema.label_column() else {
        return Err(PipelineError::EmptyDataset(format!(
            "table '{}' has no label column",
            schema.table
        )));
    };
    for record in records {
        schema.check_record(record)?;
    }

    let mut encoder = CategoryEncoder::default();
    let features: Vec<Vec<f64>> = records.iter().map(|r| encoder.encode_row(r)).collect();

    let mut labeled: Vec<usize> = (0..records.len())
        .filter(|&i| records[i].churn.is_some())
        .collect();
    if labeled.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no row of '{}' has a '{}' value",
            schema.table, label.name
        )));
    }

    let mut split_rng = bank.for_stage(StageSlot::Split);
    split_rng.shuffle(&mut labeled);
    let n_test = ((labeled.len() as f64 * params.test_fraction).ceil() as usize)
        .min(labeled.len() - 1);
    let (test, train) = labeled.split_at(n_test);

    let label_of = |i: usize| records[i].churn.unwrap_or(0);
    let train_x: Vec<Vec<f64>> = train.iter().map(|&i| features[i].clone()).collect();
    let train_y: Vec<u8> = train.iter().map(|&i| label_of(i)).collect();

    let mut forest_rng = bank.for_stage(StageSlot::Forest);
    let forest = RandomForest::fit(
        &train_x,
        &train_y,
        ForestParams {
            n_trees: params.n_trees,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
        },
        &mut forest_rng,
    )?;

    let accuracy = if test.is_empty() {
        None
    } else {
        let correct = test
            .iter()
            .filter(|&&i| {
                let predicted = (forest.predict_proba(&features[i]) > 0.5) as u8;
                predicted == label_of(i)
            })
            .count();
        Some(correct as f64 / test.len() as f64)
    };

    let top_features = rank_features(schema, &forest.feature_importances(), params.top_features);

    let scored: Vec<ScoredRecord> = records
        .iter()
        .zip(&features)
        .map(|(record, row)| ScoredRecord {
            record: record.clone(),
            churn_probability: forest.predict_proba(row).clamp(0.0, 1.0),
        })
        .collect();

    let output = RiskModelOutput {
        accuracy,
        top_features,
        scored,
        train_rows: train.len(),
        test_rows: test.len(),
    };
    log::info!(
        "risk_model: trained {} trees on {} rows, tested on {} (accuracy={}), {} high-risk",
        forest.tree_count(),
        output.train_rows,
        output.test_rows,
        output
            .accuracy
            .map(|a| format!("{:.3}", a))
            .unwrap_or_else(|| "n/a".into()),
        output.high_risk_count(params.high_risk_threshold),
    );
    Ok(output)
}

/// Feature names paired with importances, descending, first `k`.
/// Ties keep table order.
pub fn rank_features(schema: &TableSchema, importances: &[f64], k: usize) -> Vec<RiskFactor> {
    let mut ranked: Vec<RiskFactor> = schema
        .feature_columns()
        .zip(importances)
        .map(|(c, &importance)| RiskFactor {
            feature: c.name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(k);
    ranked
}

// ── High-risk aggregates ─────────────────────────────────────────────────────
//
// These never fail on an empty high-risk subset: the mode degrades to
// "Unknown" and the mean to 0.0.

pub fn high_risk<'a>(scored: &'a [ScoredRecord], threshold: f64) -> Vec<&'a ScoredRecord> {
    scored.iter().filter(|s| s.is_high_risk(threshold)).collect()
}

/// Most frequent text value of feature `index` among high-risk rows.
/// Ties go to the alphabetically first value.
pub fn high_risk_mode(scored: &[ScoredRecord], index: usize, threshold: f64) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in high_risk(scored, threshold) {
        if let Some(v) = s.record.values.get(index).and_then(Value::as_text) {
            *counts.entry(v).or_default() += 1;
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Mean of numeric feature `index` among high-risk rows.
pub fn high_risk_mean(scored: &[ScoredRecord], index: usize, threshold: f64) -> f64 {
    let values: Vec<f64> = high_risk(scored, threshold)
        .iter()
        .filter_map(|s| s.record.values.get(index).and_then(Value::as_number))
        .collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
