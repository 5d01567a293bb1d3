//! Insight synthesizer: aggregates the scored population into the
//! persisted JSON artifact read by the agent layer.
//!
//! The artifact is fully regenerated on every run. It holds aggregates
//! only, never references to individual customers.

use crate::{
    config::InsightParams,
    error::{PipelineError, PipelineResult},
    record::ScoredRecord,
    risk_model::{high_risk, high_risk_mean, high_risk_mode, RiskFactor},
    schema::TableSchema,
    types::UNKNOWN,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

// ── Artifact shape ───────────────────────────────────────────────────────────
// Field order here is the key order on disk.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub summary: InsightSummary,
    pub critical_segments: Vec<CriticalSegment>,
    pub recommendations_foundation: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_risk_factors: Option<Vec<RiskFactor>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub total_customers: usize,
    pub high_risk_percentage: String,
    pub at_risk_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_accuracy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalSegment {
    pub segment_name: String,
    pub risk_score: RiskLevel,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Qualitative label for the share of high-risk customers.
    pub fn for_share(share: f64) -> Self {
        if share >= 0.25 {
            Self::Critical
        } else if share >= 0.10 {
            Self::High
        } else if share > 0.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

/// "12.34%" for a fraction; 0.00% when the denominator is zero.
pub fn percentage(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.00%".into();
    }
    format!("{:.2}%", part as f64 / whole as f64 * 100.0)
}

fn column_title(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Synthesis ────────────────────────────────────────────────────────────────

pub fn synthesize_insights(
    scored: &[ScoredRecord],
    schema: &TableSchema,
    accuracy: Option<f64>,
    top_features: &[RiskFactor],
    threshold: f64,
    params: &InsightParams,
) -> PipelineResult<InsightReport> {
    let roles = &schema.roles;
    let index_of = |name: &str| {
        schema.feature_index(name).ok_or_else(|| {
            PipelineError::DataFormat(format!("column '{name}' is not a feature of '{}'", schema.table))
        })
    };

    let total = scored.len();
    let at_risk = high_risk(scored, threshold).len();
    let share = if total == 0 { 0.0 } else { at_risk as f64 / total as f64 };

    let summary = InsightSummary {
        total_customers: total,
        high_risk_percentage: percentage(at_risk, total),
        at_risk_count: at_risk,
        model_accuracy: accuracy.map(|a| format!("{:.2}%", a * 100.0)),
    };

    let segment_title = column_title(&roles.segment_column);
    let segment_value = high_risk_mode(scored, index_of(roles.segment_column.as_str())?, threshold);
    let segment_name = format!("{segment_title}: {segment_value}");
    let avg_spend = high_risk_mean(scored, index_of(roles.spend_column.as_str())?, threshold);
    let primary_driver = top_features
        .first()
        .map(|f| f.feature.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let mut critical_segments = vec![CriticalSegment {
        segment_name: segment_name.clone(),
        risk_score: RiskLevel::for_share(share),
        reasoning: format!(
            "This {} has the highest concentration of at-risk customers. \
             Average {} among at-risk customers is {avg_spend:.2}.",
            segment_title.to_lowercase(),
            roles.spend_column
        ),
    }];

    if let Some(load_column) = &roles.load_column {
        let avg_load = high_risk_mean(scored, index_of(load_column.as_str())?, threshold);
        critical_segments.push(CriticalSegment {
            segment_name: "High Support Load".into(),
            risk_score: if avg_load > params.ticket_threshold {
                RiskLevel::Critical
            } else {
                RiskLevel::High
            },
            reasoning: format!(
                "At-risk customers are averaging {avg_load:.1} support tickets. \
                 Primary driver: {primary_driver}."
            ),
        });
    }

    let recommendations_foundation = vec![
        format!("Initiate high-touch outreach for accounts in {segment_name}."),
        match roles.load_column {
            Some(_) => format!(
                "Deploy specialized success managers for accounts with more than {} support tickets.",
                params.ticket_threshold
            ),
            None => "Deploy specialized success managers for technical support escalations.".into(),
        },
        format!(
            "Review contract types for high-spend clients (at-risk average {avg_spend:.2}) \
             showing low usage, starting with the '{primary_driver}' driver."
        ),
    ];

    log::info!(
        "insight: {total} customers, {at_risk} high-risk, critical segment '{segment_name}'"
    );

    Ok(InsightReport {
        summary,
        critical_segments,
        recommendations_foundation,
        top_risk_factors: if top_features.is_empty() {
            None
        } else {
            Some(top_features.to_vec())
        },
    })
}

// ── Persistence ──────────────────────────────────────────────────────────────

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `report` as 4-space-indented JSON, via a temp file renamed over
/// `path`. Readers see the old artifact or the new one, never a torn one.
pub fn persist(report: &InsightReport, path: &Path) -> PipelineResult<()> {
    let fail = |what: &str, e: std::io::Error| {
        PipelineError::Persistence(format!("{what} {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| fail("cannot create directory for", e))?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    report.serialize(&mut ser)?;
    buf.push(b'\n');

    let tmp = temp_path(path);
    let written = File::create(&tmp)
        .map_err(|e| fail("cannot write temp file for", e))
        .and_then(|mut file| {
            file.write_all(&buf)
                .and_then(|_| file.sync_all())
                .map_err(|e| fail("cannot flush temp file for", e))
        })
        .and_then(|_| fs::rename(&tmp, path).map_err(|e| fail("cannot move artifact into", e)));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    log::info!("insight: artifact saved to {}", path.display());
    Ok(())
}

/// Read an artifact back. Tolerates a missing `top_risk_factors`.
pub fn load(path: &Path) -> PipelineResult<InsightReport> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::MissingSource(format!("insight artifact {} not found", path.display()))
        } else {
            PipelineError::Persistence(format!("cannot read {}: {e}", path.display()))
        }
    })?;
    serde_json::from_str(&content)
        .map_err(|e| PipelineError::DataFormat(format!("invalid artifact {}: {e}", path.display())))
}
