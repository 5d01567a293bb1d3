//! Dataset synthesizer: builds the customer-metrics table.
//!
//! Two sources:
//!   1. Synthetic: seeded pseudo-random customers with biased churn labels.
//!   2. Import: the Telco churn CSV, cleaned and coerced.
//!
//! Either way the table is replaced wholesale (see DatasetStore::replace_table).

use crate::{
    config::{LabelRule, PipelineConfig, SynthesisMode, SynthesisParams},
    error::{PipelineError, PipelineResult},
    record::{CustomerRecord, Value},
    rng::{RngBank, StageRng, StageSlot},
    schema::{ColumnKind, TableSchema},
    store::DatasetStore,
    types::ChurnLabel,
};
use std::path::Path;

pub const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
pub const SECTORS: [&str; 5] = ["Technology", "Retail", "Finance", "Healthcare", "Manufacturing"];
pub const CONTRACT_TYPES: [&str; 3] = ["Monthly", "Annual", "Two-Year"];

/// Build the rows for `config.mode` and replace the table in `store`.
/// Returns the number of rows written.
pub fn write_dataset(config: &PipelineConfig, store: &mut DatasetStore) -> PipelineResult<usize> {
    let schema = TableSchema::for_mode(config.mode, &config.table);
    let rows = match config.mode {
        SynthesisMode::Synthetic => synthetic_population(config),
        SynthesisMode::Import => import_csv(&config.source_path, &schema)?,
    };
    let written = store.replace_table(&schema, &rows)?;
    log::info!(
        "synthesizer: wrote {written} rows to '{}' ({:?}, seed={})",
        schema.table,
        config.mode,
        config.seed
    );
    Ok(written)
}

// ── Synthetic ────────────────────────────────────────────────────────────────

/// `config.population` customers drawn from the synthesizer stream.
pub fn synthetic_population(config: &PipelineConfig) -> Vec<CustomerRecord> {
    let mut rng = RngBank::new(config.seed).for_stage(StageSlot::Synthesizer);
    (0..config.population)
        .map(|i| synthesize_customer(i, &config.synthesis, &mut rng))
        .collect()
}

fn synthesize_customer(index: usize, params: &SynthesisParams, rng: &mut StageRng) -> CustomerRecord {
    let region = *rng.pick(&REGIONS);
    let sector = *rng.pick(&SECTORS);
    let contract = *rng.pick(&CONTRACT_TYPES);
    let tenure_months = rng.range_inclusive(1, params.max_tenure_months);
    let spend = rng.uniform(params.min_monthly_spend, params.max_monthly_spend);
    let monthly_spend = (spend * 100.0).round() / 100.0;
    let ticket_count = rng.range_inclusive(0, params.max_tickets);
    let days_since_last_login = rng.range_inclusive(0, params.max_recency_days);

    let churn = draw_churn_label(params, ticket_count, days_since_last_login, rng);

    CustomerRecord {
        customer_id: format!("CUST-{:05}", index + 1),
        values: vec![
            Value::Text(region.into()),
            Value::Text(sector.into()),
            Value::Text(contract.into()),
            Value::Number(tenure_months as f64),
            Value::Number(monthly_spend),
            Value::Number(ticket_count as f64),
            Value::Number(days_since_last_login as f64),
        ],
        churn: Some(churn),
    }
}

/// Biased churn label. Both rules yield the same distribution:
/// recency overrides tickets, which override the baseline.
pub fn draw_churn_label(
    params: &SynthesisParams,
    ticket_count: u64,
    days_since_last_login: u64,
    rng: &mut StageRng,
) -> ChurnLabel {
    let heavy_support = ticket_count > params.ticket_threshold;
    let inactive = days_since_last_login > params.recency_threshold_days;

    match params.label_rule {
        LabelRule::Sequential => {
            let mut churned = rng.chance(params.base_churn_probability);
            if heavy_support {
                churned = rng.chance(params.high_ticket_churn_probability);
            }
            if inactive {
                churned = rng.chance(params.inactive_churn_probability);
            }
            churned as ChurnLabel
        }
        LabelRule::Combined => {
            let p = if inactive {
                params.inactive_churn_probability
            } else if heavy_support {
                params.high_ticket_churn_probability
            } else {
                params.base_churn_probability
            };
            rng.chance(p) as ChurnLabel
        }
    }
}

// ── Import ───────────────────────────────────────────────────────────────────

/// Read and clean a CSV laid out as `schema`.
///
/// Coerced numeric columns turn blank or unparseable cells into 0; any
/// other bad numeric cell is a DataFormat error naming the line. The
/// label column maps "Yes" to 1 and everything else to 0.
pub fn import_csv(path: &Path, schema: &TableSchema) -> PipelineResult<Vec<CustomerRecord>> {
    if !path.is_file() {
        return Err(PipelineError::MissingSource(format!(
            "source file {} not found",
            path.display()
        )));
    }
    log::info!("synthesizer: loading {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader
        .headers()
        .map_err(|e| format_error(e, 1))?
        .clone();
    let positions = schema
        .columns()
        .iter()
        .map(|c| {
            headers.iter().position(|h| h == c.name).ok_or_else(|| {
                PipelineError::DataFormat(format!(
                    "{}: missing required column '{}'",
                    path.display(),
                    c.name
                ))
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    let mut coerced = 0usize;
    for (i, result) in reader.records().enumerate() {
        // Header is line 1.
        let raw = result.map_err(|e| format_error(e, i as u64 + 2))?;
        let line = raw.position().map_or(i as u64 + 2, |p| p.line());
        let mut customer_id = String::new();
        let mut values = Vec::with_capacity(schema.feature_count());
        let mut churn = None;

        for (spec, &pos) in schema.columns().iter().zip(&positions) {
            let cell = raw.get(pos).unwrap_or("");
            match spec.kind {
                ColumnKind::Identifier => {
                    if cell.is_empty() {
                        return Err(PipelineError::DataFormat(format!(
                            "line {line}: empty '{}'",
                            spec.name
                        )));
                    }
                    customer_id = cell.to_string();
                }
                ColumnKind::Categorical => values.push(Value::Text(cell.to_string())),
                ColumnKind::Numeric { coerce_invalid } => {
                    let n = match cell.parse::<f64>() {
                        Ok(n) if n.is_finite() => n,
                        _ if coerce_invalid => {
                            coerced += 1;
                            0.0
                        }
                        _ => {
                            return Err(PipelineError::DataFormat(format!(
                                "line {line}: '{cell}' is not a number in '{}'",
                                spec.name
                            )))
                        }
                    };
                    if n < 0.0 {
                        return Err(PipelineError::DataFormat(format!(
                            "line {line}: negative value {n} in '{}'",
                            spec.name
                        )));
                    }
                    values.push(Value::Number(n));
                }
                ColumnKind::Label => {
                    churn = Some(cell.eq_ignore_ascii_case("yes") as ChurnLabel);
                }
            }
        }
        rows.push(CustomerRecord { customer_id, values, churn });
    }

    if coerced > 0 {
        log::info!("synthesizer: coerced {coerced} blank or invalid numeric cells to 0");
    }
    Ok(rows)
}

/// Malformed input is a format error at `line`; only I/O failures stay `Csv`.
fn format_error(e: csv::Error, line: u64) -> PipelineError {
    if let csv::ErrorKind::Io(_) = e.kind() {
        return PipelineError::Csv(e);
    }
    let line = e.position().map_or(line, |p| p.line());
    PipelineError::DataFormat(format!("line {line}: {e}"))
}
