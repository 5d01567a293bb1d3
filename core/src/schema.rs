//! Explicit schema descriptor for the customer-metrics table.
//!
//! The synthesizer writes a table shaped by a TableSchema, and the risk
//! model validates the stored table against the same descriptor before
//! touching a row. External read-only tools depend on these column names;
//! changing a descriptor is a breaking change for them.

use crate::{
    config::SynthesisMode,
    error::{PipelineError, PipelineResult},
    record::{CustomerRecord, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Identifier,
    Categorical,
    /// `coerce_invalid`: empty or unparseable input becomes 0 on import.
    Numeric { coerce_invalid: bool },
    Label,
}

impl ColumnKind {
    /// Declared SQLite type for this kind.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Identifier | Self::Categorical => "TEXT",
            Self::Numeric { .. } => "REAL",
            Self::Label => "INTEGER",
        }
    }

    pub fn is_feature(&self) -> bool {
        matches!(self, Self::Categorical | Self::Numeric { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self { name: name.to_string(), kind }
    }
}

/// Columns the insight synthesizer aggregates over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightRoles {
    /// Categorical column whose high-risk mode names the critical segment.
    pub segment_column: String,
    /// Numeric spend column averaged over the high-risk subset.
    pub spend_column: String,
    /// Numeric support-load column, when the source has one.
    pub load_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    columns: Vec<ColumnSpec>,
    pub roles: InsightRoles,
}

impl TableSchema {
    /// Build and check a descriptor: exactly one identifier, at most one
    /// label, and roles pointing at feature columns of the right kind.
    pub fn new(table: &str, columns: Vec<ColumnSpec>, roles: InsightRoles) -> PipelineResult<Self> {
        let ids = columns.iter().filter(|c| c.kind == ColumnKind::Identifier).count();
        if ids != 1 {
            return Err(PipelineError::DataFormat(format!(
                "schema for '{table}' needs exactly one identifier column, found {ids}"
            )));
        }
        let labels = columns.iter().filter(|c| c.kind == ColumnKind::Label).count();
        if labels > 1 {
            return Err(PipelineError::DataFormat(format!(
                "schema for '{table}' has {labels} label columns"
            )));
        }
        let schema = Self { table: table.to_string(), columns, roles };
        schema.check_role(&schema.roles.segment_column, false)?;
        schema.check_role(&schema.roles.spend_column, true)?;
        if let Some(load) = &schema.roles.load_column {
            schema.check_role(load, true)?;
        }
        Ok(schema)
    }

    fn check_role(&self, name: &str, numeric: bool) -> PipelineResult<()> {
        let ok = self.columns.iter().any(|c| {
            c.name == name
                && match c.kind {
                    ColumnKind::Numeric { .. } => numeric,
                    ColumnKind::Categorical => !numeric,
                    _ => false,
                }
        });
        if ok {
            Ok(())
        } else {
            Err(PipelineError::DataFormat(format!(
                "insight role column '{name}' is not a {} feature of '{}'",
                if numeric { "numeric" } else { "categorical" },
                self.table
            )))
        }
    }

    /// The generated customer table.
    pub fn synthetic(table: &str) -> Self {
        use ColumnKind::*;
        let numeric = Numeric { coerce_invalid: false };
        Self {
            table: table.to_string(),
            columns: vec![
                ColumnSpec::new("customer_id", Identifier),
                ColumnSpec::new("region", Categorical),
                ColumnSpec::new("sector", Categorical),
                ColumnSpec::new("contract_type", Categorical),
                ColumnSpec::new("tenure_months", numeric),
                ColumnSpec::new("monthly_spend", numeric),
                ColumnSpec::new("ticket_count", numeric),
                ColumnSpec::new("days_since_last_login", numeric),
                ColumnSpec::new("churn", Label),
            ],
            roles: InsightRoles {
                segment_column: "region".into(),
                spend_column: "monthly_spend".into(),
                load_column: Some("ticket_count".into()),
            },
        }
    }

    /// The Telco customer-churn export, column names kept verbatim.
    pub fn telco(table: &str) -> Self {
        use ColumnKind::*;
        let numeric = Numeric { coerce_invalid: false };
        let layout = [
            ("customerID", Identifier),
            ("gender", Categorical),
            ("SeniorCitizen", numeric),
            ("Partner", Categorical),
            ("Dependents", Categorical),
            ("tenure", numeric),
            ("PhoneService", Categorical),
            ("MultipleLines", Categorical),
            ("InternetService", Categorical),
            ("OnlineSecurity", Categorical),
            ("OnlineBackup", Categorical),
            ("DeviceProtection", Categorical),
            ("TechSupport", Categorical),
            ("StreamingTV", Categorical),
            ("StreamingMovies", Categorical),
            ("Contract", Categorical),
            ("PaperlessBilling", Categorical),
            ("PaymentMethod", Categorical),
            ("MonthlyCharges", numeric),
            // Blank for brand-new customers in the raw export.
            ("TotalCharges", Numeric { coerce_invalid: true }),
            ("Churn", Label),
        ];
        Self {
            table: table.to_string(),
            columns: layout.iter().map(|(n, k)| ColumnSpec::new(n, *k)).collect(),
            roles: InsightRoles {
                segment_column: "Contract".into(),
                spend_column: "MonthlyCharges".into(),
                load_column: None,
            },
        }
    }

    pub fn for_mode(mode: SynthesisMode, table: &str) -> Self {
        match mode {
            SynthesisMode::Synthetic => Self::synthetic(table),
            SynthesisMode::Import => Self::telco(table),
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn id_column(&self) -> &ColumnSpec {
        self.columns
            .iter()
            .find(|c| c.kind == ColumnKind::Identifier)
            .unwrap_or(&self.columns[0])
    }

    pub fn label_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Label)
    }

    /// Non-identifier, non-label columns, in table order.
    pub fn feature_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.kind.is_feature())
    }

    pub fn feature_count(&self) -> usize {
        self.feature_columns().count()
    }

    /// Position of `name` within CustomerRecord::values.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_columns().position(|c| c.name == name)
    }

    /// Compare a stored table's (name, declared type) list, in order,
    /// against this descriptor.
    pub fn validate_columns(&self, actual: &[(String, String)]) -> PipelineResult<()> {
        let expected: Vec<(&str, &str)> = self
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.kind.sql_type()))
            .collect();
        let matches = expected.len() == actual.len()
            && expected
                .iter()
                .zip(actual)
                .all(|((en, et), (an, at))| *en == an.as_str() && et.eq_ignore_ascii_case(at));
        if matches {
            return Ok(());
        }
        let render = |cols: Vec<String>| cols.join(", ");
        Err(PipelineError::DataFormat(format!(
            "table '{}' does not match its schema: expected [{}], found [{}]",
            self.table,
            render(expected.iter().map(|(n, t)| format!("{n} {t}")).collect()),
            render(actual.iter().map(|(n, t)| format!("{n} {t}")).collect()),
        )))
    }

    /// Check one record against the descriptor before it is written.
    pub fn check_record(&self, record: &CustomerRecord) -> PipelineResult<()> {
        if record.values.len() != self.feature_count() {
            return Err(PipelineError::DataFormat(format!(
                "record {} has {} values, schema '{}' expects {}",
                record.customer_id,
                record.values.len(),
                self.table,
                self.feature_count()
            )));
        }
        for (spec, value) in self.feature_columns().zip(&record.values) {
            match (spec.kind, value) {
                (ColumnKind::Categorical, Value::Text(_)) => {}
                (ColumnKind::Numeric { .. }, Value::Number(n)) if n.is_finite() && *n >= 0.0 => {}
                _ => {
                    return Err(PipelineError::DataFormat(format!(
                        "record {}: invalid value {value:?} for column '{}'",
                        record.customer_id, spec.name
                    )))
                }
            }
        }
        match record.churn {
            Some(label) if label > 1 => Err(PipelineError::DataFormat(format!(
                "record {}: churn label must be 0 or 1, got {label}",
                record.customer_id
            ))),
            Some(_) if self.label_column().is_none() => Err(PipelineError::DataFormat(format!(
                "record {} carries a label but '{}' has no label column",
                record.customer_id, self.table
            ))),
            _ => Ok(()),
        }
    }
}

/// Quote an SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
