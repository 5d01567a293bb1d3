//! Customer rows as they flow between stages.

use crate::types::{ChurnLabel, CustomerId};
use serde::{Deserialize, Serialize};

/// One feature cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

/// One row of the customer-metrics table.
/// `values` holds the feature columns in TableSchema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: CustomerId,
    pub values: Vec<Value>,
    pub churn: Option<ChurnLabel>,
}

/// A record with its model churn probability. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: CustomerRecord,
    pub churn_probability: f64,
}

impl ScoredRecord {
    pub fn is_high_risk(&self, threshold: f64) -> bool {
        self.churn_probability > threshold
    }
}
