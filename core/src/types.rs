//! Shared primitive types used across the pipeline.

/// Stable, unique customer identifier (the table's primary key).
pub type CustomerId = String;

/// Binary churn label: 1 = churned, 0 = retained.
pub type ChurnLabel = u8;

/// Churn probability above which a customer counts as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Sentinel used when a categorical aggregate has no rows to draw from.
pub const UNKNOWN: &str = "Unknown";
