//! Churn insight pipeline: dataset synthesis, risk scoring and the
//! insight artifact consumed by the decision-intelligence agent.

pub mod config;
pub mod error;
pub mod forest;
pub mod insight;
pub mod pipeline;
pub mod policy;
pub mod record;
pub mod risk_model;
pub mod rng;
pub mod schema;
pub mod store;
pub mod synthesizer;
pub mod types;

pub use pipeline::{compute_insights, generate_dataset};
