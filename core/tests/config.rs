//! Config loading: defaults, overrides and validation.

use churn_intel_core::config::{LabelRule, PipelineConfig, SynthesisMode};

#[test]
fn partial_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(
        &path,
        r#"{ "seed": 7, "mode": "import", "synthesis": { "label_rule": "sequential" }, "model": { "n_trees": 25 } }"#,
    )
    .unwrap();

    let config = PipelineConfig::load(path.to_str().unwrap()).unwrap();

    assert_eq!(config.seed, 7);
    assert_eq!(config.mode, SynthesisMode::Import);
    assert_eq!(config.synthesis.label_rule, LabelRule::Sequential);
    assert_eq!(config.synthesis.ticket_threshold, 5);
    assert_eq!(config.model.n_trees, 25);
    assert_eq!(config.model.high_risk_threshold, 0.7);
    assert_eq!(config.table, "customer_metrics");
    assert_eq!(config.population, 1000);
}

#[test]
fn out_of_range_probability_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(&path, r#"{ "synthesis": { "base_churn_probability": 1.5 } }"#).unwrap();

    let err = PipelineConfig::load(path.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("base_churn_probability"));
}

#[test]
fn mode_parses_from_cli_text() {
    assert_eq!("Synthetic".parse::<SynthesisMode>().unwrap(), SynthesisMode::Synthetic);
    assert_eq!("import".parse::<SynthesisMode>().unwrap(), SynthesisMode::Import);
    assert!("stream".parse::<SynthesisMode>().is_err());
}
