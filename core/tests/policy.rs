//! Policy lookup by topic.

use churn_intel_core::{error::PipelineError, policy::PolicyLibrary};

#[test]
fn topics_map_to_documents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pricing_policy.md"), "# Pricing\nNo discounts above 20%.").unwrap();
    std::fs::write(dir.path().join("retention_strategy.md"), "# Retention\nCall within 48h.").unwrap();
    let lib = PolicyLibrary::new(dir.path());

    assert!(lib.lookup("pricing").unwrap().contains("20%"));
    assert!(lib.lookup("Retention").unwrap().starts_with("# Retention"));
    assert_eq!(lib.lookup("support").unwrap(), lib.lookup("retention").unwrap());
}

#[test]
fn unknown_topic_degrades_to_text() {
    let dir = tempfile::tempdir().unwrap();
    let lib = PolicyLibrary::new(dir.path());

    assert!(matches!(lib.lookup("legal"), Err(PipelineError::MissingSource(_))));
    assert!(lib.lookup_or_explain("legal").contains("no documentation found for topic: legal"));
    // Known topic, file absent.
    assert!(lib.lookup_or_explain("pricing").contains("pricing_policy.md"));
}
