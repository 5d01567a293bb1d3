//! Telco CSV import: coercion, label mapping and failure modes.

use churn_intel_core::{
    config::{PipelineConfig, SynthesisMode},
    error::PipelineError,
    record::Value,
    schema::TableSchema,
    store::DatasetStore,
    synthesizer,
};
use std::path::Path;

const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,\
MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,\
StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

const ROW_OK: &str = "7590-VHVEG,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,\
Month-to-month,Yes,Electronic check,29.85,29.85,No";

const ROW_BLANK_CHARGES: &str = "4472-LVYGI,Female,0,Yes,Yes,0,No,No phone service,DSL,Yes,No,Yes,\
Yes,Yes,No,Two year,Yes,Bank transfer (automatic),52.55, ,No";

const ROW_CHURNED: &str = "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,\
Month-to-month,Yes,Mailed check,53.85,108.15,Yes";

fn write_csv(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("telco.csv");
    std::fs::write(&path, lines.join("\n")).expect("write csv");
    path
}

fn total_charges(values: &[Value]) -> f64 {
    let schema = TableSchema::telco("customer_metrics");
    let idx = schema.feature_index("TotalCharges").expect("TotalCharges column");
    values[idx].as_number().expect("numeric")
}

#[test]
fn blank_total_charges_become_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), &[HEADER, ROW_OK, ROW_BLANK_CHARGES, ROW_CHURNED]);
    let schema = TableSchema::telco("customer_metrics");

    let rows = synthesizer::import_csv(&path, &schema).unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(total_charges(&rows[0].values), 29.85);
    assert_eq!(total_charges(&rows[1].values), 0.0);
    assert_eq!(rows[0].churn, Some(0));
    assert_eq!(rows[2].churn, Some(1));
}

#[test]
fn import_mode_replaces_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), &[HEADER, ROW_OK, ROW_BLANK_CHARGES]);
    let mut config = PipelineConfig::default_test();
    config.mode = SynthesisMode::Import;
    config.source_path = path;

    let mut store = DatasetStore::in_memory().unwrap();
    let written = synthesizer::write_dataset(&config, &mut store).unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.row_count("customer_metrics").unwrap(), 2);
    let cols = store.table_columns("customer_metrics").unwrap();
    assert_eq!(cols.first().map(|c| c.0.as_str()), Some("customerID"));
    assert_eq!(cols.last().map(|c| c.0.as_str()), Some("Churn"));
}

#[test]
fn missing_source_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default_test();
    config.mode = SynthesisMode::Import;
    config.source_path = dir.path().join("absent.csv");

    let mut store = DatasetStore::in_memory().unwrap();
    let err = synthesizer::write_dataset(&config, &mut store).unwrap_err();

    assert!(matches!(err, PipelineError::MissingSource(_)), "got {err:?}");
    assert!(!store.table_exists("customer_metrics").unwrap());
}

#[test]
fn missing_column_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let header = HEADER.replace(",Churn", "");
    let row = ROW_OK.trim_end_matches(",No").to_string();
    let path = write_csv(dir.path(), &[&header, &row]);

    let err = synthesizer::import_csv(&path, &TableSchema::telco("t")).unwrap_err();
    assert!(matches!(err, PipelineError::DataFormat(ref m) if m.contains("Churn")), "got {err:?}");
}

#[test]
fn unparseable_monthly_charges_fail_with_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let bad = ROW_OK.replace("29.85,29.85", "n/a,29.85");
    let path = write_csv(dir.path(), &[HEADER, ROW_OK, &bad]);

    let err = synthesizer::import_csv(&path, &TableSchema::telco("t")).unwrap_err();
    assert!(matches!(err, PipelineError::DataFormat(ref m) if m.contains("line 3")), "got {err:?}");
}

#[test]
fn ragged_row_is_a_format_error_with_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), &[HEADER, ROW_OK, "9999-XXXX,Male,0"]);

    let err = synthesizer::import_csv(&path, &TableSchema::telco("t")).unwrap_err();
    assert!(matches!(err, PipelineError::DataFormat(ref m) if m.starts_with("line 3")), "got {err:?}");
}

#[test]
fn negative_charges_fail_with_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let bad = ROW_CHURNED.replace("53.85,108.15", "-53.85,108.15");
    let path = write_csv(dir.path(), &[HEADER, ROW_OK, ROW_BLANK_CHARGES, &bad]);

    let err = synthesizer::import_csv(&path, &TableSchema::telco("t")).unwrap_err();
    assert!(
        matches!(err, PipelineError::DataFormat(ref m) if m.contains("line 4") && m.contains("MonthlyCharges")),
        "got {err:?}"
    );
}

#[test]
fn duplicate_customer_ids_are_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default_test();
    config.mode = SynthesisMode::Import;
    config.source_path = write_csv(dir.path(), &[HEADER, ROW_OK, ROW_CHURNED, ROW_OK]);

    let mut store = DatasetStore::in_memory().unwrap();
    let err = synthesizer::write_dataset(&config, &mut store).unwrap_err();

    assert!(matches!(err, PipelineError::DataFormat(ref m) if m.contains("7590-VHVEG")), "got {err:?}");
    assert!(!store.table_exists("customer_metrics").unwrap());
}

#[test]
fn failed_import_keeps_previous_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DatasetStore::in_memory().unwrap();
    let mut config = PipelineConfig::default_test();
    config.mode = SynthesisMode::Import;

    config.source_path = write_csv(dir.path(), &[HEADER, ROW_OK, ROW_CHURNED]);
    synthesizer::write_dataset(&config, &mut store).unwrap();

    // Same id twice: rejected before anything is written.
    config.source_path = write_csv(dir.path(), &[HEADER, ROW_OK, ROW_OK]);
    let err = synthesizer::write_dataset(&config, &mut store).unwrap_err();

    assert!(matches!(err, PipelineError::DataFormat(_)), "got {err:?}");
    assert_eq!(store.row_count("customer_metrics").unwrap(), 2);
}
