//! Configuration loading tests.
//!
//! Loads documents from disk and drives a run from the resolved profile.

use std::io::Write;

use snow_sheets::config::{ConfigDocument, SinkErrorPolicy};
use snow_sheets::error::AppError;
use snow_sheets::pipeline::Orchestrator;
use snow_sheets::sheets::RecordingSheetSink;
use snow_sheets::warehouse::MockWarehouseClient;
use tempfile::{NamedTempFile, TempDir};

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_missing_config_file() {
    let err = ConfigDocument::load_from_file(std::path::Path::new("/nonexistent/config.yaml"))
        .unwrap_err();
    assert!(matches!(err, AppError::Io(_)));
}

#[test]
fn test_invalid_yaml() {
    let file = config_file("shared: [unclosed\n");
    let err = ConfigDocument::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn test_unknown_profile() {
    let file = config_file("profiles:\n  test: {}\n");
    let doc = ConfigDocument::load_from_file(file.path()).unwrap();
    let err = doc.resolve(Some("staging"), None).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("staging"));
}

#[test]
fn test_missing_required_key_names_it() {
    let file = config_file(
        "shared:\n  google:\n    service_account_json: g.json\n  queries: []\nprofiles:\n  test: {}\n",
    );
    let doc = ConfigDocument::load_from_file(file.path()).unwrap();
    let err = doc.resolve(None, None).unwrap().job_config().unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("sheet_url"));
}

#[tokio::test]
async fn test_profile_drives_a_run() {
    let dir = TempDir::new().unwrap();
    let sql = dir.path().join("stock.sql");
    std::fs::write(&sql, "SELECT sku FROM stock WHERE qty < {min};").unwrap();

    let file = config_file(&format!(
        r#"
default_profile: test
shared:
  google:
    service_account_json: secrets/google.json
    sheet_url: https://docs.google.com/spreadsheets/d/abc/edit
  snowflake:
    service_account_json: secrets/snowflake.json
  queries: []
profiles:
  test: {{}}
  prod:
    on_sink_error: abort
    queries:
      - file: {}
        worksheet: Stock
        params:
          min: 5
"#,
        sql.display()
    ));

    let doc = ConfigDocument::load_from_file(file.path()).unwrap();
    let job = doc.resolve(Some("prod"), None).unwrap().job_config().unwrap();
    assert_eq!(job.on_sink_error, SinkErrorPolicy::Abort);

    let warehouse = MockWarehouseClient::new();
    let sink = RecordingSheetSink::new();
    let summary = Orchestrator::new(&warehouse, &sink)
        .with_policy(job.on_sink_error)
        .run(&job.queries)
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(
        warehouse.executed(),
        vec!["SELECT sku FROM stock WHERE qty < 5;".to_string()]
    );
}
