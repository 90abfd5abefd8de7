//! End-to-end pipeline tests.
//!
//! Runs the orchestrator over a mock warehouse and a recording sheet sink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use snow_sheets::config::{ParamValue, QuerySpec, SinkErrorPolicy};
use snow_sheets::error::Result;
use snow_sheets::notify::Notifier;
use snow_sheets::pipeline::{Orchestrator, WriteStatus};
use snow_sheets::sheets::{RecordingSheetSink, WriteRequest};
use snow_sheets::warehouse::{ColumnInfo, MockWarehouseClient, QueryResult, Value};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

fn write_sql(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sql).unwrap();
    path
}

fn query(file: PathBuf, worksheet: &str) -> QuerySpec {
    QuerySpec {
        file,
        worksheet: worksheet.to_string(),
        range: None,
        cond: None,
        params: BTreeMap::new(),
        clear: false,
    }
}

fn sales_result() -> QueryResult {
    let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    QueryResult::with_data(
        vec![
            ColumnInfo::new("STORE", "text"),
            ColumnInfo::new("TOTAL", "fixed"),
            ColumnInfo::new("DAY", "date"),
        ],
        vec![
            vec![
                Value::from("Santiago"),
                Value::Decimal(Decimal::from_str("12.50").unwrap()),
                Value::Date(day),
            ],
            vec![
                Value::from("Lima"),
                Value::Decimal(Decimal::from_str("7.25").unwrap()),
                Value::Date(day.succ_opt().unwrap()),
            ],
            vec![Value::from("Quito"), Value::Null, Value::Null],
        ],
    )
}

#[tokio::test]
async fn test_single_query_end_to_end() {
    let dir = TempDir::new().unwrap();
    let file = write_sql(dir.path(), "sales.sql", "SELECT * FROM sales;");
    let warehouse = MockWarehouseClient::new().with_result("FROM sales", sales_result());
    let sink = RecordingSheetSink::new();

    let summary = Orchestrator::new(&warehouse, &sink)
        .run(&[query(file, "Sales")])
        .await
        .unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.outcomes[0].rows, 3);

    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].request, WriteRequest::new("Sales"));
    assert_eq!(
        writes[0].cells,
        vec![
            vec![json!("Santiago"), json!(12.5), json!("2024-03-05")],
            vec![json!("Lima"), json!(7.25), json!("2024-03-06")],
            vec![json!("Quito"), json!(""), json!("")],
        ]
    );
}

#[tokio::test]
async fn test_params_and_condition_reach_the_warehouse() {
    let dir = TempDir::new().unwrap();
    let file = write_sql(
        dir.path(),
        "sales.sql",
        "SELECT * FROM sales WHERE day >= '{start}';\n",
    );
    let mut spec = query(file, "Sales");
    spec.params = BTreeMap::from([("start".to_string(), ParamValue::from("2024-03-01"))]);
    spec.cond = Some(" AND store = 'Lima';".to_string());
    spec.range = Some("B2".to_string());
    spec.clear = true;

    let warehouse = MockWarehouseClient::new();
    let sink = RecordingSheetSink::new();

    Orchestrator::new(&warehouse, &sink)
        .run(&[spec])
        .await
        .unwrap();

    assert_eq!(
        warehouse.executed(),
        vec!["SELECT * FROM sales WHERE day >= '2024-03-01' AND store = 'Lima';".to_string()]
    );
    assert_eq!(
        sink.writes()[0].request,
        WriteRequest::new("Sales").with_range("B2").with_clear(true)
    );
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_later_queries() {
    let dir = TempDir::new().unwrap();
    let queries = vec![
        query(write_sql(dir.path(), "a.sql", "SELECT 'a' FROM t1;"), "Broken"),
        query(write_sql(dir.path(), "b.sql", "SELECT 'b' FROM t2;"), "Good"),
    ];
    let warehouse = MockWarehouseClient::new()
        .with_result("t1", sales_result())
        .with_result("t2", sales_result());
    let sink =
        RecordingSheetSink::new().failing_on("Broken", "The caller does not have permission");
    let notifier = RecordingNotifier::default();

    let summary = Orchestrator::new(&warehouse, &sink)
        .with_notifier(&notifier)
        .with_policy(SinkErrorPolicy::Continue)
        .run(&queries)
        .await
        .unwrap();

    assert_eq!(warehouse.executed().len(), 2);
    assert_eq!(summary.written(), 1);
    assert_eq!(summary.failed().len(), 1);
    assert_eq!(summary.failed()[0].worksheet, "Broken");
    assert!(matches!(
        &summary.outcomes[0].status,
        WriteStatus::Failed(msg) if msg.contains("permission")
    ));

    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].request.worksheet, "Good");

    let messages = notifier.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Broken"));
}

#[tokio::test]
async fn test_queries_run_in_configured_order() {
    let dir = TempDir::new().unwrap();
    let queries: Vec<QuerySpec> = ["first", "second", "third"]
        .iter()
        .map(|name| {
            query(
                write_sql(dir.path(), &format!("{name}.sql"), &format!("SELECT '{name}';")),
                name,
            )
        })
        .collect();
    let warehouse = MockWarehouseClient::new();
    let sink = RecordingSheetSink::new();

    Orchestrator::new(&warehouse, &sink).run(&queries).await.unwrap();

    assert_eq!(
        warehouse.executed(),
        vec![
            "SELECT 'first';".to_string(),
            "SELECT 'second';".to_string(),
            "SELECT 'third';".to_string(),
        ]
    );
    let tabs: Vec<String> = sink.writes().into_iter().map(|w| w.request.worksheet).collect();
    assert_eq!(tabs, vec!["first", "second", "third"]);
}
