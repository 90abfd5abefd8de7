//! Runs SQL files on an open warehouse session.
//!
//! Provides isolated query execution that can be tested independently
//! of the pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use super::template::build_statement;
use crate::config::ParamValue;
use crate::error::{AppError, Result};
use crate::warehouse::{QueryResult, WarehouseClient};

/// Executes SQL files against one session.
pub struct QueryRunner<'a> {
    warehouse: &'a dyn WarehouseClient,
}

impl<'a> QueryRunner<'a> {
    /// Creates a runner bound to an open session.
    pub fn new(warehouse: &'a dyn WarehouseClient) -> Self {
        Self { warehouse }
    }

    /// Reads a SQL file and turns it into the statement to execute.
    pub async fn prepare(
        path: &Path,
        cond: Option<&str>,
        params: &BTreeMap<String, ParamValue>,
    ) -> Result<String> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::io(format!("Failed to read SQL file {}: {e}", path.display()))
        })?;

        build_statement(&text, cond, params).map_err(|e| match e {
            AppError::Template(msg) => {
                AppError::template(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Reads, renders and executes a SQL file, returning the full result set.
    pub async fn run(
        &self,
        path: &Path,
        cond: Option<&str>,
        params: &BTreeMap<String, ParamValue>,
    ) -> Result<QueryResult> {
        let sql = Self::prepare(path, cond, params).await?;
        debug!("Executing {} ({} bytes)", path.display(), sql.len());

        let result = self.warehouse.execute_query(&sql).await?;
        debug!(
            "{} returned {} rows in {:?}",
            path.display(),
            result.row_count(),
            result.execution_time
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{ColumnInfo, MockWarehouseClient, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sql_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_run_executes_rendered_sql() {
        let file = sql_file("SELECT id FROM orders WHERE day = '{day}';");
        let result = QueryResult::with_data(
            vec![ColumnInfo::new("ID", "fixed")],
            vec![vec![Value::Int(1)], vec![Value::Int(2)]],
        );
        let warehouse = MockWarehouseClient::new().with_result("FROM orders", result);
        let params = BTreeMap::from([("day".to_string(), ParamValue::from("2024-03-05"))]);

        let got = QueryRunner::new(&warehouse)
            .run(file.path(), Some(" AND store = 4;"), &params)
            .await
            .unwrap();

        assert_eq!(got.row_count(), 2);
        assert_eq!(
            warehouse.executed(),
            vec!["SELECT id FROM orders WHERE day = '2024-03-05' AND store = 4;".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let warehouse = MockWarehouseClient::new();
        let err = QueryRunner::new(&warehouse)
            .run(Path::new("/nonexistent/q.sql"), None, &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        assert!(warehouse.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_placeholder_is_not_executed() {
        let file = sql_file("SELECT * FROM t WHERE a = {a} AND b = {b};");
        let warehouse = MockWarehouseClient::new();
        let params = BTreeMap::from([("a".to_string(), ParamValue::Int(1))]);

        let err = QueryRunner::new(&warehouse)
            .run(file.path(), None, &params)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Template(_)));
        assert!(err.to_string().contains("{b}"));
        assert!(warehouse.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execution_error_propagates() {
        let file = sql_file("SELECT * FROM missing_table;");
        let warehouse = MockWarehouseClient::new()
            .with_error("missing_table", "Object 'MISSING_TABLE' does not exist");

        let err = QueryRunner::new(&warehouse)
            .run(file.path(), None, &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Execution(_)));
    }
}
