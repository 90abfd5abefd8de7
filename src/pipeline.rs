//! The query-to-sheet run loop.
//!
//! Queries run strictly in order on one warehouse session. A warehouse
//! failure ends the run; a sheet failure is recorded and, under the
//! default policy, the loop moves on to the next query.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::{QuerySpec, SinkErrorPolicy};
use crate::error::{AppError, Result};
use crate::normalize::normalize_table;
use crate::notify::Notifier;
use crate::query::QueryRunner;
use crate::sheets::{SheetSink, WriteReport, WriteRequest};
use crate::warehouse::WarehouseClient;

/// How a single query's write ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Written(WriteReport),
    Failed(String),
}

/// Per-query record kept in the [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub file: PathBuf,
    pub worksheet: String,
    /// Rows returned by the warehouse.
    pub rows: usize,
    pub status: WriteStatus,
}

/// Outcome of every query that reached the write step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<QueryOutcome>,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, WriteStatus::Written(_)))
            .count()
    }

    pub fn failed(&self) -> Vec<&QueryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, WriteStatus::Failed(_)))
            .collect()
    }

    /// True when every write succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed().is_empty()
    }
}

/// Sequences query, normalize and write for each configured query.
pub struct Orchestrator<'a> {
    warehouse: &'a dyn WarehouseClient,
    sink: &'a dyn SheetSink,
    notifier: Option<&'a dyn Notifier>,
    policy: SinkErrorPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(warehouse: &'a dyn WarehouseClient, sink: &'a dyn SheetSink) -> Self {
        Self {
            warehouse,
            sink,
            notifier: None,
            policy: SinkErrorPolicy::default(),
        }
    }

    /// Sends an alert for every failed write.
    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_policy(mut self, policy: SinkErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs every query in order.
    ///
    /// Returns the first warehouse, template or file error unchanged. Sheet
    /// errors are returned only under [`SinkErrorPolicy::Abort`].
    pub async fn run(&self, queries: &[QuerySpec]) -> Result<RunSummary> {
        let runner = QueryRunner::new(self.warehouse);
        let mut summary = RunSummary::default();

        for (index, spec) in queries.iter().enumerate() {
            info!(
                "Query {}/{}: {} -> {}",
                index + 1,
                queries.len(),
                spec.file.display(),
                spec.worksheet
            );

            let result = runner
                .run(&spec.file, spec.cond.as_deref(), &spec.params)
                .await?;
            let rows = result.row_count();
            println!("{}: {} rows", spec.file.display(), rows);

            let table = normalize_table(result);
            let request = WriteRequest::from(spec);

            let status = match self.sink.write(&request, &table).await {
                Ok(report) => {
                    println!(
                        "Wrote {} rows to '{}' ({})",
                        report.rows_written, report.worksheet, report.range
                    );
                    WriteStatus::Written(report)
                }
                Err(e) => {
                    let message = format!(
                        "Failed to write {} to worksheet '{}': {}",
                        spec.file.display(),
                        spec.worksheet,
                        e
                    );
                    error!("{}", message);
                    println!("Error: {message}");
                    self.alert(&message).await;

                    if self.policy == SinkErrorPolicy::Abort {
                        return Err(AppError::sink(message));
                    }
                    WriteStatus::Failed(e.to_string())
                }
            };

            summary.outcomes.push(QueryOutcome {
                file: spec.file.clone(),
                worksheet: spec.worksheet.clone(),
                rows,
                status,
            });
        }

        info!(
            "Run finished: {} written, {} failed",
            summary.written(),
            summary.failed().len()
        );
        Ok(summary)
    }

    async fn alert(&self, message: &str) {
        if let Some(notifier) = self.notifier {
            if let Err(e) = notifier.notify(message).await {
                warn!("Failed to send alert: {}", e);
            }
        }
    }
}
