//! Mock sheet sink for testing.
//!
//! Records every write in memory and can be told to reject writes to
//! particular tabs.

use super::cells::{a1_range, to_cells};
use super::{SheetSink, WriteReport, WriteRequest};
use crate::error::{AppError, Result};
use crate::warehouse::QueryResult;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;

/// One accepted write.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub request: WriteRequest,
    /// Cells exactly as they would be sent to the sheet.
    pub cells: Vec<Vec<JsonValue>>,
}

/// A sink that keeps writes in memory.
#[derive(Default)]
pub struct RecordingSheetSink {
    failures: HashMap<String, String>,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl RecordingSheetSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes to `worksheet` with a sheet error.
    pub fn failing_on(mut self, worksheet: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(worksheet.into(), message.into());
        self
    }

    /// Writes accepted so far, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SheetSink for RecordingSheetSink {
    async fn write(&self, request: &WriteRequest, table: &QueryResult) -> Result<WriteReport> {
        if let Some(message) = self.failures.get(&request.worksheet) {
            return Err(AppError::sink(message.clone()));
        }

        let record = RecordedWrite {
            request: request.clone(),
            cells: to_cells(&table.rows),
        };
        let rows_written = record.cells.len();
        self.writes
            .lock()
            .map_err(|_| AppError::internal("Recording sink lock poisoned"))?
            .push(record);

        Ok(WriteReport {
            worksheet: request.worksheet.clone(),
            range: a1_range(&request.worksheet, request.range.as_deref()),
            rows_written,
            cleared: request.clear,
        })
    }
}
