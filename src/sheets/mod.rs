//! Spreadsheet output for snow-sheets.
//!
//! Provides a trait-based abstraction over the sheet destination so the
//! pipeline can be exercised without network access.

pub mod auth;
pub mod cells;
pub mod google;
mod mock;

use async_trait::async_trait;

use crate::config::QuerySpec;
use crate::error::Result;
use crate::warehouse::QueryResult;

pub use google::{spreadsheet_id_from_url, GoogleSheetsClient};
pub use mock::{RecordedWrite, RecordingSheetSink};

/// Where and how a table is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Target tab; must already exist.
    pub worksheet: String,
    /// A1 range whose origin receives the first data row.
    pub range: Option<String>,
    /// Clear the range (or the whole tab) before writing.
    pub clear: bool,
}

impl WriteRequest {
    pub fn new(worksheet: impl Into<String>) -> Self {
        Self {
            worksheet: worksheet.into(),
            range: None,
            clear: false,
        }
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }

    pub fn with_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }
}

impl From<&QuerySpec> for WriteRequest {
    fn from(spec: &QuerySpec) -> Self {
        Self {
            worksheet: spec.worksheet.clone(),
            range: spec.range.clone(),
            clear: spec.clear,
        }
    }
}

/// What a successful write changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub worksheet: String,
    /// Range reported back by the destination, or the requested one.
    pub range: String,
    pub rows_written: usize,
    pub cleared: bool,
}

/// Destination for result tables.
#[async_trait]
pub trait SheetSink: Send + Sync {
    /// Writes the data rows of `table` (never the header).
    async fn write(&self, request: &WriteRequest, table: &QueryResult) -> Result<WriteReport>;
}
