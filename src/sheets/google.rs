//! Google Sheets v4 client.
//!
//! Talks to the `spreadsheets` and `spreadsheets.values` REST resources
//! with a bearer token from [`TokenProvider`]. Values are written with
//! `valueInputOption=RAW` so text that looks like a formula stays text.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, trace};
use url::Url;

use super::auth::{ServiceAccountKey, TokenProvider};
use super::cells::{a1_range, clear_range, quote_worksheet, to_cells};
use super::{SheetSink, WriteReport, WriteRequest};
use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::warehouse::{ColumnInfo, QueryResult, Row, Value};

/// Sheets API root.
pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SPREADSHEET_URL_PATTERN: &str = r"/spreadsheets/d/([a-zA-Z0-9_-]+)";

/// Extracts the spreadsheet id from a sheet URL.
pub fn spreadsheet_id_from_url(url: &str) -> Result<String> {
    let pattern = Regex::new(SPREADSHEET_URL_PATTERN)
        .map_err(|e| AppError::internal(format!("Invalid spreadsheet URL pattern: {e}")))?;

    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::config(format!("Not a Google Sheets URL: {url}")))
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    updated_range: Option<String>,
    updated_rows: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

/// Client for one spreadsheet.
#[derive(Debug)]
pub struct GoogleSheetsClient {
    http: Client,
    base_url: Url,
    spreadsheet_id: String,
    tokens: TokenProvider,
}

impl GoogleSheetsClient {
    /// Opens the spreadsheet named by the Google section of the config.
    pub fn connect(config: &GoogleConfig) -> Result<Self> {
        let key = ServiceAccountKey::load_from_file(&config.service_account_json)?;
        let spreadsheet_id = spreadsheet_id_from_url(&config.sheet_url)?;
        Self::new(key, spreadsheet_id, SHEETS_API_URL)
    }

    pub fn new(
        key: ServiceAccountKey,
        spreadsheet_id: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::config(format!("Invalid Sheets API URL '{base_url}': {e}")))?;

        Ok(Self {
            tokens: TokenProvider::new(key, http.clone()),
            http,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Lists the tab titles of the spreadsheet.
    pub async fn worksheet_titles(&self) -> Result<Vec<String>> {
        let mut url = self.endpoint(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let meta: SpreadsheetMetadata = self.call(self.http.get(url)).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Fails with a sheet error unless the tab exists.
    pub async fn ensure_worksheet(&self, name: &str) -> Result<()> {
        let titles = self.worksheet_titles().await?;
        if titles.iter().any(|t| t == name) {
            Ok(())
        } else {
            Err(AppError::sink(format!(
                "Worksheet '{name}' not found in spreadsheet {} (tabs: {})",
                self.spreadsheet_id,
                titles.join(", ")
            )))
        }
    }

    /// Clears every value in `range`, keeping formatting.
    pub async fn clear(&self, range: &str) -> Result<()> {
        let url = self.endpoint(&["values", &format!("{range}:clear")])?;
        let _: JsonValue = self
            .call(self.http.post(url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn update(&self, range: &str, values: Vec<Vec<JsonValue>>) -> Result<UpdateResponse> {
        let mut url = self.endpoint(&["values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = ValueRange {
            range,
            major_dimension: "ROWS",
            values,
        };
        self.call(self.http.put(url).json(&body)).await
    }

    /// Reads a tab, or a range of it, back as a table of text cells.
    ///
    /// With `assume_header` the first row names the columns; otherwise
    /// columns are named by their letters.
    pub async fn read_values(
        &self,
        worksheet: &str,
        range: Option<&str>,
        assume_header: bool,
    ) -> Result<QueryResult> {
        let target = match range {
            Some(_) => a1_range(worksheet, range),
            None => quote_worksheet(worksheet),
        };
        let url = self.endpoint(&["values", &target])?;
        let res: ReadResponse = self.call(self.http.get(url)).await?;
        debug!("Read {} rows from {}", res.values.len(), target);
        Ok(values_to_table(res.values, assume_header))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::internal(format!("Cannot extend URL {}", self.base_url)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    async fn call<R>(&self, req: RequestBuilder) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let token = self.tokens.access_token().await?;
        let res = req
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::sink("Request to Google Sheets timed out")
                } else {
                    AppError::sink(format!("Google Sheets request failed: {e}"))
                }
            })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| AppError::sink(format!("Failed to read Google Sheets response: {e}")))?;
        if !status.is_success() {
            return Err(AppError::sink(format!(
                "Google Sheets API error ({status}): {}",
                api_error_message(&body)
            )));
        }

        trace!(%body, "sheets response");
        serde_json::from_str(&body)
            .map_err(|e| AppError::sink(format!("Unexpected Google Sheets response: {e}")))
    }
}

#[async_trait]
impl SheetSink for GoogleSheetsClient {
    async fn write(&self, request: &WriteRequest, table: &QueryResult) -> Result<WriteReport> {
        self.ensure_worksheet(&request.worksheet).await?;

        if request.clear {
            let target = clear_range(&request.worksheet, request.range.as_deref());
            self.clear(&target).await?;
            info!("Cleared {}", target);
        }

        let target = a1_range(&request.worksheet, request.range.as_deref());
        if table.is_empty() {
            debug!("No rows to write to {}", target);
            return Ok(WriteReport {
                worksheet: request.worksheet.clone(),
                range: target,
                rows_written: 0,
                cleared: request.clear,
            });
        }

        let res = self.update(&target, to_cells(&table.rows)).await?;
        Ok(WriteReport {
            worksheet: request.worksheet.clone(),
            rows_written: res
                .updated_rows
                .map(|n| n as usize)
                .unwrap_or_else(|| table.row_count()),
            range: res.updated_range.unwrap_or(target),
            cleared: request.clear,
        })
    }
}

/// Pulls `error.message` out of an API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(JsonValue::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

/// Spreadsheet column letters: 0 is `A`, 25 is `Z`, 26 is `AA`.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Builds a table from the rows returned by a values read.
///
/// Short rows are padded with nulls to the widest row.
pub fn values_to_table(values: Vec<Vec<JsonValue>>, assume_header: bool) -> QueryResult {
    let mut rows = values.into_iter();
    let header = if assume_header { rows.next() } else { None };

    let data: Vec<Vec<Value>> = rows
        .map(|row| row.into_iter().map(cell_value).collect())
        .collect();

    let width = data
        .iter()
        .map(Vec::len)
        .chain(header.as_ref().map(Vec::len))
        .max()
        .unwrap_or(0);

    let columns = (0..width)
        .map(|i| {
            let name = header
                .as_ref()
                .and_then(|h| h.get(i))
                .map(cell_text)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| column_letter(i));
            ColumnInfo::new(name, "text")
        })
        .collect();

    let rows: Vec<Row> = data
        .into_iter()
        .map(|mut row| {
            row.resize(width, Value::Null);
            row
        })
        .collect();

    QueryResult::with_data(columns, rows)
}

fn cell_text(cell: &JsonValue) -> String {
    match cell {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn cell_value(cell: JsonValue) -> Value {
    match cell {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        JsonValue::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}
