//! Statement execution against the Snowflake query endpoint.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::auth::Session;
use super::client::{RequestId, SnowflakeClient};
use super::decode::{decode_rows, RowType};
use crate::error::{AppError, Result};
use crate::warehouse::{ColumnInfo, Row};

const QUERY_ENDPOINT: &str = "/queries/v1/query-request";

/// Response codes meaning the statement is still running.
const QUERY_IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];

/// Delay between polls of a still-running statement.
const POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct QueryBodyParameters {
    go_query_result_format: &'static str,
}

impl Default for QueryBodyParameters {
    fn default() -> Self {
        Self {
            go_query_result_format: "json",
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    is_internal: bool,
    describe_only: bool,
    parameters: QueryBodyParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    request_id: RequestId,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
    message: Option<String>,
    code: Option<String>,
    success: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    query_id: Option<String>,
    total: Option<i64>,
    rowtype: Option<Vec<RowType>>,
    rowset: Option<Vec<Vec<Option<String>>>>,
    query_result_format: Option<String>,

    #[serde(default)]
    chunks: Vec<ChunkMeta>,
    chunk_headers: Option<HashMap<String, String>>,
    qrmk: Option<String>,

    get_result_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkMeta {
    url: String,
    row_count: Option<i64>,
}

/// Columns and fully downloaded rows of one statement.
#[derive(Debug)]
pub struct FetchedRows {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
}

/// A statement ready to run on a session.
pub struct Query<'a> {
    pub sql: &'a str,
    pub sequence_id: u64,
}

impl Query<'_> {
    /// Runs the statement, waits for it to finish and downloads every chunk.
    pub async fn run(self, client: &SnowflakeClient, session: &Session) -> Result<FetchedRows> {
        if !session.token.is_valid() {
            warn!("Session token has expired; the server may reject the statement");
        }

        let token = session.token.value();
        let mut res: QueryResponse = client
            .post(
                QUERY_ENDPOINT,
                &QueryParams {
                    request_id: RequestId::new(),
                },
                &QueryBody {
                    sql_text: self.sql,
                    sequence_id: self.sequence_id,
                    ..Default::default()
                },
                Some(token),
                AppError::Execution,
            )
            .await?;

        while is_in_progress(&res) {
            let url = res
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| {
                    AppError::execution("Statement is running but no result URL was given")
                })?;
            debug!("Statement still running, polling {}", url);
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            res = client.get(&url, token, AppError::Execution).await?;
        }

        if !res.success {
            return Err(AppError::execution(format!(
                "{} ({})",
                res.message.unwrap_or_else(|| "statement failed".to_string()),
                res.code.unwrap_or_default()
            )));
        }

        let data = res.data.unwrap_or_default();
        fetch_rows(client, data).await
    }
}

fn is_in_progress(res: &QueryResponse) -> bool {
    res.code
        .as_deref()
        .is_some_and(|code| QUERY_IN_PROGRESS_CODES.contains(&code))
}

async fn fetch_rows(client: &SnowflakeClient, data: QueryData) -> Result<FetchedRows> {
    if let Some(format) = data.query_result_format.as_deref() {
        if !format.eq_ignore_ascii_case("json") {
            return Err(AppError::execution(format!(
                "Unsupported result format '{format}'"
            )));
        }
    }

    let rowtype = data.rowtype.unwrap_or_default();
    let columns: Vec<ColumnInfo> = rowtype.iter().map(ColumnInfo::from).collect();

    let mut rows = decode_rows(&rowtype, data.rowset.unwrap_or_default())?;

    if !data.chunks.is_empty() {
        let headers = chunk_headers(data.chunk_headers, data.qrmk);
        for (i, chunk) in data.chunks.iter().enumerate() {
            debug!(
                "Downloading chunk {}/{} ({} rows)",
                i + 1,
                data.chunks.len(),
                chunk.row_count.unwrap_or_default()
            );
            let body = client.fetch_chunk(&chunk.url, &headers).await?;
            rows.extend(decode_rows(&rowtype, parse_chunk(&body)?)?);
        }
    }

    if let Some(total) = data.total {
        if total >= 0 && rows.len() as i64 != total {
            warn!(
                "Query {} reported {} rows but {} were downloaded",
                data.query_id.as_deref().unwrap_or("?"),
                total,
                rows.len()
            );
        }
    }

    Ok(FetchedRows { columns, rows })
}

/// Headers required to read chunks; older responses only carry the master key.
fn chunk_headers(
    headers: Option<HashMap<String, String>>,
    qrmk: Option<String>,
) -> HashMap<String, String> {
    match (headers, qrmk) {
        (Some(headers), _) if !headers.is_empty() => headers,
        (_, Some(qrmk)) => HashMap::from([
            (
                "x-amz-server-side-encryption-customer-algorithm".to_string(),
                "AES256".to_string(),
            ),
            (
                "x-amz-server-side-encryption-customer-key".to_string(),
                qrmk,
            ),
        ]),
        _ => HashMap::new(),
    }
}

/// Chunk bodies are a comma-separated list of row arrays without the outer brackets.
fn parse_chunk(body: &str) -> Result<Vec<Vec<Option<String>>>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&format!("[{body}]"))
        .map_err(|e| AppError::execution(format!("Failed to parse result chunk: {e}")))
}
