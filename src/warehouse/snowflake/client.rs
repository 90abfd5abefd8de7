//! HTTP plumbing for the Snowflake REST endpoints.

use crate::error::{AppError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;
use tracing::trace;
use uuid::Uuid;

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const BODY_CONTENT_TYPE: &str = "application/json";
const REQ_ACCEPT: &str = "application/snowflake";

/// Default timeout for a single request.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Unique id attached to each login and query request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut buf = Uuid::encode_buffer();
        serializer.serialize_str(self.0.hyphenated().encode_lower(&mut buf))
    }
}

/// Thin wrapper over `reqwest` bound to one account URL.
#[derive(Debug, Clone)]
pub struct SnowflakeClient {
    base_url: Url,
    inner: Client,
}

impl SnowflakeClient {
    /// Builds a client for `https://<account>.snowflakecomputing.com`.
    pub fn for_account(account: &str) -> Result<Self> {
        let url = format!("https://{account}.snowflakecomputing.com:443");
        Self::new(&url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Builds a client for an arbitrary base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static(BODY_CONTENT_TYPE));
        default_headers.insert(ACCEPT, HeaderValue::from_static(REQ_ACCEPT));

        let inner = Client::builder()
            .user_agent(APP_USER_AGENT)
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::config(format!("Invalid Snowflake URL '{base_url}': {e}")))?;

        Ok(Self { base_url, inner })
    }

    /// POSTs `body` to `path` and decodes the JSON envelope.
    ///
    /// Transport failures and non-2xx statuses are returned as the error
    /// produced by `on_error`, so login and query paths can classify them.
    pub async fn post<P, B, R>(
        &self,
        path: &str,
        params: &P,
        body: &B,
        token: Option<&str>,
        on_error: fn(String) -> AppError,
    ) -> Result<R>
    where
        P: Serialize + ?Sized,
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| AppError::internal(format!("Invalid endpoint '{path}': {e}")))?;

        let mut req = self.inner.post(url).query(params).json(body);
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, auth_header(token)?);
        }

        let res = req.send().await.map_err(|e| on_error(describe(e)))?;
        self.decode(res, on_error).await
    }

    /// GETs a path relative to the account URL (used for result polling).
    pub async fn get<R>(
        &self,
        path: &str,
        token: &str,
        on_error: fn(String) -> AppError,
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| AppError::internal(format!("Invalid endpoint '{path}': {e}")))?;

        let res = self
            .inner
            .get(url)
            .header(AUTHORIZATION, auth_header(token)?)
            .send()
            .await
            .map_err(|e| on_error(describe(e)))?;
        self.decode(res, on_error).await
    }

    /// Downloads a result chunk from cloud storage.
    ///
    /// Chunks are served outside the account URL and must not carry the
    /// session token; they may arrive gzip-compressed without a matching
    /// `Content-Encoding` header.
    pub async fn fetch_chunk(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<String> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AppError::execution(format!("Invalid chunk header '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AppError::execution(format!("Invalid chunk header value: {e}")))?;
            header_map.insert(name, value);
        }

        let res = self
            .inner
            .get(url)
            .headers(header_map)
            .send()
            .await
            .map_err(|e| {
                AppError::execution(format!(
                    "Failed to download result chunk: {}",
                    describe(e)
                ))
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(AppError::execution(format!(
                "Result chunk download failed with status {status}"
            )));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| AppError::execution(format!("Failed to read result chunk: {e}")))?;

        decode_chunk_bytes(&bytes)
    }

    async fn decode<R>(
        &self,
        res: reqwest::Response,
        on_error: fn(String) -> AppError,
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| on_error(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(on_error(format!("Request failed with status {status}: {body}")));
        }

        trace!(%body, "snowflake response");

        serde_json::from_str(&body)
            .map_err(|e| on_error(format!("Failed to parse Snowflake response: {e}")))
    }
}

fn auth_header(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Snowflake Token=\"{token}\""))
        .map_err(|e| AppError::internal(format!("Session token is not a valid header: {e}")))
}

fn describe(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "Request to Snowflake timed out".to_string()
    } else if e.is_connect() {
        format!("Failed to connect to Snowflake: {e}")
    } else {
        format!("Request failed: {e}")
    }
}

/// Turns a raw chunk body into text, inflating it when it is gzip data.
pub(crate) fn decode_chunk_bytes(bytes: &[u8]) -> Result<String> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut out = String::new();
        flate2::read::GzDecoder::new(bytes)
            .read_to_string(&mut out)
            .map_err(|e| AppError::execution(format!("Failed to inflate result chunk: {e}")))?;
        Ok(out)
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| AppError::execution(format!("Result chunk is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_request_id_serializes_as_hyphenated_uuid() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        // quotes + 36 characters
        assert_eq!(json.len(), 38);
        assert_eq!(json.matches('-').count(), 4);
    }

    #[test]
    fn test_decode_plain_chunk() {
        let text = decode_chunk_bytes(br#"["1","a"],["2",null]"#).unwrap();
        assert_eq!(text, r#"["1","a"],["2",null]"#);
    }

    #[test]
    fn test_decode_gzip_chunk() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"["1","a"]"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let text = decode_chunk_bytes(&compressed).unwrap();
        assert_eq!(text, r#"["1","a"]"#);
    }

    #[test]
    fn test_client_for_account() {
        let client = SnowflakeClient::for_account("xy12345.us-east-1").unwrap();
        assert_eq!(
            client.base_url.as_str(),
            "https://xy12345.us-east-1.snowflakecomputing.com/"
        );
    }
}
