//! Failure alerts for snow-sheets.
//!
//! Alerts go to a chat webhook that accepts `{"text": "..."}` payloads.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{AppError, Result};

/// Default timeout for webhook calls.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Receives operator alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts alerts to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| AppError::config(format!("Invalid alerts.webhook_url: {e}")))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        debug!("Sending alert to {}", self.url.host_str().unwrap_or("webhook"));

        let res = self
            .http
            .post(self.url.clone())
            .json(&WebhookMessage { text: message })
            .send()
            .await
            .map_err(|e| AppError::internal(format!("Webhook request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(AppError::internal(format!(
                "Webhook rejected alert with status {status}"
            )));
        }
        Ok(())
    }
}
