//! Service-account authorization for the Google APIs.
//!
//! A service-account key signs a short-lived RS256 assertion which is
//! exchanged at the key's token endpoint for an OAuth access token. The
//! token is cached and reused until shortly before it expires.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, Result};

/// Token endpoint used when the key file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested for spreadsheet access.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion (the maximum Google accepts).
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account key file that are needed to sign in.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Loads a key from a JSON key file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::io(format!(
                "Failed to read service account file {}: {e}",
                path.display()
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            AppError::config(format!(
                "Invalid service account file {}: {e}",
                path.display()
            ))
        })
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Claims of the signed assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, issued_at: u64) -> Self {
        Self {
            iss: key.client_email.clone(),
            scope: SCOPES.join(" "),
            aud: key.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// Signs an assertion for `key` issued at `issued_at` (seconds since epoch).
pub fn sign_assertion(key: &ServiceAccountKey, issued_at: u64) -> Result<String> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| AppError::auth(format!("Invalid service account private key: {e}")))?;

    encode(
        &Header::new(Algorithm::RS256),
        &AssertionClaims::new(key, issued_at),
        &encoding_key,
    )
    .map_err(|e| AppError::auth(format!("Failed to sign service account assertion: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn from_response(res: TokenResponse, now: Instant) -> Self {
        let lifetime = Duration::from_secs(res.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        Self {
            value: res.access_token,
            refresh_at: now + lifetime.saturating_sub(EXPIRY_MARGIN),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Hands out access tokens for one service account.
#[derive(Debug)]
pub struct TokenProvider {
    key: ServiceAccountKey,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, http: Client) -> Self {
        Self {
            key,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a new one when needed.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::internal(format!("System clock is before 1970: {e}")))?
            .as_secs();
        let assertion = sign_assertion(&self.key, issued_at)?;

        debug!("Requesting access token for {}", self.key.client_email);
        let res = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AppError::auth(format!("Token request failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| AppError::auth(format!("Failed to read token response: {e}")))?;
        if !status.is_success() {
            return Err(AppError::auth(format!(
                "Token request for {} rejected ({status}): {body}",
                self.key.client_email
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::auth(format!("Unexpected token response: {e}")))?;
        Ok(CachedToken::from_response(parsed, Instant::now()))
    }
}
