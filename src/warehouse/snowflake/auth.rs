//! Snowflake session login and teardown.

use chrono::{DateTime, Duration, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use super::client::{RequestId, SnowflakeClient};
use crate::error::{AppError, Result};
use crate::warehouse::WarehouseCredentials;

const SESSION_ENDPOINT: &str = "/session";
const AUTH_ENDPOINT: &str = "/session/v1/login-request";

const CLIENT_APP_ID: &str = "Go";
const CLIENT_APP_VERSION: &str = "1.6.18";
const CLIENT_APP_OS: &str = "linux";

/// Value sent in `EXT_AUTHN_DUO_METHOD` when a passcode accompanies the login.
const MFA_PASSCODE_METHOD: &str = "passcode";

#[derive(Debug)]
pub struct Token {
    value: String,
    validity: Duration,
    created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: String, validity_in_seconds: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            value,
            validity: Duration::seconds(validity_in_seconds),
            created_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_valid(&self) -> bool {
        Utc::now().signed_duration_since(self.created_at) < self.validity
    }
}

/// Session token returned by a successful login.
#[derive(Debug)]
pub struct Session {
    pub token: Token,
}

#[derive(Debug, Serialize)]
struct SessionParams {
    delete: bool,
}

#[derive(Debug, Deserialize)]
struct CloseResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

impl Session {
    pub async fn close(&self, client: &SnowflakeClient) -> Result<()> {
        let res: CloseResponse = client
            .post(
                SESSION_ENDPOINT,
                &SessionParams { delete: true },
                &serde_json::json!({}),
                Some(self.token.value()),
                AppError::Execution,
            )
            .await?;

        if !res.success {
            return Err(AppError::execution(format!(
                "Failed to close session: {}",
                res.message.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AuthRequest {
    data: AuthBodyData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthParams {
    request_id: RequestId,

    #[serde(skip_serializing_if = "Option::is_none")]
    database_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    schema_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    role_name: Option<String>,
}

impl From<&WarehouseCredentials> for AuthParams {
    fn from(value: &WarehouseCredentials) -> Self {
        Self {
            request_id: RequestId::new(),
            database_name: Some(value.database.clone()),
            schema_name: Some(value.schema.clone()),
            warehouse: value.warehouse.clone(),
            role_name: value.role.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    data: Option<TokenResponse>,
    message: Option<String>,
    code: Option<String>,
    success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: Option<String>,
    validity_in_seconds: Option<i64>,
}

impl TryFrom<TokenResponse> for Session {
    type Error = AppError;

    fn try_from(value: TokenResponse) -> Result<Self> {
        let created_at = Utc::now();
        let missing = |field: &str| AppError::auth(format!("Login response is missing '{field}'"));

        Ok(Self {
            token: Token::new(
                value.token.ok_or_else(|| missing("token"))?,
                value
                    .validity_in_seconds
                    .ok_or_else(|| missing("validityInSeconds"))?,
                created_at,
            ),
        })
    }
}

#[derive(Debug, Default)]
struct ClientEnvironment;

impl Serialize for ClientEnvironment {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_map(None)?;
        s.serialize_entry("APPLICATION", env!("CARGO_PKG_NAME"))?;
        s.serialize_entry("OS", CLIENT_APP_OS)?;
        s.end()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct AuthBodyData {
    client_app_id: &'static str,
    client_app_version: &'static str,
    client_environment: ClientEnvironment,

    account_name: String,
    login_name: String,
    password: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    ext_authn_duo_method: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    passcode: Option<String>,
}

impl AuthBodyData {
    fn new(credentials: &WarehouseCredentials, passcode: Option<&str>) -> Self {
        Self {
            client_app_id: CLIENT_APP_ID,
            client_app_version: CLIENT_APP_VERSION,
            client_environment: ClientEnvironment,
            account_name: account_name(&credentials.account).to_string(),
            login_name: credentials.user.clone(),
            password: credentials.password.clone(),
            ext_authn_duo_method: passcode.map(|_| MFA_PASSCODE_METHOD),
            passcode: passcode.map(String::from),
        }
    }
}

/// The account name is the identifier without any region/cloud suffix.
pub(crate) fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

/// Performs one login request.
pub async fn login(
    client: &SnowflakeClient,
    credentials: &WarehouseCredentials,
    passcode: Option<&str>,
) -> Result<Session> {
    let params = AuthParams::from(credentials);
    let body = AuthRequest {
        data: AuthBodyData::new(credentials, passcode),
    };

    let res: AuthResponse = client
        .post(AUTH_ENDPOINT, &params, &body, None, AppError::Auth)
        .await?;

    if !res.success {
        return Err(AppError::auth(format!(
            "{} ({})",
            res.message.unwrap_or_else(|| "login rejected".to_string()),
            res.code.unwrap_or_default()
        )));
    }

    res.data
        .ok_or_else(|| AppError::auth("Login response carried no session data"))?
        .try_into()
}
