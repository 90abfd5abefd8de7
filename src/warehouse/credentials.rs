//! Warehouse credential file.

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Contents of the warehouse credential JSON file.
#[derive(Clone, Deserialize)]
pub struct WarehouseCredentials {
    pub user: String,
    pub password: String,
    /// Account identifier, optionally with region (`xy12345.us-east-1`).
    pub account: String,
    pub database: String,
    pub schema: String,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl WarehouseCredentials {
    /// Reads credentials from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::io(format!(
                "Failed to read warehouse credentials {}: {e}",
                path.display()
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            AppError::config(format!(
                "Invalid warehouse credentials in {}: {e}",
                path.display()
            ))
        })
    }

    /// Returns a display-safe string (no password) for status output.
    pub fn display_string(&self) -> String {
        format!(
            "{}@{} ({}.{})",
            self.user, self.account, self.database, self.schema
        )
    }
}

impl fmt::Debug for WarehouseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .finish()
    }
}
