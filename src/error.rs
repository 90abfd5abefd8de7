//! Error types for snow-sheets.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for snow-sheets operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (unknown profile, missing keys, unparsable YAML, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Warehouse authentication errors (bad credentials, passcode rejected, etc.)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// File system errors (missing SQL, config or credential file)
    #[error("I/O error: {0}")]
    Io(String),

    /// SQL template errors (unresolved placeholder, missing terminator, etc.)
    #[error("Template error: {0}")]
    Template(String),

    /// Warehouse-side execution errors (malformed SQL, unusable session, etc.)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Spreadsheet errors (unknown tab, API rejection, token exchange, etc.)
    #[error("Sheet error: {0}")]
    Sink(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an authentication error with the given message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates a template error with the given message.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a sheet error with the given message.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Auth(_) => "Authentication Error",
            Self::Io(_) => "I/O Error",
            Self::Template(_) => "Template Error",
            Self::Execution(_) => "Execution Error",
            Self::Sink(_) => "Sheet Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = AppError::config("Profile 'qa' not found in config.yaml");
        assert_eq!(
            err.to_string(),
            "Configuration error: Profile 'qa' not found in config.yaml"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_display_auth() {
        let err = AppError::auth("Incorrect username or password was specified.");
        assert_eq!(
            err.to_string(),
            "Authentication error: Incorrect username or password was specified."
        );
        assert_eq!(err.category(), "Authentication Error");
    }

    #[test]
    fn test_error_display_io() {
        let err = AppError::io("Failed to read sql/sales.sql: No such file or directory");
        assert!(err.to_string().starts_with("I/O error: "));
        assert_eq!(err.category(), "I/O Error");
    }

    #[test]
    fn test_error_display_template() {
        let err = AppError::template("unresolved placeholders: {start_date}");
        assert_eq!(
            err.to_string(),
            "Template error: unresolved placeholders: {start_date}"
        );
        assert_eq!(err.category(), "Template Error");
    }

    #[test]
    fn test_error_display_execution() {
        let err = AppError::execution("SQL compilation error: invalid identifier 'EMAL'");
        assert_eq!(
            err.to_string(),
            "Execution error: SQL compilation error: invalid identifier 'EMAL'"
        );
        assert_eq!(err.category(), "Execution Error");
    }

    #[test]
    fn test_error_display_sink() {
        let err = AppError::sink("Worksheet 'Ventas' not found");
        assert_eq!(err.to_string(), "Sheet error: Worksheet 'Ventas' not found");
        assert_eq!(err.category(), "Sheet Error");
    }

    #[test]
    fn test_error_display_internal() {
        let err = AppError::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
        assert_eq!(err.category(), "Internal Error");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppError>();
    }
}
