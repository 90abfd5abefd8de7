//! Mock warehouse for testing.
//!
//! Provides scripted in-memory doubles for the warehouse session and the
//! connector used by the login retrier.

use super::{Connector, QueryResult, WarehouseClient, WarehouseCredentials};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock session that answers queries from a list of canned responses.
///
/// A response is selected by the first registered fragment contained in the
/// SQL text. Unmatched statements return an empty result.
pub struct MockWarehouseClient {
    user: String,
    responses: Vec<(String, std::result::Result<QueryResult, String>)>,
    executed: Mutex<Vec<String>>,
}

impl MockWarehouseClient {
    /// Creates a mock session with no canned responses.
    pub fn new() -> Self {
        Self {
            user: "mock".to_string(),
            responses: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Sets the login name reported by the session.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Returns `result` for statements containing `fragment`.
    pub fn with_result(mut self, fragment: impl Into<String>, result: QueryResult) -> Self {
        self.responses.push((fragment.into(), Ok(result)));
        self
    }

    /// Fails statements containing `fragment` with an execution error.
    pub fn with_error(mut self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses.push((fragment.into(), Err(message.into())));
        self
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl Default for MockWarehouseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WarehouseClient for MockWarehouseClient {
    fn user(&self) -> &str {
        &self.user
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }

        match self
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            Some((_, Ok(result))) => Ok(result.clone()),
            Some((_, Err(message))) => Err(AppError::execution(message.clone())),
            None => Ok(QueryResult::new()),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A connector that plays back a script of login outcomes.
///
/// Each attempt consumes one entry: `Ok(())` opens a [`MockWarehouseClient`],
/// `Err(message)` fails with an authentication error. Attempts past the end
/// of the script fail.
pub struct MockConnector {
    script: Mutex<VecDeque<std::result::Result<(), String>>>,
    passcodes: Mutex<Vec<Option<String>>>,
}

impl MockConnector {
    /// Creates a connector that plays back `script`.
    pub fn new(script: Vec<std::result::Result<(), String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            passcodes: Mutex::new(Vec::new()),
        }
    }

    /// A connector whose every attempt fails with `message`.
    pub fn always_failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(vec![Err(message.clone()), Err(message.clone()), Err(message)])
    }

    /// Number of login attempts made so far.
    pub fn attempts(&self) -> usize {
        self.passcodes.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Passcodes received, one entry per attempt.
    pub fn passcodes(&self) -> Vec<Option<String>> {
        self.passcodes
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
        passcode: Option<&str>,
    ) -> Result<Box<dyn WarehouseClient>> {
        if let Ok(mut passcodes) = self.passcodes.lock() {
            passcodes.push(passcode.map(String::from));
        }

        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err("no scripted login outcome left".to_string()));

        match next {
            Ok(()) => Ok(Box::new(
                MockWarehouseClient::new().with_user(credentials.user.clone()),
            )),
            Err(message) => Err(AppError::auth(message)),
        }
    }
}
