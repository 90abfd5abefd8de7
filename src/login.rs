//! Warehouse login with bounded retries.
//!
//! A login is a small state machine: it starts `Attempting` at attempt 1 and
//! ends `Connected` or `Failed`. A failed attempt is retried only when a
//! passcode prompt is configured, because repeating a non-interactive login
//! with the same credentials cannot succeed. At most [`MAX_LOGIN_ATTEMPTS`]
//! attempts are made.

use crate::error::{AppError, Result};
use crate::warehouse::{Connector, WarehouseClient, WarehouseCredentials};
use std::fmt;
use tracing::{info, warn};

/// Upper bound on login attempts.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

/// Login progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// About to make the given attempt (1-based).
    Attempting { attempt: u32 },
    /// A session is open.
    Connected,
    /// No session could be opened.
    Failed,
}

impl LoginState {
    /// Returns true for `Connected` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Attempting { .. })
    }
}

/// Computes the state that follows an attempt.
pub fn next_state(attempt: u32, interactive: bool, succeeded: bool) -> LoginState {
    if succeeded {
        LoginState::Connected
    } else if interactive && attempt < MAX_LOGIN_ATTEMPTS {
        LoginState::Attempting {
            attempt: attempt + 1,
        }
    } else {
        LoginState::Failed
    }
}

/// Source of MFA passcodes.
pub trait PasscodePrompt: Send + Sync {
    /// Asks for the passcode to use on `attempt`.
    fn passcode(&self, attempt: u32) -> Result<String>;
}

/// Reads the passcode from the terminal without echoing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl PasscodePrompt for TerminalPrompt {
    fn passcode(&self, _attempt: u32) -> Result<String> {
        rpassword::prompt_password("Enter MFA passcode: ")
            .map(|p| p.trim().to_string())
            .map_err(|e| AppError::auth(format!("Failed to read passcode: {e}")))
    }
}

/// Result of a login run. `Failed` carries no session; the caller decides
/// what to do about it.
pub struct LoginOutcome {
    pub state: LoginState,
    /// Number of attempts made.
    pub attempts: u32,
    /// Login name the attempts were made for.
    pub user: String,
    pub session: Option<Box<dyn WarehouseClient>>,
}

impl LoginOutcome {
    pub fn is_connected(&self) -> bool {
        self.state == LoginState::Connected
    }
}

impl fmt::Debug for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOutcome")
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("user", &self.user)
            .field("session", &self.session.as_ref().map(|_| "<open>"))
            .finish()
    }
}

/// Drives login attempts against a [`Connector`].
pub struct LoginRetrier<'a> {
    connector: &'a dyn Connector,
    credentials: &'a WarehouseCredentials,
    prompt: Option<&'a dyn PasscodePrompt>,
}

impl<'a> LoginRetrier<'a> {
    /// Creates a non-interactive retrier (single attempt).
    pub fn new(connector: &'a dyn Connector, credentials: &'a WarehouseCredentials) -> Self {
        Self {
            connector,
            credentials,
            prompt: None,
        }
    }

    /// Requires a passcode, collected from `prompt` before every attempt.
    pub fn with_passcode_prompt(mut self, prompt: &'a dyn PasscodePrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Runs the state machine to a terminal state. Never fails; check the outcome.
    pub async fn login(&self) -> LoginOutcome {
        let interactive = self.prompt.is_some();
        let mut state = LoginState::Attempting { attempt: 1 };
        let mut attempts = 0;
        let mut session = None;

        while let LoginState::Attempting { attempt } = state {
            attempts = attempt;
            println!("Attempt {attempt}");

            match self.attempt(attempt).await {
                Ok(client) => {
                    session = Some(client);
                    state = next_state(attempt, interactive, true);
                }
                Err(e) => {
                    println!("Error: {e}");
                    warn!(
                        "Login attempt {} for {} failed: {}",
                        attempt, self.credentials.user, e
                    );
                    state = next_state(attempt, interactive, false);
                    if let LoginState::Attempting { .. } = state {
                        println!("Incorrect passcode - provide it again");
                    }
                }
            }
        }

        match state {
            LoginState::Connected => {
                println!("Connected to Snowflake");
                info!("Connected after {} attempt(s)", attempts);
            }
            _ if interactive => println!("{attempts} failed attempts"),
            _ => {}
        }

        LoginOutcome {
            state,
            attempts,
            user: self.credentials.user.clone(),
            session,
        }
    }

    async fn attempt(&self, attempt: u32) -> Result<Box<dyn WarehouseClient>> {
        let passcode = match self.prompt {
            Some(prompt) => Some(prompt.passcode(attempt)?),
            None => None,
        };
        self.connector
            .connect(self.credentials, passcode.as_deref())
            .await
    }
}
