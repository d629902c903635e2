//! Login against the HR web application's HTML form flow.
//!
//! The flow is an explicit state machine ([`LoginState`]) driven by where
//! each form submission lands. See [`flow`] for the transitions.

pub mod flow;
pub mod prompt;

use std::fmt;

use serde::Serialize;

pub use flow::{classify, Landing, LoginState};
pub use prompt::{CodePrompt, NoPrompt, TerminalPrompt};

/// Login credentials. Consumed by [`Session::login`](crate::Session::login)
/// and never stored on the session.
#[derive(Clone, Default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Pre-supplied two-factor code; skips the prompt.
    pub two_factor_code: Option<String>,
    /// Token from the account-unlock email.
    pub email_token: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            two_factor_code: None,
            email_token: None,
        }
    }

    pub fn with_two_factor_code(mut self, code: impl Into<String>) -> Self {
        self.two_factor_code = non_empty(code.into());
        self
    }

    pub fn with_email_token(mut self, token: impl Into<String>) -> Self {
        self.email_token = non_empty(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("two_factor_code", &self.two_factor_code.as_ref().map(|_| "<redacted>"))
            .field("email_token", &self.email_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Who the session is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub employee_id: u64,
    pub full_name: Option<String>,
    pub email: Option<String>,
}
