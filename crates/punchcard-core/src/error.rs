//! Core error types for punchcard-core.
//!
//! One [`CoreError`] crosses the crate boundary. The login flow, the
//! envelope decoder and the configuration layer each have their own enum
//! so callers can branch on the variant they care about.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for punchcard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The configured base address could not be parsed
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Transport-level failure (DNS, connection reset, TLS, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response without a structured error payload
    #[error("Unexpected HTTP status {status} ({body_len} byte body)")]
    UnexpectedStatus { status: u16, body_len: usize },

    /// The remote API reported `success: false`
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The login flow did not complete
    #[error("Login failed: {0}")]
    Login(#[from] LoginError),

    /// A domain operation was called before a successful login
    #[error("not logged in")]
    NotLoggedIn,

    /// No project matched the given name or identifier
    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured error reported by the remote API inside the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    /// Per-field messages, keyed by the offending request field.
    pub field_errors: BTreeMap<String, Vec<String>>,
    /// HTTP status of the response that carried the envelope.
    pub status: u16,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote responded with: {} (code {})", self.message, self.code)?;
        for (field, messages) in &self.field_errors {
            for message in messages {
                write!(f, " {field}: {message}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Envelope decoding errors.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Missing or unparseable Content-Type header
    #[error("missing or invalid Content-Type header: {0:?}")]
    InvalidContentType(String),

    /// Response was not JSON
    #[error("expected JSON response, but got {0:?}")]
    ContentType(String),

    /// Body was JSON but did not match the expected shape
    #[error("parse body: {0}")]
    Body(#[source] serde_json::Error),
}

/// Login flow errors.
///
/// `UnlockRequired` and `TwoFactorRequired` are expected branches rather
/// than bugs: the caller is supposed to prompt the user or ask them to
/// re-run with a token.
#[derive(Error, Debug)]
pub enum LoginError {
    /// The flow landed somewhere other than the expected page
    #[error(
        "unexpected redirect: want host {want_host:?} path {want_path:?}, \
         got host {got_host:?} path {got_path:?}"
    )]
    UnexpectedRedirect {
        want_host: String,
        got_host: String,
        want_path: String,
        got_path: String,
    },

    /// The remote service wants the account unlocked with an emailed token
    #[error("account unlock required: re-run with the token sent to your email")]
    UnlockRequired,

    /// The unlock token was not accepted
    #[error("unlock rejected: {}", .0.as_deref().unwrap_or("no error message found on page"))]
    UnlockRejected(Option<String>),

    /// A two-factor code is needed but none was supplied and no terminal is attached
    #[error("two-factor code required, but none was provided")]
    TwoFactorRequired,

    /// The two-factor code was not accepted
    #[error("two-factor code rejected")]
    TwoFactorRejected,

    /// A hidden form token could not be found on an intermediate page
    #[error("hidden form token '{0}' not found on page")]
    HiddenTokenMissing(String),

    /// Post-login identity resolution failed
    #[error("employee ID not found: {0}")]
    IdentityNotFound(String),

    /// Reading a code from the terminal failed
    #[error("read two-factor code: {0}")]
    Prompt(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_field_messages() {
        let mut field_errors = BTreeMap::new();
        field_errors.insert("start".to_string(), vec!["too early".to_string()]);
        let err = ApiError {
            code: 42,
            message: "bad".to_string(),
            field_errors,
            status: 422,
        };
        assert_eq!(
            err.to_string(),
            "remote responded with: bad (code 42) start: too early"
        );
    }

    #[test]
    fn unlock_rejected_without_message() {
        let err = LoginError::UnlockRejected(None);
        assert!(err.to_string().contains("no error message found"));
    }
}
