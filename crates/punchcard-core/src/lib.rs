//! # Punchcard Core Library
//!
//! Client for an HR web application's employee self-service, used with the
//! employee's own credentials instead of administrative API keys. The CLI
//! binary is a thin layer over this library.
//!
//! ## Architecture
//!
//! - **Transport**: blocking HTTP with a shared cookie jar, header defaults
//!   and a CSRF token, all relative to one normalized base address
//! - **Envelope**: decoder for the `{success, data, error}` JSON wrapper
//! - **Auth**: the HTML form login as an explicit state machine, with the
//!   account-unlock and two-factor branches
//! - **Day cache**: per-date remote day identifiers, prefetched per month and
//!   minted when the remote side has none
//! - **Domain**: attendance calendar and day writes, projects, employees
//!
//! ## Key Components
//!
//! - [`Session`]: one logged-in client; every operation hangs off it
//! - [`Credentials`] and [`CodePrompt`]: inputs of [`Session::login`]
//! - [`DayIdCache`]: date → day identifier
//! - [`Config`]: TOML configuration with environment overrides

pub mod attendance;
pub mod auth;
pub mod config;
pub mod day_cache;
pub mod duration;
pub mod employee;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod markup;
pub mod projects;
pub mod session;
pub mod transport;

pub use attendance::{parse_timestamp, Period, PeriodType, Timecard, WirePeriod};
pub use auth::{CodePrompt, Credentials, LoginState, NoPrompt, SessionIdentity, TerminalPrompt};
pub use config::{Config, LogFormat, LogLevel, OutputFormat};
pub use day_cache::{DayIdCache, KnownDay};
pub use employee::Employee;
pub use endpoints::Endpoints;
pub use error::{
    ApiError, ConfigError, CoreError, DecodeError, LoginError, Result, ValidationError,
};
pub use markup::{FieldExtractor, RegexExtractor};
pub use projects::Project;
pub use session::Session;
pub use transport::{normalize_base_url, RawResponse, Request, Transport, TransportError};
