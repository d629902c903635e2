//! TOML-based client configuration.
//!
//! Stores:
//! - The base address of the HR instance
//! - Login credentials (optionally left for environment variables)
//! - Attendance defaults (minimum period duration, standard start time)
//! - Output and logging preferences
//! - Endpoint overrides for deployments with a different page layout
//!
//! Configuration is stored at `~/.config/punchcard/config.toml`.
//! Set `PUNCHCARD_ENV=dev` to use `~/.config/punchcard-dev/` instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::auth::Credentials;
use crate::duration::parse_duration;
use crate::endpoints::Endpoints;
use crate::error::ConfigError;

/// Environment variables that override file values.
pub const ENV_BASE_URL: &str = "PUNCHCARD_BASE_URL";
pub const ENV_EMAIL: &str = "PUNCHCARD_EMAIL";
pub const ENV_PASSWORD: &str = "PUNCHCARD_PASSWORD";
pub const ENV_TWO_FACTOR_CODE: &str = "PUNCHCARD_TWO_FACTOR_CODE";
pub const ENV_EMAIL_TOKEN: &str = "PUNCHCARD_EMAIL_TOKEN";

const START_TIME_FORMAT: &str = "%H:%M";

/// Format of command results written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pretty => write!(f, "pretty"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::InvalidValue {
                key: "output".to_string(),
                message: format!("'{other}' is not one of: pretty, json"),
            }),
        }
    }
}

/// Log severity filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration. Logs go to stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

/// Login configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuthConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub two_factor_code: Option<String>,
    #[serde(default)]
    pub email_token: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("email", &self.email)
            .field("password", &redact(&self.password))
            .field("two_factor_code", &self.two_factor_code.as_deref().map(redact))
            .field("email_token", &self.email_token.as_deref().map(redact))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/punchcard/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub base_url: String,
    /// Periods shorter than this are skipped when writing attendance.
    #[serde(default = "default_minimum_period_duration")]
    pub minimum_period_duration: String,
    /// `HH:MM` used by `attendance add` on a day without periods.
    #[serde(default)]
    pub standard_start_time: Option<String>,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_minimum_period_duration() -> String {
    "1m".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            minimum_period_duration: default_minimum_period_duration(),
            standard_start_time: None,
            output: OutputFormat::default(),
            auth: AuthConfig::default(),
            log: LogConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

/// Returns `~/.config/punchcard[-dev]/` based on `PUNCHCARD_ENV`.
pub fn config_dir() -> PathBuf {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PUNCHCARD_ENV").unwrap_or_else(|_| "production".to_string());

    if env == "dev" {
        base_dir.join("punchcard-dev")
    } else {
        base_dir.join("punchcard")
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load from `path`, or from [`default_path`](Self::default_path).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()),
        }
    }

    /// Load from disk; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| failed(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(failed(e.to_string())),
        }
    }

    /// Persist to disk, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))
    }

    /// Override values from `PUNCHCARD_*` variables found by `lookup`.
    /// Empty variables are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_BASE_URL) {
            self.base_url = v;
        }
        if let Some(v) = get(ENV_EMAIL) {
            self.auth.email = v;
        }
        if let Some(v) = get(ENV_PASSWORD) {
            self.auth.password = v;
        }
        if let Some(v) = get(ENV_TWO_FACTOR_CODE) {
            self.auth.two_factor_code = Some(v);
        }
        if let Some(v) = get(ENV_EMAIL_TOKEN) {
            self.auth.email_token = Some(v);
        }
    }

    /// [`apply_env`](Self::apply_env) against the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.minimum_period_duration()?;
        updated.standard_start_time()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its value, secrets redacted.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (key, child) in map {
                        let path = if prefix.is_empty() {
                            key.clone()
                        } else {
                            format!("{prefix}.{key}")
                        };
                        walk(&path, child, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self.redacted()) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Copy with password and tokens replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.auth.password = redact(&copy.auth.password).to_string();
        copy.auth.two_factor_code = copy.auth.two_factor_code.as_deref().map(|s| redact(s).to_string());
        copy.auth.email_token = copy.auth.email_token.as_deref().map(|s| redact(s).to_string());
        copy
    }

    /// JSON Schema of the config file.
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Config)
    }

    /// # Errors
    ///
    /// [`ConfigError::MissingKey`] when no base address is configured.
    pub fn base_url(&self) -> Result<&str, ConfigError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingKey("base_url".to_string()));
        }
        Ok(url)
    }

    /// # Errors
    ///
    /// [`ConfigError::MissingKey`] for a missing email or password.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if self.auth.email.trim().is_empty() {
            return Err(ConfigError::MissingKey("auth.email".to_string()));
        }
        if self.auth.password.is_empty() {
            return Err(ConfigError::MissingKey("auth.password".to_string()));
        }
        let mut credentials = Credentials::new(self.auth.email.trim(), self.auth.password.clone());
        if let Some(code) = &self.auth.two_factor_code {
            credentials = credentials.with_two_factor_code(code.clone());
        }
        if let Some(token) = &self.auth.email_token {
            credentials = credentials.with_email_token(token.clone());
        }
        Ok(credentials)
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] for an unparseable duration.
    pub fn minimum_period_duration(&self) -> Result<chrono::Duration, ConfigError> {
        parse_duration(&self.minimum_period_duration).map_err(|e| ConfigError::InvalidValue {
            key: "minimum_period_duration".to_string(),
            message: e.to_string(),
        })
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] unless the value is `HH:MM`.
    pub fn standard_start_time(&self) -> Result<Option<NaiveTime>, ConfigError> {
        let Some(raw) = self.standard_start_time.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveTime::parse_from_str(raw, START_TIME_FORMAT)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: "standard_start_time".to_string(),
                message: format!("'{raw}' is not HH:MM: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.minimum_period_duration, "1m");
        assert_eq!(parsed.log.level, LogLevel::Warn);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            base_url = "https://example.hr.test"
            output = "json"

            [auth]
            email = "me@example.test"

            [endpoints]
            landing = "/dashboard"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.output, OutputFormat::Json);
        assert_eq!(cfg.auth.email, "me@example.test");
        assert_eq!(cfg.endpoints.landing, "/dashboard");
        assert_eq!(cfg.endpoints.login, "/login/index");
        assert_eq!(cfg.log.format, LogFormat::Pretty);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn broken_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.base_url = "https://example.hr.test".into();
        cfg.auth.two_factor_code = Some("123456".into());
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("log.level").as_deref(), Some("warn"));
        assert_eq!(cfg.get("endpoints.login").as_deref(), Some("/login/index"));
        assert_eq!(cfg.get("minimum_period_duration").as_deref(), Some("1m"));
        assert!(cfg.get("log.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("auth.email", "me@example.test").unwrap();
        cfg.set("log.level", "debug").unwrap();
        cfg.set("output", "json").unwrap();
        cfg.set("auth.two_factor_code", "654321").unwrap();
        assert_eq!(cfg.auth.email, "me@example.test");
        assert_eq!(cfg.log.level, LogLevel::Debug);
        assert_eq!(cfg.output, OutputFormat::Json);
        assert_eq!(cfg.auth.two_factor_code.as_deref(), Some("654321"));
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("log.colour", "yes"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("log.level", "loud"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("minimum_period_duration", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("standard_start_time", "9am"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://env.hr.test"),
            (ENV_PASSWORD, "from-env"),
            (ENV_EMAIL, "  "),
            (ENV_EMAIL_TOKEN, "tok"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.auth.email = "file@example.test".into();
        cfg.apply_env(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(cfg.base_url, "https://env.hr.test");
        assert_eq!(cfg.auth.password, "from-env");
        assert_eq!(cfg.auth.email, "file@example.test");
        assert_eq!(cfg.auth.email_token.as_deref(), Some("tok"));
        assert_eq!(cfg.auth.two_factor_code, None);
    }

    #[test]
    fn credentials_require_email_and_password() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.credentials(), Err(ConfigError::MissingKey(k)) if k == "auth.email"));
        cfg.auth.email = "me@example.test".into();
        assert!(matches!(cfg.credentials(), Err(ConfigError::MissingKey(k)) if k == "auth.password"));
        cfg.auth.password = "secret".into();
        cfg.auth.email_token = Some("tok".into());
        let creds = cfg.credentials().unwrap();
        assert_eq!(creds.email, "me@example.test");
        assert_eq!(creds.email_token.as_deref(), Some("tok"));
    }

    #[test]
    fn entries_redact_secrets() {
        let mut cfg = Config::default();
        cfg.auth.password = "hunter2".into();
        let entries = cfg.entries();
        let password = entries.iter().find(|(k, _)| k == "auth.password").unwrap();
        assert_eq!(password.1, "<redacted>");
        assert!(entries.iter().any(|(k, v)| k == "endpoints.unlock" && v == "/login/token-auth"));
        assert!(!format!("{:?}", cfg.auth).contains("hunter2"));
    }

    #[test]
    fn typed_accessors() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.base_url(), Err(ConfigError::MissingKey(_))));
        assert_eq!(cfg.minimum_period_duration().unwrap(), chrono::Duration::minutes(1));
        assert_eq!(cfg.standard_start_time().unwrap(), None);
        cfg.standard_start_time = Some("08:30".into());
        assert_eq!(
            cfg.standard_start_time().unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0)
        );
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn schema_describes_every_section() {
        let schema = serde_json::to_value(Config::schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for key in ["base_url", "minimum_period_duration", "output", "auth", "log", "endpoints"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
        let definitions = schema["definitions"].as_object().unwrap();
        assert!(definitions["OutputFormat"]["enum"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("json")));
        assert!(definitions["Endpoints"]["properties"].get("two_factor").is_some());
    }
}
