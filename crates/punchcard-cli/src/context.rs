use std::error::Error;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use dialoguer::Password;
use punchcard_core::{Config, ConfigError, Credentials, OutputFormat, Session, TerminalPrompt};
use tracing::debug;

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub output: OutputFormat,
}

impl Context {
    pub fn new(config: Config, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config,
            config_path,
            output,
        }
    }

    /// A session logged in with the configured credentials.
    pub fn session(&self) -> Result<Session, Box<dyn Error>> {
        let base_url = self.config.base_url()?;
        let mut session =
            Session::new(base_url)?.with_endpoints(self.config.endpoints.clone());
        let credentials = self.credentials()?;
        debug!(email = %credentials.email, "logging in");
        session.login(&credentials, &TerminalPrompt)?;
        Ok(session)
    }

    /// Configured credentials; a missing password is asked for on a terminal.
    fn credentials(&self) -> Result<Credentials, Box<dyn Error>> {
        match self.config.credentials() {
            Ok(credentials) => Ok(credentials),
            Err(ConfigError::MissingKey(key)) if key == "auth.password" && io::stdin().is_terminal() => {
                let password = Password::new()
                    .with_prompt(format!("Password for {}", self.config.auth.email.trim()))
                    .interact()?;
                let mut config = self.config.clone();
                config.auth.password = password;
                Ok(config.credentials()?)
            }
            Err(e) => Err(e.into()),
        }
    }
}
