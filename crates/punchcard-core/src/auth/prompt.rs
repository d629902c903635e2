//! Two-factor code prompts.

use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::Input;

/// Source of a two-factor code when none was supplied up front.
pub trait CodePrompt {
    /// `Ok(None)` means no interactive input is available.
    fn two_factor_code(&self) -> io::Result<Option<String>>;
}

/// Reads the code from the controlling terminal.
///
/// Only asks when stdin is a terminal or `TERM=dumb`; otherwise reports no
/// input and never blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CodePrompt for TerminalPrompt {
    fn two_factor_code(&self) -> io::Result<Option<String>> {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            let code: String = Input::new()
                .with_prompt("Two-factor code")
                .interact_text()
                .map_err(io::Error::other)?;
            return Ok(Some(code.trim().to_string()));
        }

        if std::env::var("TERM").is_ok_and(|term| term == "dumb") {
            eprint!("Two-factor code: ");
            io::stderr().flush()?;
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            return Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()));
        }

        Ok(None)
    }
}

/// Never prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl CodePrompt for NoPrompt {
    fn two_factor_code(&self) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// A fixed answer, for callers that collect the code elsewhere.
impl CodePrompt for String {
    fn two_factor_code(&self) -> io::Result<Option<String>> {
        Ok(Some(self.clone()))
    }
}
