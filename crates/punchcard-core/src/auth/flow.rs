//! Login state machine.
//!
//! ```text
//! Start ─▶ SubmittingCredentials ─┬─▶ ResolvingIdentity ─▶ Authenticated
//!              ▲                  ├─▶ NeedsUnlock ─▶ SubmittingUnlockToken ─┐
//!              └──────────────────┼──────────────────────────────────────────┘
//!                                 └─▶ NeedsTwoFactor ─▶ SubmittingTwoFactorCode
//!                                                          └─▶ ResolvingIdentity
//! ```
//!
//! Every form submission follows redirects; the final URL decides the next
//! state through [`classify`]. The unlock step runs at most once per login
//! and a second two-factor page means the code was rejected.

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::prompt::CodePrompt;
use super::{Credentials, SessionIdentity};
use crate::endpoints::Endpoints;
use crate::error::{LoginError, Result};
use crate::session::Session;
use crate::transport::{RawResponse, Request};

const HIDDEN_TOKEN_FIELD: &str = "_token";
const CSRF_META: &str = "csrf-token";

/// Where a form submission ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// The post-login landing page.
    Landed,
    /// The account-unlock page.
    NeedsUnlock,
    /// The two-factor challenge page.
    NeedsTwoFactor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Start,
    SubmittingCredentials {
        unlock_attempted: bool,
    },
    NeedsUnlock {
        unlock_attempted: bool,
        hidden_token: Option<String>,
    },
    SubmittingUnlockToken {
        token: String,
        hidden_token: Option<String>,
    },
    NeedsTwoFactor {
        hidden_token: String,
    },
    SubmittingTwoFactorCode {
        hidden_token: String,
        code: String,
    },
    ResolvingIdentity,
    Authenticated(SessionIdentity),
}

impl LoginState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SubmittingCredentials { .. } => "submitting-credentials",
            Self::NeedsUnlock { .. } => "needs-unlock",
            Self::SubmittingUnlockToken { .. } => "submitting-unlock-token",
            Self::NeedsTwoFactor { .. } => "needs-two-factor",
            Self::SubmittingTwoFactorCode { .. } => "submitting-two-factor-code",
            Self::ResolvingIdentity => "resolving-identity",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

/// Classify the final URL of a login-flow response.
///
/// The host (and port) is checked before anything else: the right path on
/// the wrong host is still an unexpected redirect.
///
/// # Errors
///
/// [`LoginError::UnexpectedRedirect`] when the URL is neither on the base
/// host nor one of the known flow pages.
pub fn classify(landed: &Url, base: &Url, endpoints: &Endpoints) -> Result<Landing, LoginError> {
    let base_path = base.path().trim_end_matches('/');
    let want_path = format!("{}/{}", base_path, endpoints.landing.trim_matches('/'));
    let redirect = || LoginError::UnexpectedRedirect {
        want_host: authority(base),
        got_host: authority(landed),
        want_path: want_path.clone(),
        got_path: landed.path().to_string(),
    };

    let same_host = landed.host_str() == base.host_str()
        && landed.port_or_known_default() == base.port_or_known_default();
    if !same_host {
        return Err(redirect());
    }

    let path = landed.path();
    if path.ends_with(endpoints.unlock.trim_end_matches('/')) {
        return Ok(Landing::NeedsUnlock);
    }
    if path.ends_with(endpoints.two_factor.trim_end_matches('/')) {
        return Ok(Landing::NeedsTwoFactor);
    }

    let relative = path.strip_prefix(base_path).map(|rest| rest.trim_matches('/'));
    if relative != Some(endpoints.landing.trim_matches('/')) {
        return Err(redirect());
    }
    Ok(Landing::Landed)
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct NavigationContext {
    #[serde(default)]
    user: NavigationUser,
}

#[derive(Debug, Default, Deserialize)]
struct NavigationUser {
    #[serde(default)]
    id: u64,
    #[serde(default, alias = "fullName")]
    full_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl Session {
    /// Run the login flow until the session knows its employee identifier.
    ///
    /// A missing two-factor code is asked from `prompt`; an unlock page is
    /// answered with `credentials.email_token` once.
    ///
    /// # Errors
    ///
    /// [`LoginError`] variants for flow deviations, transport and envelope
    /// errors for everything else. The session stays logged out on error.
    pub fn login(
        &mut self,
        credentials: &Credentials,
        prompt: &dyn CodePrompt,
    ) -> Result<SessionIdentity> {
        self.identity = None;
        let mut state = LoginState::Start;
        loop {
            debug!(state = state.name(), "login step");
            state = match state {
                LoginState::Authenticated(identity) => {
                    info!(employee_id = identity.employee_id, "logged in");
                    self.identity = Some(identity.clone());
                    return Ok(identity);
                }
                other => self.step(other, credentials, prompt)?,
            };
        }
    }

    /// Unlock the account with the token from the unlock email.
    ///
    /// # Errors
    ///
    /// [`LoginError::UnlockRejected`] when the unlock page comes back,
    /// carrying the page's error message when it has one.
    pub fn unlock_with_token(&mut self, token: &str) -> Result<()> {
        self.submit_unlock(token, None)
    }

    /// [`unlock_with_token`](Self::unlock_with_token) followed by
    /// [`login`](Self::login).
    ///
    /// # Errors
    ///
    /// Whatever either step returns.
    pub fn unlock_and_login(
        &mut self,
        credentials: &Credentials,
        token: &str,
        prompt: &dyn CodePrompt,
    ) -> Result<SessionIdentity> {
        self.unlock_with_token(token)?;
        self.login(credentials, prompt)
    }

    fn step(
        &mut self,
        state: LoginState,
        credentials: &Credentials,
        prompt: &dyn CodePrompt,
    ) -> Result<LoginState> {
        match state {
            LoginState::Start => Ok(LoginState::SubmittingCredentials {
                unlock_attempted: false,
            }),

            LoginState::SubmittingCredentials { unlock_attempted } => {
                let request = Request::post(self.endpoints.login.clone()).form(&[
                    ("email", credentials.email.as_str()),
                    ("password", credentials.password.as_str()),
                ]);
                let response = self.transport.send(request)?;
                self.next_after(&response, unlock_attempted, false)
            }

            LoginState::NeedsUnlock {
                unlock_attempted,
                hidden_token,
            } => match &credentials.email_token {
                Some(token) if !unlock_attempted => Ok(LoginState::SubmittingUnlockToken {
                    token: token.clone(),
                    hidden_token,
                }),
                _ => Err(LoginError::UnlockRequired.into()),
            },

            LoginState::SubmittingUnlockToken {
                token,
                hidden_token,
            } => {
                self.submit_unlock(&token, hidden_token.as_deref())?;
                Ok(LoginState::SubmittingCredentials {
                    unlock_attempted: true,
                })
            }

            LoginState::NeedsTwoFactor { hidden_token } => {
                let code = match &credentials.two_factor_code {
                    Some(code) => Some(code.clone()),
                    None => prompt
                        .two_factor_code()
                        .map_err(|e| LoginError::Prompt(e.to_string()))?,
                };
                let code = code
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .ok_or(LoginError::TwoFactorRequired)?;
                Ok(LoginState::SubmittingTwoFactorCode { hidden_token, code })
            }

            LoginState::SubmittingTwoFactorCode { hidden_token, code } => {
                let request = Request::post(self.endpoints.two_factor.clone()).form(&[
                    ("token", code.as_str()),
                    (HIDDEN_TOKEN_FIELD, hidden_token.as_str()),
                ]);
                let response = self.transport.send(request)?;
                self.next_after(&response, true, true)
            }

            LoginState::ResolvingIdentity => {
                Ok(LoginState::Authenticated(self.resolve_identity()?))
            }

            LoginState::Authenticated(identity) => Ok(LoginState::Authenticated(identity)),
        }
    }

    /// State following a credential or two-factor submission.
    fn next_after(
        &mut self,
        response: &RawResponse,
        unlock_attempted: bool,
        two_factor_submitted: bool,
    ) -> Result<LoginState> {
        let landing = classify(&response.url, self.transport.base_url(), &self.endpoints)?;
        debug!(?landing, url = %response.url, "login landing");
        let html = response.text();

        match landing {
            Landing::NeedsUnlock => Ok(LoginState::NeedsUnlock {
                unlock_attempted,
                hidden_token: self.extractor.input_value(&html, HIDDEN_TOKEN_FIELD),
            }),
            Landing::NeedsTwoFactor if two_factor_submitted => {
                Err(LoginError::TwoFactorRejected.into())
            }
            Landing::NeedsTwoFactor => {
                let hidden_token = self
                    .extractor
                    .input_value(&html, HIDDEN_TOKEN_FIELD)
                    .or_else(|| self.extractor.meta_content(&html, CSRF_META))
                    .ok_or_else(|| LoginError::HiddenTokenMissing(HIDDEN_TOKEN_FIELD.to_string()))?;
                Ok(LoginState::NeedsTwoFactor { hidden_token })
            }
            Landing::Landed => {
                let token = self
                    .extractor
                    .meta_content(&html, CSRF_META)
                    .or_else(|| self.extractor.input_value(&html, HIDDEN_TOKEN_FIELD));
                if token.is_some() {
                    debug!("remembering CSRF token from landing page");
                    self.transport.set_csrf_token(token);
                }
                Ok(LoginState::ResolvingIdentity)
            }
        }
    }

    fn submit_unlock(&mut self, token: &str, hidden_token: Option<&str>) -> Result<()> {
        let mut fields = vec![("token", token.trim())];
        if let Some(hidden) = hidden_token {
            fields.push((HIDDEN_TOKEN_FIELD, hidden));
        }
        let request = Request::post(self.endpoints.unlock.clone()).form(&fields);
        let response = self.transport.send(request)?;

        if response
            .url
            .path()
            .ends_with(self.endpoints.unlock.trim_end_matches('/'))
        {
            let message = self.extractor.page_error(&response.text());
            return Err(LoginError::UnlockRejected(message).into());
        }
        debug!(url = %response.url, "account unlocked");
        Ok(())
    }

    fn resolve_identity(&self) -> Result<SessionIdentity> {
        let context: NavigationContext = self
            .fetch(Request::get(self.endpoints.identity.clone()))
            .map_err(|e| LoginError::IdentityNotFound(e.to_string()))?;
        if context.user.id == 0 {
            return Err(LoginError::IdentityNotFound("response has no user id".to_string()).into());
        }
        Ok(SessionIdentity {
            employee_id: context.user.id,
            full_name: context.user.full_name,
            email: context.user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn classify_landing_page() {
        let endpoints = Endpoints::default();
        let base = url("https://x.test");
        assert_eq!(
            classify(&url("https://x.test/"), &base, &endpoints).unwrap(),
            Landing::Landed
        );
    }

    #[test]
    fn classify_flow_pages() {
        let endpoints = Endpoints::default();
        let base = url("https://x.test/proxy");
        assert_eq!(
            classify(&url("https://x.test/proxy/login/token-auth"), &base, &endpoints).unwrap(),
            Landing::NeedsUnlock
        );
        assert_eq!(
            classify(&url("https://x.test/proxy/login/google-2fa-token?x=1"), &base, &endpoints)
                .unwrap(),
            Landing::NeedsTwoFactor
        );
        assert_eq!(
            classify(&url("https://x.test/proxy/"), &base, &endpoints).unwrap(),
            Landing::Landed
        );
    }

    #[test]
    fn wrong_host_is_checked_before_path() {
        let endpoints = Endpoints::default();
        let base = url("https://x.test");
        let err = classify(&url("https://evil.test/"), &base, &endpoints).unwrap_err();
        match err {
            LoginError::UnexpectedRedirect {
                want_host, got_host, ..
            } => {
                assert_eq!(want_host, "x.test");
                assert_eq!(got_host, "evil.test");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = classify(&url("https://x.test:8443/"), &base, &endpoints).unwrap_err();
        assert!(matches!(err, LoginError::UnexpectedRedirect { got_host, .. } if got_host == "x.test:8443"));
    }

    #[test]
    fn unknown_page_is_unexpected_redirect() {
        let endpoints = Endpoints::default();
        let base = url("https://x.test");
        let err = classify(&url("https://x.test/login/index"), &base, &endpoints).unwrap_err();
        assert!(matches!(
            err,
            LoginError::UnexpectedRedirect { want_path, got_path, .. }
                if want_path == "/" && got_path == "/login/index"
        ));
    }

    #[test]
    fn landing_outside_base_path_is_unexpected() {
        let endpoints = Endpoints::default();
        let base = url("https://x.test/proxy");
        assert!(classify(&url("https://x.test/"), &base, &endpoints).is_err());
    }

    #[test]
    fn custom_landing_path() {
        let endpoints = Endpoints {
            landing: "/dashboard".to_string(),
            ..Endpoints::default()
        };
        let base = url("https://x.test");
        assert_eq!(
            classify(&url("https://x.test/dashboard/"), &base, &endpoints).unwrap(),
            Landing::Landed
        );
        assert!(classify(&url("https://x.test/"), &base, &endpoints).is_err());
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(LoginState::Start.name(), "start");
        assert_eq!(
            LoginState::NeedsTwoFactor {
                hidden_token: "t".into()
            }
            .name(),
            "needs-two-factor"
        );
    }
}
