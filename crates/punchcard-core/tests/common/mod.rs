//! Shared mock server set-up for session tests.

#![allow(dead_code)]

use mockito::{Matcher, Mock, ServerGuard};
use punchcard_core::{Credentials, NoPrompt, Session};

pub const EMPLOYEE_ID: u64 = 42;
pub const EMAIL: &str = "me@example.test";
pub const PASSWORD: &str = "secret";
pub const CSRF_TOKEN: &str = "csrf-from-landing";

pub const LANDING_PAGE: &str = r#"<!doctype html>
<html><head>
  <meta name="csrf-token" content="csrf-from-landing">
</head><body>dashboard</body></html>"#;

pub fn credentials() -> Credentials {
    Credentials::new(EMAIL, PASSWORD)
}

pub fn credential_form() -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("email".into(), EMAIL.into()),
        Matcher::UrlEncoded("password".into(), PASSWORD.into()),
    ])
}

/// Landing page and identity endpoint of a successful login.
pub fn mock_landing(server: &mut ServerGuard) -> Vec<Mock> {
    vec![
        server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(LANDING_PAGE)
            .create(),
        server
            .mock("GET", "/api/v1/navigation/context")
            .match_header("cookie", Matcher::Regex("session=abc".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"success": true, "data": {{"user": {{"id": {EMPLOYEE_ID}, "fullName": "Ada Lovelace", "email": "{EMAIL}"}}}}}}"#
            ))
            .create(),
    ]
}

/// Credential form that lands directly on the landing page.
pub fn mock_direct_login(server: &mut ServerGuard) -> Vec<Mock> {
    let mut mocks = vec![server
        .mock("POST", "/login/index")
        .match_body(credential_form())
        .with_status(302)
        .with_header("location", "/")
        .with_header("set-cookie", "session=abc; Path=/")
        .create()];
    mocks.extend(mock_landing(server));
    mocks
}

/// A session logged in against `server`, plus the mocks that must stay alive.
pub fn logged_in(server: &mut ServerGuard) -> (Session, Vec<Mock>) {
    let mocks = mock_direct_login(server);
    let mut session = Session::new(&server.url()).unwrap();
    session.login(&credentials(), &NoPrompt).unwrap();
    (session, mocks)
}

pub fn json_envelope(data: &str) -> String {
    format!(r#"{{"success": true, "data": {data}}}"#)
}
