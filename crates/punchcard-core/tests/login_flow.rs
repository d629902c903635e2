//! Login flow against a mock HR server.
//!
//! Covers the direct path, the two-factor branch, the account-unlock branch
//! and the redirect checks that guard them.

mod common;

use common::*;
use mockito::{Matcher, Server};
use punchcard_core::{CoreError, LoginError, NoPrompt, Session};

const TWO_FACTOR_PAGE: &str = r#"<form method="post" action="/login/google-2fa-token">
  <input type="hidden" name="_token" value="hidden-2fa">
  <input type="text" name="token">
</form>"#;

const UNLOCK_PAGE: &str = r#"<form method="post" action="/login/token-auth">
  <input type="hidden" name="_token" value="hidden-unlock">
</form>"#;

const UNLOCK_REJECTED_PAGE: &str = r#"<script>
  REDUX_INITIAL_STATE.bladeState.messages = {error: "The token is invalid or expired."};
</script>"#;

fn login_error(err: CoreError) -> LoginError {
    match err {
        CoreError::Login(inner) => inner,
        other => panic!("expected a login error, got {other:?}"),
    }
}

/// Test: credentials that land on the landing page resolve the identity
#[test]
fn test_direct_login_resolves_identity() {
    let mut server = Server::new();
    let _mocks = mock_direct_login(&mut server);

    let mut session = Session::new(&server.url()).unwrap();
    assert!(!session.is_logged_in());

    let identity = session.login(&credentials(), &NoPrompt).unwrap();
    assert_eq!(identity.employee_id, EMPLOYEE_ID);
    assert_eq!(identity.full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(session.employee_id(), Some(EMPLOYEE_ID));
    assert_eq!(session.transport().csrf_token(), Some(CSRF_TOKEN));
}

/// Test: the CSRF token from the landing page is sent on later requests
#[test]
fn test_csrf_header_sent_after_login() {
    let mut server = Server::new();
    let (session, _mocks) = logged_in(&mut server);

    let projects = server
        .mock("GET", "/api/v1/projects")
        .match_header("x-csrf-token", CSRF_TOKEN)
        .match_header("cookie", Matcher::Regex("session=abc".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json_envelope("[]"))
        .create();

    assert!(session.projects().unwrap().is_empty());
    projects.assert();
}

/// Test: a two-factor page without a code and without a prompt fails
#[test]
fn test_two_factor_required_without_code() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/login/google-2fa-token")
        .create();
    let _page = server
        .mock("GET", "/login/google-2fa-token")
        .with_status(200)
        .with_body(TWO_FACTOR_PAGE)
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = login_error(session.login(&credentials(), &NoPrompt).unwrap_err());
    assert!(matches!(err, LoginError::TwoFactorRequired));
    assert!(!session.is_logged_in());
}

/// Test: a supplied two-factor code is posted with the hidden form token
#[test]
fn test_two_factor_code_completes_login() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .match_body(credential_form())
        .with_status(302)
        .with_header("location", "/login/google-2fa-token")
        .with_header("set-cookie", "session=abc; Path=/")
        .create();
    let _page = server
        .mock("GET", "/login/google-2fa-token")
        .with_status(200)
        .with_body(TWO_FACTOR_PAGE)
        .create();
    let submit = server
        .mock("POST", "/login/google-2fa-token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("token".into(), "123456".into()),
            Matcher::UrlEncoded("_token".into(), "hidden-2fa".into()),
        ]))
        .with_status(302)
        .with_header("location", "/")
        .expect(1)
        .create();
    let _landing = mock_landing(&mut server);

    let mut session = Session::new(&server.url()).unwrap();
    let identity = session
        .login(&credentials().with_two_factor_code("123456"), &NoPrompt)
        .unwrap();
    assert_eq!(identity.employee_id, EMPLOYEE_ID);
    submit.assert();
}

/// Test: a code from the prompt is used when none was configured
#[test]
fn test_two_factor_code_from_prompt() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/login/google-2fa-token")
        .with_header("set-cookie", "session=abc; Path=/")
        .create();
    let _page = server
        .mock("GET", "/login/google-2fa-token")
        .with_status(200)
        .with_body(TWO_FACTOR_PAGE)
        .create();
    let _submit = server
        .mock("POST", "/login/google-2fa-token")
        .match_body(Matcher::UrlEncoded("token".into(), "654321".into()))
        .with_status(302)
        .with_header("location", "/")
        .create();
    let _landing = mock_landing(&mut server);

    let mut session = Session::new(&server.url()).unwrap();
    let prompt = String::from(" 654321 ");
    let identity = session.login(&credentials(), &prompt).unwrap();
    assert_eq!(identity.employee_id, EMPLOYEE_ID);
}

/// Test: landing on the two-factor page again means the code was rejected
#[test]
fn test_two_factor_rejected() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/login/google-2fa-token")
        .create();
    let _page = server
        .mock("GET", "/login/google-2fa-token")
        .with_status(200)
        .with_body(TWO_FACTOR_PAGE)
        .create();
    let _submit = server
        .mock("POST", "/login/google-2fa-token")
        .with_status(302)
        .with_header("location", "/login/google-2fa-token")
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = session
        .login(&credentials().with_two_factor_code("000000"), &NoPrompt)
        .unwrap_err();
    assert!(matches!(login_error(err), LoginError::TwoFactorRejected));
}

/// Test: a two-factor page without a hidden token cannot be answered
#[test]
fn test_two_factor_page_without_hidden_token() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/login/google-2fa-token")
        .create();
    let _page = server
        .mock("GET", "/login/google-2fa-token")
        .with_status(200)
        .with_body("<form><input name=\"token\"></form>")
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = session
        .login(&credentials().with_two_factor_code("123456"), &NoPrompt)
        .unwrap_err();
    assert!(matches!(login_error(err), LoginError::HiddenTokenMissing(field) if field == "_token"));
}

/// Test: a redirect to another host fails before any path check
#[test]
fn test_redirect_to_other_host() {
    let mut server = Server::new();
    let mut elsewhere = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", &format!("{}/", elsewhere.url()))
        .create();
    let _foreign = elsewhere.mock("GET", "/").with_status(200).with_body("hi").create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = login_error(session.login(&credentials(), &NoPrompt).unwrap_err());
    match err {
        LoginError::UnexpectedRedirect {
            want_host,
            got_host,
            ..
        } => {
            assert_ne!(want_host, got_host);
            assert!(elsewhere.url().ends_with(&got_host));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Test: landing back on the login form is an unexpected redirect
#[test]
fn test_wrong_credentials_land_on_login_form() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/login/index?failed=1")
        .create();
    let _form = server
        .mock("GET", "/login/index")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<form></form>")
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = login_error(session.login(&credentials(), &NoPrompt).unwrap_err());
    assert!(matches!(
        err,
        LoginError::UnexpectedRedirect { want_path, got_path, .. }
            if want_path == "/" && got_path == "/login/index"
    ));
}

/// Test: an unlock page without an email token stops the flow
#[test]
fn test_unlock_required_without_token() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/login/token-auth")
        .create();
    let _page = server
        .mock("GET", "/login/token-auth")
        .with_status(200)
        .with_body(UNLOCK_PAGE)
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = login_error(session.login(&credentials(), &NoPrompt).unwrap_err());
    assert!(matches!(err, LoginError::UnlockRequired));
}

/// Test: the email token unlocks the account and the credentials are retried once
#[test]
fn test_unlock_then_login() {
    let mut server = Server::new();
    let locked = server
        .mock("POST", "/login/index")
        .match_header("cookie", Matcher::Missing)
        .with_status(302)
        .with_header("location", "/login/token-auth")
        .expect(1)
        .create();
    let _page = server
        .mock("GET", "/login/token-auth")
        .with_status(200)
        .with_body(UNLOCK_PAGE)
        .create();
    let unlock = server
        .mock("POST", "/login/token-auth")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("token".into(), "mail-token".into()),
            Matcher::UrlEncoded("_token".into(), "hidden-unlock".into()),
        ]))
        .with_status(302)
        .with_header("location", "/login/index")
        .with_header("set-cookie", "unlocked=1; Path=/")
        .expect(1)
        .create();
    let _form = server
        .mock("GET", "/login/index")
        .with_status(200)
        .with_body("<form></form>")
        .create();
    let unlocked = server
        .mock("POST", "/login/index")
        .match_header("cookie", Matcher::Regex("unlocked=1".into()))
        .match_body(credential_form())
        .with_status(302)
        .with_header("location", "/")
        .with_header("set-cookie", "session=abc; Path=/")
        .expect(1)
        .create();
    let _landing = mock_landing(&mut server);

    let mut session = Session::new(&server.url()).unwrap();
    let identity = session
        .login(&credentials().with_email_token("mail-token"), &NoPrompt)
        .unwrap();
    assert_eq!(identity.employee_id, EMPLOYEE_ID);
    locked.assert();
    unlock.assert();
    unlocked.assert();
}

/// Test: a rejected unlock token surfaces the page's error message
#[test]
fn test_unlock_rejected_carries_page_error() {
    let mut server = Server::new();
    let _unlock = server
        .mock("POST", "/login/token-auth")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(UNLOCK_REJECTED_PAGE)
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = login_error(session.unlock_with_token("stale").unwrap_err());
    match err {
        LoginError::UnlockRejected(message) => {
            assert_eq!(message.as_deref(), Some("The token is invalid or expired."));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Test: an identity endpoint without a user id fails the login
#[test]
fn test_identity_without_user_id() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/")
        .create();
    let _landing = server.mock("GET", "/").with_status(200).with_body(LANDING_PAGE).create();
    let _identity = server
        .mock("GET", "/api/v1/navigation/context")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json_envelope(r#"{"user": {}}"#))
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = login_error(session.login(&credentials(), &NoPrompt).unwrap_err());
    assert!(matches!(err, LoginError::IdentityNotFound(_)));
    assert!(!session.is_logged_in());
}

/// Test: an HTML answer from the identity endpoint fails the login
#[test]
fn test_identity_endpoint_returns_html() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/login/index")
        .with_status(302)
        .with_header("location", "/")
        .create();
    let _landing = server.mock("GET", "/").with_status(200).with_body(LANDING_PAGE).create();
    let _identity = server
        .mock("GET", "/api/v1/navigation/context")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>login</html>")
        .create();

    let mut session = Session::new(&server.url()).unwrap();
    let err = login_error(session.login(&credentials(), &NoPrompt).unwrap_err());
    assert!(matches!(err, LoginError::IdentityNotFound(_)));
}

/// Test: a base address with a path prefix keeps it for every flow page
#[test]
fn test_login_below_base_path() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/hr/login/index")
        .with_status(302)
        .with_header("location", "/hr/")
        .with_header("set-cookie", "session=abc; Path=/")
        .create();
    let _landing = server
        .mock("GET", "/hr/")
        .with_status(200)
        .with_body(LANDING_PAGE)
        .create();
    let _identity = server
        .mock("GET", "/hr/api/v1/navigation/context")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json_envelope(r#"{"user": {"id": 7}}"#))
        .create();

    let mut session = Session::new(&format!("{}/hr/", server.url())).unwrap();
    let identity = session.login(&credentials(), &NoPrompt).unwrap();
    assert_eq!(identity.employee_id, 7);
}
