//! Thin HTTP wrapper around a blocking reqwest client.
//!
//! Every request path is resolved against one normalized base address,
//! default headers are only added when the caller did not set them, and a
//! shared cookie jar carries the login session across calls.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use thiserror::Error;
use tracing::{debug, enabled, trace, Level};
use url::Url;

use crate::error::{CoreError, Result};

/// User agent sent with every request unless the caller overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "punchcard/",
    env!("CARGO_PKG_VERSION"),
    " (employee self-service client)"
);

/// Header carrying the session's CSRF token.
///
/// Goes out lowercase: `http` does not keep header-name case on HTTP/1.
pub const CSRF_HEADER: &str = "x-csrf-token";

const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

const REDACTED_HEADERS: &[&str] = &["cookie", "set-cookie", "authorization", CSRF_HEADER];

/// Normalize a base address: drop query and fragment and any trailing slash.
///
/// `normalize_base_url(normalize_base_url(x)) == normalize_base_url(x)`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidUrl`] if the address does not parse or is not
/// an `http`/`https` URL with a host.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let invalid = |message: String| CoreError::InvalidUrl {
        url: raw.to_string(),
        message,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Request body variants. The variant decides the default `Content-Type`.
#[derive(Debug, Clone)]
enum Body {
    Form(String),
    Json(Vec<u8>),
    Raw(Vec<u8>),
}

/// A request relative to the transport's base address.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Body>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// URL-encoded form body.
    pub fn form<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
        self.body = Some(Body::Form(serializer.finish()));
        self
    }

    /// JSON body. Also defaults `Accept` to `application/json`.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(Body::Json(serde_json::to_vec(value)?));
        Ok(self)
    }

    /// Body bytes sent as-is.
    pub fn raw_body(mut self, bytes: Vec<u8>) -> Self {
        self.body = Some(Body::Raw(bytes));
        self
    }

    /// Marks the request as expecting JSON even without a body.
    pub fn expect_json(mut self) -> Self {
        set_header_default(&mut self.headers, ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        self
    }

    /// Append a caller header. Caller headers always win over defaults.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A fully read HTTP response.
#[derive(Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    /// Final URL after following redirects.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Transport failures. A non-2xx status is not a network failure: the
/// response is kept so higher layers can decode a structured error.
#[derive(Error, Debug)]
pub enum TransportError {
    /// DNS, connection or body read failure
    #[error("HTTP request: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("non-2xx status code: {}", .0.status)]
    Status(Box<RawResponse>),
}

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(e) => CoreError::Network(e),
            TransportError::Status(response) => crate::envelope::status_error(&response),
        }
    }
}

/// HTTP transport bound to one base address and one cookie jar.
pub struct Transport {
    client: Client,
    jar: Arc<Jar>,
    base: Url,
    base_path: String,
    csrf_token: Option<String>,
}

impl Transport {
    /// Create a transport with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the base address is invalid or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let normalized = normalize_base_url(base_url)?;
        let base = Url::parse(&normalized).map_err(|e| CoreError::InvalidUrl {
            url: normalized.clone(),
            message: e.to_string(),
        })?;
        let base_path = base.path().trim_end_matches('/').to_string();

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            client,
            jar,
            base,
            base_path,
            csrf_token: None,
        })
    }

    /// The normalized base address.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base path without trailing slash (empty for a bare host).
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Set the token attached as `X-CSRF-Token` on later requests.
    pub fn set_csrf_token(&mut self, token: Option<String>) {
        self.csrf_token = token.filter(|t| !t.is_empty());
    }

    /// The cookie jar shared by every request of this transport.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// Resolve a relative path (with optional query and fragment) against the
    /// base address. The path is appended to the base path.
    pub fn resolve(&self, relative: &str) -> Url {
        let (rest, fragment) = match relative.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (relative, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let mut url = self.base.clone();
        let joined = if path.is_empty() || path.starts_with('/') {
            format!("{}{}", self.base_path, path)
        } else {
            format!("{}/{}", self.base_path, path)
        };
        url.set_path(&joined);
        url.set_query(query);
        url.set_fragment(fragment);
        url
    }

    /// Execute a request through the shared cookie store.
    ///
    /// # Errors
    ///
    /// [`TransportError::Network`] for transport failures,
    /// [`TransportError::Status`] (carrying the response) for non-2xx.
    pub fn send(&self, request: Request) -> std::result::Result<RawResponse, TransportError> {
        let Request {
            method,
            path,
            mut headers,
            body,
        } = request;

        let url = self.resolve(&path);

        let body = body.map(|body| match body {
            Body::Form(encoded) => {
                set_header_default(
                    &mut headers,
                    CONTENT_TYPE,
                    HeaderValue::from_static(FORM_CONTENT_TYPE),
                );
                encoded.into_bytes()
            }
            Body::Json(bytes) => {
                set_header_default(
                    &mut headers,
                    CONTENT_TYPE,
                    HeaderValue::from_static(JSON_CONTENT_TYPE),
                );
                set_header_default(&mut headers, ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
                bytes
            }
            Body::Raw(bytes) => bytes,
        });

        if let Some(token) = &self.csrf_token {
            if let Ok(value) = HeaderValue::from_str(token) {
                set_header_default(&mut headers, HeaderName::from_static(CSRF_HEADER), value);
            }
        }
        set_header_default(&mut headers, ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        set_header_default(&mut headers, USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        debug!(method = %method, url = %url, "sending request");
        if enabled!(Level::TRACE) {
            trace!("Request:\n\t> {} {}{}", method, url, dump_headers(&headers, '>'));
        }

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(bytes) = body {
            builder = builder.body(bytes);
        }
        let response = builder.send()?;

        let status = response.status();
        let final_url = response.url().clone();
        let response_headers = response.headers().clone();
        let bytes = response.bytes()?.to_vec();

        debug!(status = status.as_u16(), url = %final_url, "received response");
        if enabled!(Level::TRACE) {
            trace!("Response:\n\t< {}{}", status, dump_headers(&response_headers, '<'));
        }

        let raw = RawResponse {
            status,
            url: final_url,
            headers: response_headers,
            body: bytes,
        };

        if raw.is_success() {
            Ok(raw)
        } else {
            Err(TransportError::Status(Box::new(raw)))
        }
    }
}

/// Insert `value` only when the caller has not set `name`.
pub fn set_header_default(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    if !headers.contains_key(&name) {
        headers.insert(name, value);
    }
}

fn dump_headers(headers: &HeaderMap, marker: char) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        let shown = if REDACTED_HEADERS.contains(&name.as_str()) {
            "<redacted>"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        out.push_str(&format!("\n\t{marker} {name}: {shown}"));
    }
    out
}
