//! The logged-in client session.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::SessionIdentity;
use crate::day_cache::DayIdCache;
use crate::endpoints::Endpoints;
use crate::envelope;
use crate::error::{CoreError, Result};
use crate::markup::{FieldExtractor, RegexExtractor};
use crate::projects::ProjectCache;
use crate::transport::{RawResponse, Request, Transport, TransportError};

/// All state of one client: transport, cookies, CSRF token, identity and the
/// per-session caches. Two sessions share nothing.
///
/// Login takes `&mut self`; every domain operation takes `&self`.
pub struct Session {
    pub(crate) transport: Transport,
    pub(crate) endpoints: Endpoints,
    pub(crate) extractor: Box<dyn FieldExtractor>,
    pub(crate) identity: Option<SessionIdentity>,
    pub(crate) day_ids: DayIdCache,
    pub(crate) projects: ProjectCache,
}

impl Session {
    /// New, logged-out session against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUrl`] for an unusable base address.
    pub fn new(base_url: &str) -> Result<Self> {
        let transport = Transport::new(base_url)?;
        debug!(base_url = %transport.base_url(), "created session");
        Ok(Self {
            transport,
            endpoints: Endpoints::default(),
            extractor: Box::new(RegexExtractor::new()),
            identity: None,
            day_ids: DayIdCache::new(),
            projects: ProjectCache::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn FieldExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    /// Numeric identifier of the logged-in employee.
    pub fn employee_id(&self) -> Option<u64> {
        self.identity.as_ref().map(|identity| identity.employee_id)
    }

    pub fn is_logged_in(&self) -> bool {
        self.identity.is_some()
    }

    pub fn day_ids(&self) -> &DayIdCache {
        &self.day_ids
    }

    /// # Errors
    ///
    /// [`CoreError::NotLoggedIn`] before a successful login.
    pub fn require_login(&self) -> Result<u64> {
        self.employee_id().ok_or(CoreError::NotLoggedIn)
    }

    /// Send a request as-is through the session's cookies and CSRF token.
    ///
    /// # Errors
    ///
    /// See [`Transport::send`].
    pub fn send(&self, request: Request) -> std::result::Result<RawResponse, TransportError> {
        self.transport.send(request)
    }

    /// Send a request expecting an enveloped JSON response and decode `data`.
    pub(crate) fn fetch<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.transport.send(request.expect_json())?;
        envelope::decode(&response)
    }

    /// Like [`fetch`](Self::fetch) for writes that may answer without a body.
    pub(crate) fn execute(&self, request: Request) -> Result<()> {
        let response = self.transport.send(request.expect_json())?;
        envelope::decode_empty(&response)
    }
}
