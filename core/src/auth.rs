//! Authentication providers.
//!
//! # Design
//! A provider decorates a `RequestInformation` before each physical attempt.
//! The additional context carries per-attempt hints; today that is only the
//! `claims` value of a challenge retry, which bearer providers forward to
//! their token source so it can mint a token satisfying the challenge.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::error::{AdapterError, Result};
use crate::request::RequestInformation;

/// Additional-context key carrying the claims of a challenge retry.
pub const CLAIMS_KEY: &str = "claims";

const AUTHORIZATION: &str = "authorization";

/// Per-attempt hints passed to an authentication provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalContext {
    entries: BTreeMap<String, String>,
}

impl AdditionalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a retry; empty claims produce an empty context.
    pub fn with_claims(claims: Option<&str>) -> Self {
        let mut context = Self::new();
        if let Some(claims) = claims.filter(|c| !c.is_empty()) {
            context.insert(CLAIMS_KEY, claims);
        }
        context
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn claims(&self) -> Option<&str> {
        self.get(CLAIMS_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Adds credentials to a request.
pub trait AuthenticationProvider: Send + Sync {
    fn authenticate_request(
        &self,
        request: &mut RequestInformation,
        additional_context: &AdditionalContext,
    ) -> Result<()>;
}

/// Sends requests without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthenticationProvider;

impl AuthenticationProvider for AnonymousAuthenticationProvider {
    fn authenticate_request(
        &self,
        _request: &mut RequestInformation,
        _additional_context: &AdditionalContext,
    ) -> Result<()> {
        Ok(())
    }
}

/// Source of bearer access tokens.
pub trait AccessTokenProvider: Send + Sync {
    /// Token for a request to `uri`. An empty token means "send nothing".
    fn get_authorization_token(
        &self,
        uri: &Url,
        additional_context: &AdditionalContext,
    ) -> Result<String>;

    fn allowed_hosts_validator(&self) -> &AllowedHostsValidator;
}

/// Restricts token issuance to a set of hosts. An empty set allows all.
#[derive(Debug, Clone, Default)]
pub struct AllowedHostsValidator {
    hosts: HashSet<String>,
}

impl AllowedHostsValidator {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.as_ref().trim().to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    pub fn is_url_host_valid(&self, uri: &Url) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        uri.host_str()
            .is_some_and(|host| self.hosts.contains(&host.to_ascii_lowercase()))
    }
}

/// Adds `Authorization: Bearer <token>` using an `AccessTokenProvider`.
///
/// Tokens are only sent over https (loopback hosts excepted) and only to
/// allowed hosts. When a retry carries claims, an existing `Authorization`
/// header is replaced with a fresh token.
pub struct BaseBearerTokenAuthenticationProvider {
    token_provider: Arc<dyn AccessTokenProvider>,
}

impl BaseBearerTokenAuthenticationProvider {
    pub fn new(token_provider: Arc<dyn AccessTokenProvider>) -> Self {
        Self { token_provider }
    }
}

impl AuthenticationProvider for BaseBearerTokenAuthenticationProvider {
    fn authenticate_request(
        &self,
        request: &mut RequestInformation,
        additional_context: &AdditionalContext,
    ) -> Result<()> {
        if additional_context.claims().is_some() {
            request.headers.remove(AUTHORIZATION);
        }
        if request.headers.contains(AUTHORIZATION) {
            return Ok(());
        }

        let uri = request.uri()?;
        if !self.token_provider.allowed_hosts_validator().is_url_host_valid(&uri) {
            debug!(host = uri.host_str().unwrap_or_default(), "host not allowed, sending no token");
            return Ok(());
        }
        if uri.scheme() != "https" && !is_loopback(&uri) {
            return Err(AdapterError::Authentication(format!(
                "refusing to send a bearer token over {}",
                uri.scheme()
            )));
        }

        let token = self
            .token_provider
            .get_authorization_token(&uri, additional_context)?;
        if !token.is_empty() {
            request
                .headers
                .insert(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(())
    }
}

fn is_loopback(uri: &Url) -> bool {
    match uri.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
