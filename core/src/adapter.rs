//! The request adapter.
//!
//! # Design
//! `RequestAdapter` holds only its collaborators and a base URL; every call
//! is independent. A logical call runs at most two physical attempts: the
//! claims used on the current attempt are passed down as a parameter, and a
//! call that already carries claims is never eligible for another retry.
//!
//! Each `send_*` method shares the same pipeline (`send_and_read`) and only
//! differs in how a successful response is read. Bodies are released by
//! dropping the `HttpResponse`; the raw-stream shape moves the body out to
//! the caller instead.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{AdditionalContext, AuthenticationProvider};
use crate::challenge;
use crate::classify::{self, ErrorMappings};
use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result, TransportError};
use crate::extract::{self, PrimitiveKind, PrimitiveValue};
use crate::http::{HttpRequest, HttpResponse};
use crate::parse_node::{ParseNode, ParseNodeFactory, ParseNodeFactoryRegistry};
use crate::request::{RequestInformation, BASE_URL_KEY};
use crate::transport::Transport;

/// Turns `RequestInformation` values into HTTP exchanges and typed results.
pub struct RequestAdapter {
    auth: Arc<dyn AuthenticationProvider>,
    transport: Arc<dyn Transport>,
    parse_nodes: ParseNodeFactoryRegistry,
    base_url: String,
}

impl RequestAdapter {
    /// Adapter with the JSON parse node factory registered and no base URL.
    pub fn new(auth: Arc<dyn AuthenticationProvider>, transport: Arc<dyn Transport>) -> Self {
        Self {
            auth,
            transport,
            parse_nodes: ParseNodeFactoryRegistry::default(),
            base_url: String::new(),
        }
    }

    /// Adapter over the default ureq transport, configured from `config`.
    #[cfg(feature = "ureq")]
    pub fn from_config(config: &AdapterConfig, auth: Arc<dyn AuthenticationProvider>) -> Self {
        Self::from_config_with_transport(config, auth, Arc::new(config.transport()))
    }

    pub fn from_config_with_transport(
        config: &AdapterConfig,
        auth: Arc<dyn AuthenticationProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new(auth, transport).with_base_url(&config.base_url)
    }

    /// Register an additional parse node factory, replacing any factory for
    /// the same content type.
    pub fn with_parse_node_factory(mut self, factory: Arc<dyn ParseNodeFactory>) -> Self {
        self.parse_nodes.register(factory);
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.set_base_url(base_url);
        self
    }

    /// Trailing slashes are trimmed.
    pub fn set_base_url(&mut self, base_url: &str) {
        self.base_url = base_url.trim_end_matches('/').to_string();
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn parse_node_factory(&self) -> &ParseNodeFactoryRegistry {
        &self.parse_nodes
    }

    /// Execute `request` and read one object from the response.
    pub fn send_object<T, F>(
        &self,
        request: &mut RequestInformation,
        factory: F,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Option<T>>
    where
        T: 'static,
        F: Fn(&dyn ParseNode) -> Result<T>,
    {
        self.send_and_read(request, error_mappings, |mut response| {
            let node = self.root_parse_node(&mut response)?;
            extract::object(node, factory)
        })
    }

    /// Execute `request` and read an ordered collection of objects.
    pub fn send_collection<T, F>(
        &self,
        request: &mut RequestInformation,
        factory: F,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Option<Vec<T>>>
    where
        T: 'static,
        F: Fn(&dyn ParseNode) -> Result<T>,
    {
        self.send_and_read(request, error_mappings, |mut response| {
            let node = self.root_parse_node(&mut response)?;
            extract::collection(node, factory)
        })
    }

    /// Execute `request` and read one primitive of `kind`.
    ///
    /// `Void` yields `None` without parsing. `Stream` hands the unread body
    /// to the caller, who then owns it.
    pub fn send_primitive(
        &self,
        request: &mut RequestInformation,
        kind: PrimitiveKind,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Option<PrimitiveValue>> {
        self.send_and_read(request, error_mappings, |mut response| match kind {
            PrimitiveKind::Void => Ok(None),
            PrimitiveKind::Stream => Ok(response.body.take().map(PrimitiveValue::Stream)),
            _ => {
                let node = self.root_parse_node(&mut response)?;
                extract::primitive(node, kind)
            }
        })
    }

    /// Execute `request` and read an ordered collection of primitives.
    pub fn send_primitive_collection(
        &self,
        request: &mut RequestInformation,
        kind: PrimitiveKind,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Option<Vec<PrimitiveValue>>> {
        self.send_and_read(request, error_mappings, |mut response| match kind {
            PrimitiveKind::Void => Ok(None),
            PrimitiveKind::Stream => Err(AdapterError::UnsupportedPayloadType(format!(
                "collection of {kind}"
            ))),
            _ => {
                let node = self.root_parse_node(&mut response)?;
                extract::primitive_collection(node, kind)
            }
        })
    }

    /// Execute `request` and resolve one enum value.
    pub fn send_enum<E, R>(
        &self,
        request: &mut RequestInformation,
        resolver: R,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Option<E>>
    where
        E: 'static,
        R: Fn(&str) -> Option<E>,
    {
        self.send_and_read(request, error_mappings, |mut response| {
            let node = self.root_parse_node(&mut response)?;
            extract::enumeration(node, resolver)
        })
    }

    /// Execute `request` and resolve a collection of enum values. Values the
    /// resolver does not know are skipped.
    pub fn send_enum_collection<E, R>(
        &self,
        request: &mut RequestInformation,
        resolver: R,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Option<Vec<E>>>
    where
        E: 'static,
        R: Fn(&str) -> Option<E>,
    {
        self.send_and_read(request, error_mappings, |mut response| {
            let node = self.root_parse_node(&mut response)?;
            extract::enum_collection(node, resolver)
        })
    }

    /// Authenticate `request` and build the concrete request a transport
    /// would receive, without sending it.
    pub fn convert_to_native_request(&self, request: &mut RequestInformation) -> Result<HttpRequest> {
        self.prepare(request, &AdditionalContext::new())
    }

    fn send_and_read<T, F>(
        &self,
        request: &mut RequestInformation,
        error_mappings: Option<&ErrorMappings>,
        read: F,
    ) -> Result<Option<T>>
    where
        T: 'static,
        F: FnOnce(HttpResponse) -> Result<Option<T>>,
    {
        let response = self.execute(request, None)?;

        if let Some(handler) = request.response_handler() {
            debug!(status = response.status, "response handler takes over");
            let handled = handler.handle_response(response, error_mappings)?;
            return handled.downcast::<Option<T>>().map(|value| *value).map_err(|_| {
                AdapterError::InvalidArgument(format!(
                    "response handler did not return an Option<{}>",
                    std::any::type_name::<T>()
                ))
            });
        }

        let response = self.retry_challenged_response(response, request, None)?;
        let response = classify::throw_if_failed_response(response, error_mappings, &self.parse_nodes)?;
        if response.status == 204 || response.body.is_none() {
            return Ok(None);
        }
        read(response)
    }

    /// One physical attempt: base URL, authentication, transport.
    fn execute(&self, request: &mut RequestInformation, claims: Option<&str>) -> Result<HttpResponse> {
        let context = AdditionalContext::with_claims(claims);
        let native = self.prepare(request, &context)?;
        debug!(
            method = %native.method,
            url = %native.url,
            claims = context.claims().is_some(),
            "sending request"
        );
        Ok(self.transport.execute(native)?)
    }

    fn retry_challenged_response(
        &self,
        response: HttpResponse,
        request: &mut RequestInformation,
        claims: Option<&str>,
    ) -> Result<HttpResponse> {
        let Some(claims) = challenge::claims_from_response(&response, request, claims) else {
            return Ok(response);
        };
        info!(url = %request.url_template, "claims challenge received, retrying once");
        if let Some(content) = request.content.as_mut() {
            content.rewind();
        }
        drop(response);

        let retried = self.execute(request, Some(&claims))?;
        self.retry_challenged_response(retried, request, Some(&claims))
    }

    fn prepare(
        &self,
        request: &mut RequestInformation,
        context: &AdditionalContext,
    ) -> Result<HttpRequest> {
        if !self.base_url.is_empty() {
            request
                .path_parameters
                .insert(BASE_URL_KEY.to_string(), self.base_url.clone());
        }
        let url = request.uri()?;
        self.auth.authenticate_request(request, context)?;

        let body = match request.content.as_mut() {
            Some(content) => {
                // Buffered content is sent whole, whatever was read before.
                content.rewind();
                Some(content.read_remaining().map_err(TransportError::from)?)
            }
            None if request.http_method.requires_body() => Some(Vec::new()),
            None => None,
        };
        Ok(HttpRequest {
            method: request.http_method,
            url: url.to_string(),
            headers: request.headers.to_pairs(),
            body,
        })
    }

    /// `None` when the response has no content type, no body, or a content
    /// type with no registered factory.
    fn root_parse_node(&self, response: &mut HttpResponse) -> Result<Option<Box<dyn ParseNode>>> {
        let Some(media_type) = response.media_type() else {
            return Ok(None);
        };
        match response.body.as_mut() {
            Some(body) => self.parse_nodes.get_parse_node(&media_type, body),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for RequestAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAdapter")
            .field("base_url", &self.base_url)
            .field("parse_nodes", &self.parse_nodes)
            .finish_non_exhaustive()
    }
}
