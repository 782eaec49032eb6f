//! Status-code classification and typed error mapping.
//!
//! # Design
//! 2xx responses pass through untouched. Anything else ends the call with an
//! error: the typed error registered for the exact status code, else the one
//! registered for its class (`4XX` / `5XX`), else a generic `HttpStatus`
//! error. The failed response is consumed here so its body is released on
//! every error path.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::{AdapterError, Result};
use crate::http::HttpResponse;
use crate::parse_node::{ParseNode, ParseNodeFactoryRegistry};

type BoxedError = Box<dyn StdError + Send + Sync>;

/// Builds a typed error object from the body of a failed response.
pub type ErrorFactory = Arc<dyn Fn(&dyn ParseNode) -> Result<BoxedError> + Send + Sync>;

/// Per-call table from status key (`"404"`, `"4XX"`, `"5XX"`) to error factory.
#[derive(Clone, Default)]
pub struct ErrorMappings {
    factories: HashMap<String, ErrorFactory>,
}

impl ErrorMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `key`, an exact status code or a class
    /// wildcard. Wildcards are case-insensitive.
    pub fn insert<E, F>(&mut self, key: &str, factory: F)
    where
        E: StdError + Send + Sync + 'static,
        F: Fn(&dyn ParseNode) -> Result<E> + Send + Sync + 'static,
    {
        let boxed: ErrorFactory =
            Arc::new(move |node: &dyn ParseNode| factory(node).map(|e| Box::new(e) as BoxedError));
        self.factories.insert(key.to_ascii_uppercase(), boxed);
    }

    pub fn with<E, F>(mut self, key: &str, factory: F) -> Self
    where
        E: StdError + Send + Sync + 'static,
        F: Fn(&dyn ParseNode) -> Result<E> + Send + Sync + 'static,
    {
        self.insert(key, factory);
        self
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.factories.contains_key(&key.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Exact code first, then the class wildcard.
    pub fn resolve(&self, status: u16) -> Option<&ErrorFactory> {
        if let Some(factory) = self.factories.get(&status.to_string()) {
            return Some(factory);
        }
        let wildcard = match status {
            400..=499 => "4XX",
            500..=599 => "5XX",
            _ => return None,
        };
        self.factories.get(wildcard)
    }
}

impl fmt::Debug for ErrorMappings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("ErrorMappings").field("keys", &keys).finish()
    }
}

/// Pass a 2xx response through; turn anything else into the matching error.
pub fn throw_if_failed_response(
    response: HttpResponse,
    error_mappings: Option<&ErrorMappings>,
    parse_nodes: &ParseNodeFactoryRegistry,
) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }
    Err(failed_response_error(response, error_mappings, parse_nodes))
}

fn failed_response_error(
    mut response: HttpResponse,
    error_mappings: Option<&ErrorMappings>,
    parse_nodes: &ParseNodeFactoryRegistry,
) -> AdapterError {
    let status = response.status;
    let Some(factory) = error_mappings.and_then(|mappings| mappings.resolve(status)) else {
        warn!(status, "no error factory registered for status code");
        return AdapterError::HttpStatus {
            status,
            message: format!(
                "the server returned an unexpected status code and no error class is registered for this code {status}"
            ),
            headers: response.headers,
        };
    };

    let no_body = |headers| AdapterError::HttpStatus {
        status,
        headers,
        message: format!("service returned status code {status} but no response body was found"),
    };
    let (Some(media_type), Some(mut body)) = (response.media_type(), response.body.take()) else {
        return no_body(response.headers);
    };
    let node = match parse_nodes.get_parse_node(&media_type, &mut body) {
        Ok(Some(node)) => node,
        Ok(None) | Err(_) => return no_body(response.headers),
    };
    drop(body);

    match factory(node.as_ref()) {
        Ok(error) => AdapterError::MappedApi {
            status,
            headers: response.headers,
            error,
        },
        Err(e) => AdapterError::HttpStatus {
            status,
            headers: response.headers,
            message: format!(
                "service returned status code {status} but the error body could not be read: {e}"
            ),
        },
    }
}
