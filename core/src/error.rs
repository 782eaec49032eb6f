//! Error types for the request adapter.
//!
//! # Design
//! Every failure of a logical call surfaces as one `AdapterError`. Failed
//! HTTP statuses come in two flavors: `MappedApi` when the caller registered
//! an error factory for the status and the body parsed into it, and
//! `HttpStatus` for everything else. Both carry the status code and the
//! response headers so callers can inspect throttling or tracing headers.
//!
//! Transport failures keep their own type so a caller can tell network
//! trouble apart from a server that answered with an error.

use std::error::Error as StdError;

use crate::http::Headers;

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;

/// Errors returned by `RequestAdapter` operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A required input was missing or unusable; no request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server returned a non-2xx status and no typed error applied.
    #[error("{message}")]
    HttpStatus {
        status: u16,
        headers: Headers,
        message: String,
    },

    /// The server returned a non-2xx status and the body was parsed into the
    /// error type registered for it.
    #[error("the server returned status code {status}: {error}")]
    MappedApi {
        status: u16,
        headers: Headers,
        #[source]
        error: Box<dyn StdError + Send + Sync>,
    },

    /// The caller asked for a payload kind the extractor does not know.
    #[error("unexpected payload type {0}")]
    UnsupportedPayloadType(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body could not be read into the requested shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// An authentication provider could not obtain credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),
}

impl AdapterError {
    /// Status code of the failed response, for the two HTTP error flavors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AdapterError::HttpStatus { status, .. } | AdapterError::MappedApi { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn response_headers(&self) -> Option<&Headers> {
        match self {
            AdapterError::HttpStatus { headers, .. }
            | AdapterError::MappedApi { headers, .. } => Some(headers),
            _ => None,
        }
    }

    /// The typed error built by a registered error factory, if it is a `T`.
    pub fn mapped_error<T: StdError + 'static>(&self) -> Option<&T> {
        match self {
            AdapterError::MappedApi { error, .. } => error.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// Errors raised by a `Transport` while performing the exchange itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be sent or no response was received.
    #[error("request failed: {message}")]
    Request {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// The concrete request was rejected before it reached the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn request(source: impl StdError + Send + Sync + 'static) -> Self {
        TransportError::Request {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}
