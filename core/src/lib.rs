//! HTTP request adapter core.
//!
//! # Overview
//! Turns a transport-agnostic `RequestInformation` (method, URL template,
//! parameters, headers, content) into a concrete HTTP exchange, and turns
//! the response back into one of several typed result shapes: object,
//! collection, primitive, primitive collection, enum, enum collection or
//! raw stream.
//!
//! # Design
//! - `RequestAdapter` carries no per-call state; collaborators sit behind
//!   traits (`AuthenticationProvider`, `Transport`, `ParseNodeFactory`).
//! - Non-2xx responses become `AdapterError`s through per-call
//!   `ErrorMappings` (exact status first, then `4XX`/`5XX`).
//! - A 401 carrying a `claims` challenge is retried once with the claims
//!   forwarded to the authentication provider.
//! - The network is only touched through `Transport`. `UreqTransport`
//!   (feature `ureq`, on by default) is the blocking implementation; tests
//!   substitute scripted transports.

pub mod adapter;
pub mod auth;
pub mod challenge;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod http;
pub mod json;
pub mod parse_node;
pub mod request;
pub mod transport;

pub use adapter::RequestAdapter;
pub use auth::{
    AccessTokenProvider, AdditionalContext, AllowedHostsValidator, AnonymousAuthenticationProvider,
    AuthenticationProvider, BaseBearerTokenAuthenticationProvider,
};
pub use classify::ErrorMappings;
pub use config::AdapterConfig;
pub use error::{AdapterError, Result, TransportError};
pub use extract::{PrimitiveKind, PrimitiveValue};
pub use handler::ResponseHandler;
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use json::{JsonParseNode, JsonParseNodeFactory};
pub use parse_node::{ParseNode, ParseNodeFactory, ParseNodeFactoryRegistry, PeriodAndDuration};
pub use request::{RequestContent, RequestInformation, ResponseHandlerOption};
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
