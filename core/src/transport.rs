//! The wire boundary.
//!
//! # Design
//! `Transport` performs exactly one HTTP exchange. It must hand back
//! responses of every status as data, so the adapter alone decides what a
//! 401 or a 500 means. Connection reuse, TLS, redirects and timeouts are
//! the transport's concern.
//!
//! With the `ureq` feature (on by default) `UreqTransport` provides a
//! blocking implementation.

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one concrete HTTP exchange.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(feature = "ureq")]
pub use self::ureq_transport::UreqTransport;

#[cfg(feature = "ureq")]
mod ureq_transport {
    use std::time::Duration;

    use tracing::debug;

    use super::Transport;
    use crate::error::TransportError;
    use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse, ResponseBody};

    /// Blocking transport backed by a `ureq::Agent`.
    ///
    /// The agent is configured with `http_status_as_error(false)` so 4xx/5xx
    /// responses come back as responses.
    #[derive(Debug, Clone)]
    pub struct UreqTransport {
        agent: ureq::Agent,
    }

    impl UreqTransport {
        pub fn new() -> Self {
            Self::with_settings(None, None)
        }

        pub fn with_settings(timeout: Option<Duration>, user_agent: Option<&str>) -> Self {
            let mut config = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(timeout);
            if let Some(user_agent) = user_agent {
                config = config.user_agent(user_agent);
            }
            Self {
                agent: config.build().new_agent(),
            }
        }

        pub fn from_agent(agent: ureq::Agent) -> Self {
            Self { agent }
        }
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for UreqTransport {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let method = request.method;
            let mut builder = ureq::http::Request::builder()
                .method(method.as_str())
                .uri(request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let invalid = |e: ureq::http::Error| TransportError::InvalidRequest(e.to_string());
            let response = match request.body {
                Some(body) => self.agent.run(builder.body(body).map_err(invalid)?),
                None => self.agent.run(builder.body(()).map_err(invalid)?),
            }
            .map_err(TransportError::request)?;
            let (parts, body) = response.into_parts();

            let status = parts.status.as_u16();
            let headers: Headers = parts
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|value| (name.as_str(), value))
                })
                .collect();
            debug!(status, url = %request.url, "transport exchange complete");

            let empty = method == HttpMethod::Head
                || status == 204
                || status == 304
                || headers.get_first("content-length") == Some("0");
            let body = if empty {
                None
            } else {
                Some(ResponseBody::new(body.into_reader()))
            };
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
