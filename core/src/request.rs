//! Transport-agnostic description of one API call.
//!
//! # Design
//! `RequestInformation` is what a typed client hands to the adapter: a
//! method, an RFC 6570 URL template with its parameters, headers, optional
//! content and typed options. The adapter injects `baseurl`, lets the
//! authentication provider decorate it, and expands it into an `HttpRequest`
//! once per physical attempt.
//!
//! Content must be replayable for the claims retry, so `RequestContent`
//! distinguishes buffered bytes (rewindable) from arbitrary readers (not).

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{self, Cursor, Read, Seek};
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use url::Url;

use crate::error::{AdapterError, Result};
use crate::handler::ResponseHandler;
use crate::http::{Headers, HttpMethod};

/// Path parameter the adapter fills with its configured base URL.
pub const BASE_URL_KEY: &str = "baseurl";

const CONTENT_TYPE: &str = "content-type";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Characters left as-is by simple expansion.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Characters left as-is by reserved (`{+var}`) expansion.
const RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'%');

/// Request payload.
pub enum RequestContent {
    /// In-memory bytes; can be rewound and sent again.
    Buffered(Cursor<Vec<u8>>),
    /// A one-shot reader; cannot be replayed.
    Stream(Box<dyn Read + Send>),
}

impl RequestContent {
    pub fn is_rewindable(&self) -> bool {
        matches!(self, RequestContent::Buffered(_))
    }

    /// Rewind to the start. Returns `false` when the content is one-shot.
    pub fn rewind(&mut self) -> bool {
        match self {
            RequestContent::Buffered(cursor) => cursor.rewind().is_ok(),
            RequestContent::Stream(_) => false,
        }
    }

    /// Read everything from the current position onwards.
    pub fn read_remaining(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            RequestContent::Buffered(cursor) => cursor.read_to_end(&mut buf)?,
            RequestContent::Stream(reader) => reader.read_to_end(&mut buf)?,
        };
        Ok(buf)
    }
}

impl fmt::Debug for RequestContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestContent::Buffered(cursor) => f
                .debug_struct("Buffered")
                .field("len", &cursor.get_ref().len())
                .field("position", &cursor.position())
                .finish(),
            RequestContent::Stream(_) => f.debug_struct("Stream").finish_non_exhaustive(),
        }
    }
}

/// Typed option set attached to a request, keyed by option type.
#[derive(Default)]
pub struct RequestOptions {
    options: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestOptions {
    /// Add `option`, replacing any previous option of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, option: T) {
        self.options.insert(TypeId::of::<T>(), Box::new(option));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.options
            .get(&TypeId::of::<T>())
            .and_then(|option| option.downcast_ref::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.options
            .remove(&TypeId::of::<T>())
            .and_then(|option| option.downcast::<T>().ok())
            .map(|option| *option)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("len", &self.options.len())
            .finish()
    }
}

/// Request option that replaces the adapter's default response handling.
#[derive(Clone)]
pub struct ResponseHandlerOption(pub Arc<dyn ResponseHandler>);

/// Everything the adapter needs to issue one API call.
#[derive(Debug)]
pub struct RequestInformation {
    pub http_method: HttpMethod,
    pub url_template: String,
    pub path_parameters: BTreeMap<String, String>,
    pub query_parameters: BTreeMap<String, String>,
    pub headers: Headers,
    pub content: Option<RequestContent>,
    pub options: RequestOptions,
}

impl RequestInformation {
    pub fn new(http_method: HttpMethod, url_template: impl Into<String>) -> Self {
        Self {
            http_method,
            url_template: url_template.into(),
            path_parameters: BTreeMap::new(),
            query_parameters: BTreeMap::new(),
            headers: Headers::new(),
            content: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_path_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_query_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query_parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Serialize `value` as JSON and use it as rewindable content.
    pub fn set_json_content<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let body =
            serde_json::to_vec(value).map_err(|e| AdapterError::Serialization(e.to_string()))?;
        self.set_content(body, JSON_CONTENT_TYPE);
        Ok(())
    }

    pub fn set_content(&mut self, body: impl Into<Vec<u8>>, content_type: &str) {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.content = Some(RequestContent::Buffered(Cursor::new(body.into())));
    }

    /// Use a one-shot reader as content. Such a request is never retried.
    pub fn set_stream_content(&mut self, reader: impl Read + Send + 'static, content_type: &str) {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.content = Some(RequestContent::Stream(Box::new(reader)));
    }

    /// True when the content is absent or can be replayed.
    pub fn content_is_replayable(&self) -> bool {
        self.content
            .as_ref()
            .map_or(true, RequestContent::is_rewindable)
    }

    pub fn add_request_option<T: Any + Send + Sync>(&mut self, option: T) {
        self.options.insert(option);
    }

    pub fn set_response_handler(&mut self, handler: Arc<dyn ResponseHandler>) {
        self.options.insert(ResponseHandlerOption(handler));
    }

    pub fn response_handler(&self) -> Option<Arc<dyn ResponseHandler>> {
        self.options
            .get::<ResponseHandlerOption>()
            .map(|option| Arc::clone(&option.0))
    }

    /// Expand the URL template against the path and query parameters.
    pub fn uri(&self) -> Result<Url> {
        if self.url_template.trim().is_empty() {
            return Err(AdapterError::InvalidArgument(
                "url template cannot be empty".to_string(),
            ));
        }
        let expanded = self.expand_template()?;
        Url::parse(&expanded).map_err(|e| {
            AdapterError::InvalidArgument(format!("invalid request url {expanded:?}: {e}"))
        })
    }

    fn expand_template(&self) -> Result<String> {
        let mut out = String::with_capacity(self.url_template.len());
        let mut rest = self.url_template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                AdapterError::InvalidArgument(format!(
                    "unterminated expression in url template {:?}",
                    self.url_template
                ))
            })?;
            self.expand_expression(&after[..close], &mut out);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn expand_expression(&self, expression: &str, out: &mut String) {
        let (operator, names) = match expression.chars().next() {
            Some(op @ ('+' | '?' | '&' | '/')) => (Some(op), &expression[1..]),
            _ => (None, expression),
        };
        let defined: Vec<(&str, &str)> = names
            .split(',')
            .map(str::trim)
            .filter_map(|name| self.lookup(name).map(|value| (name, value)))
            .collect();
        match operator {
            Some('+') => {
                let values: Vec<String> = defined
                    .iter()
                    .map(|(_, v)| utf8_percent_encode(v, RESERVED).to_string())
                    .collect();
                out.push_str(&values.join(","));
            }
            Some(op @ ('?' | '&')) => {
                for (i, (name, value)) in defined.iter().enumerate() {
                    out.push(if i == 0 { op } else { '&' });
                    out.push_str(name);
                    out.push('=');
                    out.extend(utf8_percent_encode(value, UNRESERVED));
                }
            }
            Some('/') => {
                for (_, value) in &defined {
                    out.push('/');
                    out.extend(utf8_percent_encode(value, UNRESERVED));
                }
            }
            _ => {
                let values: Vec<String> = defined
                    .iter()
                    .map(|(_, v)| utf8_percent_encode(v, UNRESERVED).to_string())
                    .collect();
                out.push_str(&values.join(","));
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.path_parameters
            .get(name)
            .or_else(|| self.query_parameters.get(name))
            .map(String::as_str)
    }
}
