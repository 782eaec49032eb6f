//! Response-handler override.
//!
//! A request carrying a `ResponseHandlerOption` bypasses the adapter's
//! validation and extraction: the handler receives the raw response and its
//! output is returned to the caller as-is. The handler owns the response and
//! with it the body, so releasing it is the handler's job.

use std::any::Any;

use crate::classify::ErrorMappings;
use crate::error::Result;
use crate::http::HttpResponse;

/// Takes over a raw response in place of the default handling.
///
/// The returned value must be an `Option<T>` where `T` is the result type of
/// the `send_*` operation that issued the request.
pub trait ResponseHandler: Send + Sync {
    fn handle_response(
        &self,
        response: HttpResponse,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Box<dyn Any + Send>>;
}

impl<F> ResponseHandler for F
where
    F: Fn(HttpResponse, Option<&ErrorMappings>) -> Result<Box<dyn Any + Send>> + Send + Sync,
{
    fn handle_response(
        &self,
        response: HttpResponse,
        error_mappings: Option<&ErrorMappings>,
    ) -> Result<Box<dyn Any + Send>> {
        self(response, error_mappings)
    }
}
