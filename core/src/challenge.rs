//! Claims challenge detection for continuous access evaluation.
//!
//! A server that rejects a still-valid token answers 401 with a
//! `WWW-Authenticate: Bearer ..., claims="<hint>"` challenge. The adapter
//! re-authenticates once with the hint in the additional context. The
//! claims already used on a call are passed in explicitly, which is what
//! bounds the retry to one per logical call.

use std::sync::LazyLock;

use regex::Regex;

use crate::http::HttpResponse;
use crate::request::RequestInformation;

pub const WWW_AUTHENTICATE: &str = "www-authenticate";

static BEARER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Bearer\s").expect("valid bearer pattern"));

static CLAIMS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^\s?claims="([^"]+)"$"#).expect("valid claims pattern"));

/// Claims requested by `response`, if the call is still eligible for a
/// challenge retry.
///
/// Eligible means: status 401, no claims used yet on this call, and request
/// content that is absent or rewindable.
pub fn claims_from_response(
    response: &HttpResponse,
    request: &RequestInformation,
    claims: Option<&str>,
) -> Option<String> {
    let already_tried = claims.is_some_and(|c| !c.is_empty());
    if response.status != 401 || already_tried || !request.content_is_replayable() {
        return None;
    }
    parse_claims(response.headers.get(WWW_AUTHENTICATE))
}

/// Extract the `claims` parameter of the first `Bearer` challenge.
pub fn parse_claims<S: AsRef<str>>(challenges: &[S]) -> Option<String> {
    let bearer = challenges
        .iter()
        .map(|challenge| challenge.as_ref())
        .find(|challenge| BEARER_PATTERN.is_match(challenge))?;
    let parameters = BEARER_PATTERN.replace(bearer, "");
    parameters.split(',').find_map(|parameter| {
        CLAIMS_PATTERN
            .captures(parameter)
            .map(|captures| captures[1].to_string())
    })
}
