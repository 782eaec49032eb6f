//! Adapter behavior against a scripted in-memory transport.
//!
//! # Design
//! `ScriptedTransport` replays canned responses in order and records every
//! request it receives; `RecordingAuth` records the additional context of
//! every authentication. Response bodies are `TrackedBody` readers, which
//! report whether they were read and whether they were dropped, so
//! resource-release rules can be asserted without a network.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use adapter_core::{
    AdapterError, AdditionalContext, AuthenticationProvider, ErrorMappings, HttpMethod,
    HttpRequest, HttpResponse, JsonParseNodeFactory, ParseNode, ParseNodeFactory, PrimitiveKind,
    PeriodAndDuration, PrimitiveValue, RequestAdapter, RequestInformation, ResponseBody, ResponseHandler, Result,
    Transport, TransportError,
};
use mock_server::{ApiFault, Color, Widget};
use pretty_assertions::assert_eq;
use uuid::Uuid;

const BASE_URL: &str = "https://api.example.com/v1";
const CLAIMS: &str = "eyJhIjoxfQ==";
const CHALLENGE: &str = r#"Bearer realm="x", claims="eyJhIjoxfQ==""#;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

struct ScriptedTransport {
    responses: Mutex<VecDeque<std::result::Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(error: TransportError) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left")
    }
}

#[derive(Default)]
struct RecordingAuth {
    contexts: Mutex<Vec<AdditionalContext>>,
}

impl RecordingAuth {
    fn claims(&self) -> Vec<Option<String>> {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .map(|context| context.claims().map(str::to_string))
            .collect()
    }
}

impl AuthenticationProvider for RecordingAuth {
    fn authenticate_request(
        &self,
        request: &mut RequestInformation,
        additional_context: &AdditionalContext,
    ) -> Result<()> {
        self.contexts.lock().unwrap().push(additional_context.clone());
        let token = match additional_context.claims() {
            Some(claims) => format!("Bearer token+{claims}"),
            None => "Bearer token".to_string(),
        };
        request.headers.insert("Authorization", token);
        Ok(())
    }
}

/// Serves a queue of responses per URL. First attempts (no claims on the
/// token) wait for each other, so every caller is in flight at once.
struct RoutedTransport {
    routes: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    first_attempts: Barrier,
}

impl RoutedTransport {
    fn new(routes: Vec<(&str, Vec<HttpResponse>)>) -> Arc<Self> {
        let callers = routes.len();
        Arc::new(Self {
            routes: Mutex::new(
                routes
                    .into_iter()
                    .map(|(path, responses)| (format!("{BASE_URL}{path}"), responses.into()))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
            first_attempts: Barrier::new(callers),
        })
    }

    fn authorizations(&self, path: &str) -> Vec<String> {
        let url = format!("{BASE_URL}{path}");
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.url == url)
            .filter_map(authorization)
            .collect()
    }
}

impl Transport for RoutedTransport {
    fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        if authorization(&request).as_deref() == Some("Bearer token") {
            self.first_attempts.wait();
        }
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        let response = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&url)
            .and_then(VecDeque::pop_front);
        Ok(response.unwrap_or_else(|| panic!("no response left for {url}")))
    }
}

#[derive(Clone, Default)]
struct Probe {
    reads: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Probe {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct TrackedBody {
    inner: Cursor<Vec<u8>>,
    probe: Probe,
}

impl Read for TrackedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.probe.dropped.store(true, Ordering::SeqCst);
    }
}

/// Counts parse node creations, delegating to the JSON factory.
#[derive(Default)]
struct CountingJsonFactory {
    calls: AtomicUsize,
}

impl ParseNodeFactory for CountingJsonFactory {
    fn valid_content_type(&self) -> &str {
        "application/json"
    }

    fn get_parse_node(
        &self,
        content_type: &str,
        content: &mut dyn Read,
    ) -> Result<Box<dyn ParseNode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        JsonParseNodeFactory.get_parse_node(content_type, content)
    }
}

/// Returns a fixed value and records the status it was handed.
struct FixedHandler<T> {
    value: T,
    statuses: Mutex<Vec<u16>>,
}

impl<T> FixedHandler<T> {
    fn new(value: T) -> Arc<Self> {
        Arc::new(Self {
            value,
            statuses: Mutex::new(Vec::new()),
        })
    }
}

impl<T: Clone + Send + Sync + 'static> ResponseHandler for FixedHandler<T> {
    fn handle_response(
        &self,
        response: HttpResponse,
        _error_mappings: Option<&ErrorMappings>,
    ) -> Result<Box<dyn Any + Send>> {
        self.statuses.lock().unwrap().push(response.status);
        Ok(Box::new(Some(self.value.clone())))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Typed error built from the mock API's fault body.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
struct WidgetFault {
    code: String,
    message: String,
}

fn tracked(status: u16, content_type: &str, body: &[u8]) -> (HttpResponse, Probe) {
    let probe = Probe::default();
    let body = TrackedBody {
        inner: Cursor::new(body.to_vec()),
        probe: probe.clone(),
    };
    let response = HttpResponse::new(status)
        .with_header("Content-Type", content_type)
        .with_body(ResponseBody::new(body));
    (response, probe)
}

fn json(status: u16, body: impl serde::Serialize) -> HttpResponse {
    HttpResponse::new(status)
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_body(ResponseBody::from_bytes(serde_json::to_vec(&body).unwrap()))
}

fn challenge(www_authenticate: &str) -> HttpResponse {
    json(
        401,
        ApiFault {
            code: "insufficientClaims".to_string(),
            message: "token does not satisfy the claims challenge".to_string(),
        },
    )
    .with_header("WWW-Authenticate", www_authenticate)
}

fn adapter(transport: &Arc<ScriptedTransport>, auth: &Arc<RecordingAuth>) -> RequestAdapter {
    RequestAdapter::new(auth.clone(), transport.clone()).with_base_url(BASE_URL)
}

fn authorization(request: &HttpRequest) -> Option<String> {
    request
        .headers
        .iter()
        .find(|(name, _)| name == "authorization")
        .map(|(_, value)| value.clone())
}

fn get(template: &str) -> RequestInformation {
    RequestInformation::new(HttpMethod::Get, format!("{{+baseurl}}{template}"))
}

fn field<T>(
    node: &dyn ParseNode,
    name: &str,
    read: impl Fn(&dyn ParseNode) -> Result<Option<T>>,
) -> Result<T> {
    let value = match node.get_child_node(name)? {
        Some(child) => read(child.as_ref())?,
        None => None,
    };
    value.ok_or_else(|| AdapterError::Deserialization(format!("missing field {name}")))
}

fn color(raw: &str) -> Option<Color> {
    match raw {
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "blue" => Some(Color::Blue),
        _ => None,
    }
}

fn widget(node: &dyn ParseNode) -> Result<Widget> {
    Ok(Widget {
        id: field(node, "id", |n| n.get_uuid_value())?,
        name: field(node, "name", |n| n.get_string_value())?,
        size: field(node, "size", |n| n.get_long_value())?,
        color: field(node, "color", |n| n.get_enum_value(color))?,
    })
}

fn fault(node: &dyn ParseNode) -> Result<WidgetFault> {
    Ok(WidgetFault {
        code: field(node, "code", |n| n.get_string_value())?,
        message: field(node, "message", |n| n.get_string_value())?,
    })
}

fn sprocket() -> Widget {
    Widget {
        id: Uuid::new_v4(),
        name: "Sprocket".to_string(),
        size: 3,
        color: Color::Green,
    }
}

// ---------------------------------------------------------------------------
// Claims challenge
// ---------------------------------------------------------------------------

#[test]
fn challenge_is_retried_once_with_claims() {
    let (first, first_probe) = tracked(401, "application/json", b"{}");
    let first = first.with_header("WWW-Authenticate", CHALLENGE);
    let transport = ScriptedTransport::new(vec![first, json(200, "granted")]);
    let auth = Arc::new(RecordingAuth::default());

    let value = adapter(&transport, &auth)
        .send_primitive(&mut get("/me"), PrimitiveKind::String, None)
        .unwrap()
        .unwrap();

    assert_eq!(value.as_str(), Some("granted"));
    assert_eq!(auth.claims(), vec![None, Some(CLAIMS.to_string())]);
    assert!(first_probe.dropped());
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].url, requests[0].url);
    assert_eq!(authorization(&requests[0]).as_deref(), Some("Bearer token"));
    assert_eq!(
        authorization(&requests[1]),
        Some(format!("Bearer token+{CLAIMS}"))
    );
}

#[test]
fn second_challenge_is_not_retried() {
    let transport = ScriptedTransport::new(vec![challenge(CHALLENGE), challenge(CHALLENGE)]);
    let auth = Arc::new(RecordingAuth::default());

    let err = adapter(&transport, &auth)
        .send_primitive(&mut get("/me"), PrimitiveKind::String, None)
        .unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(transport.requests().len(), 2);
    assert_eq!(auth.claims(), vec![None, Some(CLAIMS.to_string())]);
}

#[test]
fn challenge_without_claims_is_an_ordinary_error() {
    let transport = ScriptedTransport::new(vec![challenge(
        r#"Bearer realm="x", error="invalid_token""#,
    )]);
    let auth = Arc::new(RecordingAuth::default());
    let mappings = ErrorMappings::new().with("401", fault);

    let err = adapter(&transport, &auth)
        .send_object(&mut get("/me"), widget, Some(&mappings))
        .unwrap_err();

    assert_eq!(transport.requests().len(), 1);
    let mapped = err.mapped_error::<WidgetFault>().unwrap();
    assert_eq!(mapped.code, "insufficientClaims");
}

#[test]
fn one_shot_content_is_not_retried() {
    let transport = ScriptedTransport::new(vec![challenge(CHALLENGE)]);
    let auth = Arc::new(RecordingAuth::default());
    let mut request = RequestInformation::new(HttpMethod::Post, "{+baseurl}/upload");
    request.set_stream_content(Cursor::new(b"abc".to_vec()), "application/octet-stream");

    let err = adapter(&transport, &auth)
        .send_primitive(&mut request, PrimitiveKind::Void, None)
        .unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(transport.requests()[0].body.as_deref(), Some(&b"abc"[..]));
}

#[test]
fn buffered_content_is_rewound_for_the_retry() {
    let transport = ScriptedTransport::new(vec![challenge(CHALLENGE), json(201, sprocket())]);
    let auth = Arc::new(RecordingAuth::default());
    let mut request = RequestInformation::new(HttpMethod::Post, "{+baseurl}/widgets");
    request
        .set_json_content(&serde_json::json!({"name": "Sprocket", "color": "green"}))
        .unwrap();

    let created = adapter(&transport, &auth)
        .send_object(&mut request, widget, None)
        .unwrap()
        .unwrap();

    assert_eq!(created.name, "Sprocket");
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].body.as_ref().unwrap().is_empty());
    assert_eq!(requests[0].body, requests[1].body);
}

#[test]
fn native_conversion_leaves_content_for_the_send() {
    let transport = ScriptedTransport::new(vec![HttpResponse::new(204)]);
    let auth = Arc::new(RecordingAuth::default());
    let adapter = adapter(&transport, &auth);
    let mut request = RequestInformation::new(HttpMethod::Post, "{+baseurl}/widgets");
    request.set_content(b"payload".to_vec(), "text/plain");

    let native = adapter.convert_to_native_request(&mut request).unwrap();
    assert_eq!(native.body.as_deref(), Some(&b"payload"[..]));
    let again = adapter.convert_to_native_request(&mut request).unwrap();
    assert_eq!(again.body, native.body);

    adapter
        .send_primitive(&mut request, PrimitiveKind::Void, None)
        .unwrap();
    assert_eq!(transport.requests()[0].body.as_deref(), Some(&b"payload"[..]));
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[test]
fn mapped_error_carries_status_headers_and_releases_the_body() {
    let body = serde_json::to_vec(&ApiFault {
        code: "notFound".to_string(),
        message: "widget not found".to_string(),
    })
    .unwrap();
    let (response, probe) = tracked(404, "application/json", &body);
    let transport = ScriptedTransport::new(vec![response.with_header("x-request-id", "r-1")]);
    let auth = Arc::new(RecordingAuth::default());
    let mappings = ErrorMappings::new()
        .with("404", fault)
        .with("5XX", |_: &dyn ParseNode| -> Result<WidgetFault> {
            panic!("wildcard must not be used for an exact match")
        });

    let err = adapter(&transport, &auth)
        .send_object(&mut get("/widgets/1"), widget, Some(&mappings))
        .unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    assert_eq!(
        err.response_headers().unwrap().get_first("X-Request-Id"),
        Some("r-1")
    );
    assert_eq!(err.mapped_error::<WidgetFault>().unwrap().code, "notFound");
    assert!(probe.dropped());
}

#[test]
fn unmapped_status_is_a_generic_http_error() {
    let (response, probe) = tracked(503, "application/json", b"{}");
    let transport = ScriptedTransport::new(vec![response]);
    let auth = Arc::new(RecordingAuth::default());
    let mappings = ErrorMappings::new().with("4XX", fault);

    let err = adapter(&transport, &auth)
        .send_collection(&mut get("/widgets"), widget, Some(&mappings))
        .unwrap_err();

    match err {
        AdapterError::HttpStatus { status, message, .. } => {
            assert_eq!(status, 503);
            assert!(message.ends_with("503"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
    assert!(probe.dropped());
}

#[test]
fn transport_errors_propagate_unchanged() {
    let transport = ScriptedTransport::failing(TransportError::InvalidRequest("boom".to_string()));
    let auth = Arc::new(RecordingAuth::default());

    let err = adapter(&transport, &auth)
        .send_primitive(&mut get("/me"), PrimitiveKind::String, None)
        .unwrap_err();

    assert!(matches!(
        err,
        AdapterError::Transport(TransportError::InvalidRequest(_))
    ));
}

// ---------------------------------------------------------------------------
// Shapes and body release
// ---------------------------------------------------------------------------

#[test]
fn void_yields_none_without_parsing() {
    let (response, probe) = tracked(200, "application/json", b"{\"ignored\":true}");
    let transport = ScriptedTransport::new(vec![response]);
    let auth = Arc::new(RecordingAuth::default());
    let factory = Arc::new(CountingJsonFactory::default());
    let adapter = adapter(&transport, &auth).with_parse_node_factory(factory.clone());

    let value = adapter
        .send_primitive(&mut get("/ping"), PrimitiveKind::Void, None)
        .unwrap();

    assert!(value.is_none());
    assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    assert_eq!(probe.reads(), 0);
    assert!(probe.dropped());
}

#[test]
fn stream_hands_over_the_unread_body() {
    let (response, probe) = tracked(200, "application/octet-stream", b"\x00\x01raw");
    let transport = ScriptedTransport::new(vec![response]);
    let auth = Arc::new(RecordingAuth::default());

    let value = adapter(&transport, &auth)
        .send_primitive(&mut get("/download"), PrimitiveKind::Stream, None)
        .unwrap()
        .unwrap();

    assert_eq!(probe.reads(), 0);
    assert!(!probe.dropped());
    let body = value.into_stream().unwrap();
    assert_eq!(body.read_to_vec().unwrap(), b"\x00\x01raw".to_vec());
    assert!(probe.dropped());
}

#[test]
fn parsed_shapes_release_the_body() {
    let body = serde_json::to_vec(&sprocket()).unwrap();
    let (response, probe) = tracked(200, "application/json", &body);
    let transport = ScriptedTransport::new(vec![response]);
    let auth = Arc::new(RecordingAuth::default());

    let value = adapter(&transport, &auth)
        .send_object(&mut get("/widgets/1"), widget, None)
        .unwrap();

    assert!(value.is_some());
    assert!(probe.reads() > 0);
    assert!(probe.dropped());
}

#[test]
fn no_content_yields_none_for_every_shape() {
    let kinds = [
        "object",
        "collection",
        "primitive",
        "stream",
        "primitive_collection",
        "enum",
        "enum_collection",
    ];
    for shape in kinds {
        let (response, probe) = tracked(204, "application/json", b"not json");
        let transport = ScriptedTransport::new(vec![response]);
        let auth = Arc::new(RecordingAuth::default());
        let factory = Arc::new(CountingJsonFactory::default());
        let adapter = adapter(&transport, &auth).with_parse_node_factory(factory.clone());
        let mut request = get("/empty");

        let is_none = match shape {
            "object" => adapter.send_object(&mut request, widget, None).unwrap().is_none(),
            "collection" => adapter
                .send_collection(&mut request, widget, None)
                .unwrap()
                .is_none(),
            "primitive" => adapter
                .send_primitive(&mut request, PrimitiveKind::Long, None)
                .unwrap()
                .is_none(),
            "stream" => adapter
                .send_primitive(&mut request, PrimitiveKind::Stream, None)
                .unwrap()
                .is_none(),
            "primitive_collection" => adapter
                .send_primitive_collection(&mut request, PrimitiveKind::String, None)
                .unwrap()
                .is_none(),
            "enum" => adapter.send_enum(&mut request, color, None).unwrap().is_none(),
            _ => adapter
                .send_enum_collection(&mut request, color, None)
                .unwrap()
                .is_none(),
        };

        assert!(is_none, "{shape}");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0, "{shape}");
        assert!(probe.dropped(), "{shape}");
    }
}

#[test]
fn missing_body_yields_none() {
    let transport = ScriptedTransport::new(vec![HttpResponse::new(200)]);
    let auth = Arc::new(RecordingAuth::default());

    let value = adapter(&transport, &auth)
        .send_collection(&mut get("/widgets"), widget, None)
        .unwrap();

    assert!(value.is_none());
}

#[test]
fn unknown_content_type_yields_none() {
    let (response, probe) = tracked(200, "text/html", b"<p>hi</p>");
    let transport = ScriptedTransport::new(vec![response]);
    let auth = Arc::new(RecordingAuth::default());

    let value = adapter(&transport, &auth)
        .send_primitive(&mut get("/page"), PrimitiveKind::String, None)
        .unwrap();

    assert!(value.is_none());
    assert!(probe.dropped());
}

#[test]
fn vendor_json_types_use_the_json_factory() {
    let response = HttpResponse::new(200)
        .with_header("Content-Type", "application/vnd.widgets+json")
        .with_body(ResponseBody::from_bytes(b"42".to_vec()));
    let transport = ScriptedTransport::new(vec![response]);
    let auth = Arc::new(RecordingAuth::default());

    let value = adapter(&transport, &auth)
        .send_primitive(&mut get("/stats/count"), PrimitiveKind::Long, None)
        .unwrap()
        .unwrap();

    assert_eq!(value.as_i64(), Some(42));
}

#[test]
fn stream_is_not_a_collection_element() {
    let transport = ScriptedTransport::new(vec![json(200, ["a", "b"])]);
    let auth = Arc::new(RecordingAuth::default());

    let err = adapter(&transport, &auth)
        .send_primitive_collection(&mut get("/names"), PrimitiveKind::Stream, None)
        .unwrap_err();

    assert!(matches!(err, AdapterError::UnsupportedPayloadType(_)));
}

#[test]
fn out_of_range_durations_are_deserialization_errors() {
    for raw in ["PT9999999999999999H", "P999999999W", "PT9223372036854775807S"] {
        let transport = ScriptedTransport::new(vec![json(200, raw)]);
        let auth = Arc::new(RecordingAuth::default());
        let err = adapter(&transport, &auth)
            .send_primitive(&mut get("/timeout"), PrimitiveKind::Duration, None)
            .unwrap_err();
        assert!(matches!(err, AdapterError::Deserialization(_)), "{raw}: {err:?}");
    }

    let transport = ScriptedTransport::new(vec![json(200, "-P1DT2H")]);
    let auth = Arc::new(RecordingAuth::default());
    let value = adapter(&transport, &auth)
        .send_primitive(&mut get("/timeout"), PrimitiveKind::Duration, None)
        .unwrap()
        .unwrap();
    match value {
        PrimitiveValue::Duration(duration) => {
            assert_eq!(duration, "-P1DT2H".parse::<PeriodAndDuration>().unwrap());
            assert_eq!(duration.to_string(), "-P1DT2H");
        }
        other => panic!("expected a duration, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn object_and_collection_round_trip() {
    let one = sprocket();
    let many = vec![
        sprocket(),
        Widget {
            id: Uuid::new_v4(),
            name: "Cog".to_string(),
            size: -1,
            color: Color::Blue,
        },
    ];
    let transport = ScriptedTransport::new(vec![json(200, &one), json(200, &many)]);
    let auth = Arc::new(RecordingAuth::default());
    let adapter = adapter(&transport, &auth);

    let read_one = adapter
        .send_object(&mut get("/widgets/1"), widget, None)
        .unwrap();
    let read_many = adapter
        .send_collection(&mut get("/widgets"), widget, None)
        .unwrap();

    assert_eq!(read_one, Some(one));
    assert_eq!(read_many, Some(many));
    assert_eq!(
        transport.requests()[1].url,
        "https://api.example.com/v1/widgets"
    );
}

#[test]
fn primitive_collection_round_trip() {
    let names = vec!["Cog".to_string(), "Sprocket".to_string()];
    let transport = ScriptedTransport::new(vec![json(200, &names)]);
    let auth = Arc::new(RecordingAuth::default());

    let values = adapter(&transport, &auth)
        .send_primitive_collection(&mut get("/stats/names"), PrimitiveKind::String, None)
        .unwrap()
        .unwrap();

    let read: Vec<String> = values
        .iter()
        .filter_map(PrimitiveValue::as_str)
        .map(str::to_string)
        .collect();
    assert_eq!(read, names);
}

#[test]
fn enum_shapes_resolve_and_skip_unknown_values() {
    let transport = ScriptedTransport::new(vec![
        json(200, Color::Red),
        json(200, ["blue", "purple", "green"]),
        json(200, "purple"),
    ]);
    let auth = Arc::new(RecordingAuth::default());
    let adapter = adapter(&transport, &auth);

    assert_eq!(
        adapter.send_enum(&mut get("/widgets/1/color"), color, None).unwrap(),
        Some(Color::Red)
    );
    assert_eq!(
        adapter
            .send_enum_collection(&mut get("/colors"), color, None)
            .unwrap(),
        Some(vec![Color::Blue, Color::Green])
    );
    assert_eq!(
        adapter.send_enum(&mut get("/widgets/2/color"), color, None).unwrap(),
        None
    );
}

// ---------------------------------------------------------------------------
// Response handler override
// ---------------------------------------------------------------------------

#[test]
fn response_handler_takes_the_raw_response() {
    let transport = ScriptedTransport::new(vec![challenge(CHALLENGE)]);
    let auth = Arc::new(RecordingAuth::default());
    let handler = FixedHandler::new(7_i64);
    let mut request = get("/me");
    request.set_response_handler(handler.clone());

    let value = adapter(&transport, &auth)
        .send_object(&mut request, |_| Ok(0_i64), None)
        .unwrap();

    assert_eq!(value, Some(7));
    assert_eq!(*handler.statuses.lock().unwrap(), vec![401]);
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn response_handler_result_must_match_the_shape() {
    let transport = ScriptedTransport::new(vec![json(200, "x")]);
    let auth = Arc::new(RecordingAuth::default());
    let mut request = get("/me");
    request.set_response_handler(FixedHandler::new("text".to_string()));

    let err = adapter(&transport, &auth)
        .send_enum(&mut request, color, None)
        .unwrap_err();

    assert!(matches!(err, AdapterError::InvalidArgument(_)));
}

#[test]
fn empty_template_never_reaches_the_transport() {
    let transport = ScriptedTransport::new(Vec::new());
    let auth = Arc::new(RecordingAuth::default());
    let mut request = RequestInformation::new(HttpMethod::Get, "  ");

    let err = adapter(&transport, &auth)
        .send_collection(&mut request, widget, None)
        .unwrap_err();

    assert!(matches!(err, AdapterError::InvalidArgument(_)));
    assert!(transport.requests().is_empty());
}

// ---------------------------------------------------------------------------
// Sharing
// ---------------------------------------------------------------------------

#[test]
fn adapter_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RequestAdapter>();
}

#[test]
fn concurrent_calls_keep_their_own_claims() {
    let transport = RoutedTransport::new(vec![
        ("/protected", vec![challenge(CHALLENGE), json(200, "granted")]),
        ("/plain", vec![json(200, "plain")]),
    ]);
    let auth = Arc::new(RecordingAuth::default());
    let adapter = RequestAdapter::new(auth.clone(), transport.clone()).with_base_url(BASE_URL);

    let (protected, plain) = thread::scope(|scope| {
        let protected = scope.spawn(|| {
            adapter.send_primitive(&mut get("/protected"), PrimitiveKind::String, None)
        });
        let plain =
            scope.spawn(|| adapter.send_primitive(&mut get("/plain"), PrimitiveKind::String, None));
        (protected.join().unwrap(), plain.join().unwrap())
    });

    assert_eq!(protected.unwrap().unwrap().as_str(), Some("granted"));
    assert_eq!(plain.unwrap().unwrap().as_str(), Some("plain"));
    assert_eq!(
        transport.authorizations("/protected"),
        vec!["Bearer token".to_string(), format!("Bearer token+{CLAIMS}")]
    );
    assert_eq!(transport.authorizations("/plain"), vec!["Bearer token".to_string()]);
    let mut claims = auth.claims();
    claims.sort();
    assert_eq!(claims, vec![None, None, Some(CLAIMS.to_string())]);
}
