//! In-memory widget API used to exercise the adapter over real HTTP.
//!
//! Besides CRUD on widgets it exposes one endpoint per response shape the
//! adapter reads (primitive, primitive collection, enum, enum collection,
//! raw stream, 204) plus a claims-challenge endpoint and a status echo for
//! error mapping.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Claims value the `/protected` challenge asks for.
pub const CHALLENGE_CLAIMS: &str = "eyJhIjoxfQ==";

/// Bytes served by `/download`.
pub const DOWNLOAD_BYTES: &[u8] = b"\x00\x01binary payload\xff";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: Uuid,
    pub name: String,
    pub size: i64,
    pub color: Color,
}

#[derive(Deserialize)]
pub struct CreateWidget {
    pub name: String,
    #[serde(default)]
    pub size: i64,
    pub color: Color,
}

#[derive(Deserialize)]
pub struct UpdateWidget {
    pub name: Option<String>,
    pub size: Option<i64>,
    pub color: Option<Color>,
}

/// JSON error body returned with every non-2xx status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiFault {
    pub code: String,
    pub message: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Widget>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/widgets", get(list_widgets).post(create_widget))
        .route(
            "/widgets/{id}",
            get(get_widget).put(update_widget).delete(delete_widget),
        )
        .route("/widgets/{id}/color", get(widget_color))
        .route("/stats/count", get(widget_count))
        .route("/stats/names", get(widget_names))
        .route("/colors", get(colors))
        .route("/status/{code}", get(echo_status))
        .route("/protected", get(protected))
        .route("/download", get(download))
        .route("/empty", get(empty))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn fault(status: StatusCode, code: &str, message: String) -> Response {
    let body = ApiFault {
        code: code.to_string(),
        message,
    };
    (status, Json(body)).into_response()
}

fn not_found(id: Uuid) -> Response {
    fault(StatusCode::NOT_FOUND, "notFound", format!("widget {id} not found"))
}

/// Widgets ordered by name so list responses are deterministic.
async fn sorted(db: &Db) -> Vec<Widget> {
    let mut widgets: Vec<Widget> = db.read().await.values().cloned().collect();
    widgets.sort_by(|a, b| a.name.cmp(&b.name));
    widgets
}

async fn list_widgets(State(db): State<Db>) -> Json<Vec<Widget>> {
    Json(sorted(&db).await)
}

async fn create_widget(
    State(db): State<Db>,
    Json(input): Json<CreateWidget>,
) -> (StatusCode, Json<Widget>) {
    let widget = Widget {
        id: Uuid::new_v4(),
        name: input.name,
        size: input.size,
        color: input.color,
    };
    db.write().await.insert(widget.id, widget.clone());
    (StatusCode::CREATED, Json(widget))
}

async fn get_widget(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Widget>, Response> {
    let widgets = db.read().await;
    widgets.get(&id).cloned().map(Json).ok_or_else(|| not_found(id))
}

async fn update_widget(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateWidget>,
) -> Result<Json<Widget>, Response> {
    let mut widgets = db.write().await;
    let widget = widgets.get_mut(&id).ok_or_else(|| not_found(id))?;
    if let Some(name) = input.name {
        widget.name = name;
    }
    if let Some(size) = input.size {
        widget.size = size;
    }
    if let Some(color) = input.color {
        widget.color = color;
    }
    Ok(Json(widget.clone()))
}

async fn delete_widget(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, Response> {
    let mut widgets = db.write().await;
    widgets
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| not_found(id))
}

async fn widget_color(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Color>, Response> {
    let widgets = db.read().await;
    widgets
        .get(&id)
        .map(|widget| Json(widget.color))
        .ok_or_else(|| not_found(id))
}

async fn widget_count(State(db): State<Db>) -> Json<usize> {
    Json(db.read().await.len())
}

async fn widget_names(State(db): State<Db>) -> Json<Vec<String>> {
    Json(sorted(&db).await.into_iter().map(|widget| widget.name).collect())
}

async fn colors() -> Json<Vec<Color>> {
    Json(vec![Color::Red, Color::Green, Color::Blue])
}

async fn echo_status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) if status.is_success() => (status, Json("ok")).into_response(),
        Ok(status) => fault(status, "echo", format!("requested status {code}")),
        Err(_) => fault(StatusCode::BAD_REQUEST, "badStatus", format!("invalid status {code}")),
    }
}

/// Answers 401 with a claims challenge unless the bearer token was minted
/// for `CHALLENGE_CLAIMS`.
async fn protected(headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if authorization.contains(CHALLENGE_CLAIMS) {
        return Json("granted").into_response();
    }
    let challenge = format!(r#"Bearer realm="mock", claims="{CHALLENGE_CLAIMS}""#);
    let mut response = fault(
        StatusCode::UNAUTHORIZED,
        "insufficientClaims",
        "token does not satisfy the claims challenge".to_string(),
    );
    if let Ok(value) = challenge.parse() {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

async fn download() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], DOWNLOAD_BYTES)
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}
