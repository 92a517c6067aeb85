//! HTTP peer for transport integration tests.
//!
//! Routes:
//! - `ANY /echo` reflects method, path, query, headers and body as JSON.
//! - `GET /status/{code}` answers with that status and a `text/plain` body.
//! - `GET /cookies` sets two cookies with separate `Set-Cookie` lines.
//! - `GET /redirect` answers `302` pointing at `/echo`.
//! - `GET /slow?ms=N` waits `N` milliseconds before answering.
//! - `POST /items`, `GET|DELETE /items/{id}` keep JSON documents in memory.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// What `/echo` saw.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: String,
    /// Lowercase header name → values joined with `, `.
    pub headers: Map<String, Value>,
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub type Store = Arc<RwLock<HashMap<Uuid, Item>>>;

#[derive(Deserialize)]
struct SlowParams {
    #[serde(default)]
    ms: u64,
}

pub fn app() -> Router {
    let store: Store = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/cookies", get(cookies))
        .route("/redirect", get(redirect))
        .route("/slow", get(slow))
        .route("/items", post(create_item))
        .route("/items/{id}", get(get_item).delete(delete_item))
        .with_state(store)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut joined: Map<String, Value> = Map::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        joined.insert(name.as_str().to_string(), Value::String(values.join(", ")));
    }
    tracing::debug!(%method, %uri, "echo");
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        headers: joined,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => {
            let text = status.canonical_reason().unwrap_or("custom").to_lowercase();
            (status, [(header::CONTENT_TYPE, "text/plain")], text).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status code").into_response(),
    }
}

async fn cookies() -> Response {
    let session = format!("sid={}; Path=/; HttpOnly", Uuid::new_v4());
    let mut headers = HeaderMap::new();
    for cookie in [session.as_str(), "theme=dark; Path=/"] {
        if let Ok(value) = cookie.parse() {
            headers.append(header::SET_COOKIE, value);
        }
    }
    (headers, "cookies set").into_response()
}

async fn redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/echo")], "").into_response()
}

async fn slow(Query(params): Query<SlowParams>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    "done"
}

async fn create_item(State(store): State<Store>, Json(fields): Json<Map<String, Value>>) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        fields,
    };
    store.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(State(store): State<Store>, Path(id): Path<Uuid>) -> Result<Json<Item>, StatusCode> {
    let items = store.read().await;
    items.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_item(State(store): State<Store>, Path(id): Path<Uuid>) -> Result<StatusCode, StatusCode> {
    let mut items = store.write().await;
    items.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}
