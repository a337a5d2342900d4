#![allow(dead_code)]
//! In-process HTTP fixtures standing in for probed services.
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn spawn_app(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A port on localhost with nothing listening.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Accepts any credentials, stores any comment and echoes search terms raw.
pub fn vulnerable_app() -> Router {
    Router::new()
        .route(
            "/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let term = q.get("search").cloned().unwrap_or_default();
                Html(format!("<p>Results for {term}</p>"))
            }),
        )
        .route(
            "/api/login",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "token": "session-abc", "user": body["username"] }))
            }),
        )
        .route("/api/comments", post(|| async { (StatusCode::OK, "saved") }))
}

/// Rejects bad credentials, validates comments and escapes search terms.
pub fn hardened_app() -> Router {
    Router::new()
        .route(
            "/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let term = q.get("search").cloned().unwrap_or_default();
                Html(format!("<p>Results for {}</p>", escape_html(&term)))
            }),
        )
        .route(
            "/api/login",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid credentials") }),
        )
        .route(
            "/api/comments",
            post(|| async { (StatusCode::BAD_REQUEST, "invalid comment") }),
        )
}

/// Login endpoint that only accepts URL-encoded forms; JSON bodies get 415.
pub fn form_login_app() -> Router {
    Router::new().route(
        "/api/login",
        post(|Form(_): Form<HashMap<String, String>>| async { (StatusCode::OK, "welcome") }),
    )
}

/// Login endpoint that answers 401 after `delay`.
pub fn slow_login_app(delay: Duration) -> Router {
    Router::new().route(
        "/api/login",
        post(move || async move {
            tokio::time::sleep(delay).await;
            (StatusCode::UNAUTHORIZED, "invalid credentials")
        }),
    )
}

/// Tracks the peak number of requests handled at once.
#[derive(Clone, Default)]
pub struct Gauge {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

async fn counted(State(g): State<Gauge>) -> StatusCode {
    let now = g.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    g.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    g.in_flight.fetch_sub(1, Ordering::SeqCst);
    StatusCode::UNAUTHORIZED
}

pub fn gauged_login_app(gauge: Gauge) -> Router {
    Router::new()
        .route("/api/login", post(counted))
        .with_state(gauge)
}

/// A DNS server on localhost that answers NXDOMAIN to every query.
pub async fn nxdomain_nameserver() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            if let Some(reply) = nxdomain_reply(&buf[..len]) {
                let _ = socket.send_to(&reply, peer).await;
            }
        }
    });
    addr
}

/// A bound UDP socket that never answers. Keep it alive for the test.
pub async fn silent_nameserver() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

// Header (12 bytes) then one question: labels up to a zero byte, type, class.
fn nxdomain_reply(query: &[u8]) -> Option<Vec<u8>> {
    let mut end = 12;
    while *query.get(end)? != 0 {
        end += usize::from(query[end]) + 1;
    }
    end += 5;
    if end > query.len() {
        return None;
    }
    let mut reply = Vec::with_capacity(end);
    reply.extend_from_slice(&query[..2]);
    reply.push(0x80 | (query[2] & 0x01)); // QR, echo RD
    reply.push(0x83); // RA, rcode 3
    reply.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
    reply.extend_from_slice(&query[12..end]);
    Some(reply)
}
