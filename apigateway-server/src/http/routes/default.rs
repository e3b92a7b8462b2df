//! Liveness and welcome endpoints

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

/// GET /ping
async fn ping(req: Request) -> String {
    format!("[{}] pong!", client_ip(req.headers(), req.extensions().get()))
}

/// GET /
async fn welcome() -> impl IntoResponse {
    Json(json!({ "message": "welcome to apigateway" }))
}

/// Anything no route matched
pub async fn unmatched() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "unmatched router" })),
    )
}

/// Forwarding headers win over the socket peer address.
fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_default()
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/ping", get(ping))
        .route("/", get(welcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));

        let peer = ConnectInfo(SocketAddr::from(([192, 168, 1, 2], 4000)));
        assert_eq!(client_ip(&headers, Some(&peer)), "10.0.0.7");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let peer = ConnectInfo(SocketAddr::from(([192, 168, 1, 2], 4000)));
        assert_eq!(client_ip(&HeaderMap::new(), Some(&peer)), "192.168.1.2");
        assert_eq!(client_ip(&HeaderMap::new(), None), "");
    }
}
