//! Request id, access log, and panic recovery pieces
//!
//! Layer order is set up in [`build_router`](super::server::build_router).

use std::any::Any;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::Span;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Assigns `x-request-id` (UUID v4) when the client did not send one.
pub fn set_request_id() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Copies the request id onto the response.
pub fn propagate_request_id() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Per-request span carrying the request id and app id.
#[derive(Debug, Clone)]
pub struct RequestSpan {
    app_id: String,
}

impl RequestSpan {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .unwrap_or_default();

        tracing::info_span!(
            "request",
            app_id = %self.app_id,
            request_id = %request_id,
            method = %req.method(),
            uri = %req.uri(),
        )
    }
}

/// Access log line emitted once the response is ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl<B> OnResponse<B> for AccessLog {
    fn on_response(self, res: &Response<B>, latency: Duration, _span: &Span) {
        tracing::info!(
            status = res.status().as_u16(),
            latency = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX),
            latency_human = ?latency,
            "access log"
        );
    }
}

/// Turns a handler panic into a logged `500 {}`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!("http: unknown error: {}", detail);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response()
}
