//! Axum server setup
//!
//! Router with:
//! - Request id assignment and propagation
//! - Access log span per request
//! - Panic recovery and request timeout
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::{middleware, routes};
use crate::config::HttpConfig;
use crate::service::BookService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn BookService>,
}

impl AppState {
    pub fn new(service: Arc<dyn BookService>) -> Self {
        Self { service }
    }
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState, config: &HttpConfig) -> Router {
    let access_log = TraceLayer::new_for_http()
        .make_span_with(middleware::RequestSpan::new(config.app_id.clone()))
        .on_request(())
        .on_response(middleware::AccessLog);

    // Outermost first: the id must exist before the access log span is made.
    let layers = ServiceBuilder::new()
        .layer(middleware::set_request_id())
        .layer(access_log)
        .layer(middleware::propagate_request_id())
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs.max(1),
        )));

    Router::new()
        .merge(routes::default::router())
        .merge(routes::auth::router())
        .merge(routes::books::router())
        .fallback(routes::default::unmatched)
        .layer(layers)
        .with_state(Arc::new(state))
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn run_server(config: &HttpConfig, state: AppState) -> Result<(), ServerError> {
    let addr: SocketAddr = config
        .address
        .parse()
        .map_err(|_| ServerError::Addr(config.address.clone()))?;

    let app = build_router(state, config);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(app_id = %config.app_id, "Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address: {0}")]
    Addr(String),
}
