//! HTTP layer
//!
//! Axum server with:
//! - Request id and access log middleware
//! - Panic recovery and request timeout
//! - Graceful shutdown
//! - JSON error responses

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, run_server, AppState, ServerError};
