//! Authentication endpoint (not wired to a provider yet)

use axum::{routing::post, Router};

use crate::http::error::ApiError;

/// POST /auth
async fn login() -> Result<(), ApiError> {
    Err(ApiError::NotImplemented { route: "POST /auth" })
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/auth", post(login))
}
