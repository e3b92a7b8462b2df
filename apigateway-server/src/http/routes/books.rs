//! Book endpoints under /api/v1/books

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::Book;
use crate::service::{clamp_page_size, DEFAULT_PAGE_SIZE};

/// Query string for listings
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn first_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct BookList {
    pub items: Vec<Book>,
    pub page: u32,
    pub per_page: u32,
}

/// GET /api/v1/books
async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<BookList>, ApiError> {
    let items = state.service.list_books(params.page, params.per_page).await?;

    Ok(Json(BookList {
        items,
        page: params.page.max(1),
        per_page: clamp_page_size(params.per_page),
    }))
}

/// GET /api/v1/books/{id}
async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, ApiError> {
    state
        .service
        .get_book(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            resource: "book",
            id: id.to_string(),
        })
}

async fn create_book() -> Result<(), ApiError> {
    Err(ApiError::NotImplemented {
        route: "POST /api/v1/books",
    })
}

async fn update_book(Path(_id): Path<i64>) -> Result<(), ApiError> {
    Err(ApiError::NotImplemented {
        route: "PUT /api/v1/books/{id}",
    })
}

async fn delete_book(Path(_id): Path<i64>) -> Result<(), ApiError> {
    Err(ApiError::NotImplemented {
        route: "DELETE /api/v1/books/{id}",
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/books", get(list_books).post(create_book))
        .route(
            "/api/v1/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
}
