//! Service layer - sits between handlers and the repository

use apigateway_db::DbError;
use async_trait::async_trait;

use crate::models::Book;
use crate::repository::BookRepository;

/// Default page size for book listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound on requested page size
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size actually used for a requested `per_page`.
pub fn clamp_page_size(per_page: u32) -> u32 {
    per_page.clamp(1, MAX_PAGE_SIZE)
}

#[async_trait]
pub trait BookService: Send + Sync {
    async fn get_book(&self, id: i64) -> Result<Option<Book>, DbError>;
    async fn list_books(&self, page: u32, per_page: u32) -> Result<Vec<Book>, DbError>;
}

pub struct Service<R> {
    repo: R,
}

impl<R: BookRepository> Service<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R: BookRepository> BookService for Service<R> {
    async fn get_book(&self, id: i64) -> Result<Option<Book>, DbError> {
        self.repo.get_book(id).await
    }

    async fn list_books(&self, page: u32, per_page: u32) -> Result<Vec<Book>, DbError> {
        let per_page = clamp_page_size(per_page);
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.repo.list_books(per_page, offset).await
    }
}
