//! Repository layer over the read/write connection pair

use apigateway_db::{BindValue, ConnectionPair, DbError};
use async_trait::async_trait;
use sqlx::FromRow;

use crate::models::Book;

/// Book persistence
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn get_book(&self, id: i64) -> Result<Option<Book>, DbError>;
    async fn list_books(&self, limit: u32, offset: u32) -> Result<Vec<Book>, DbError>;
}

/// Repository backed by the MySQL pair; reads go through `read`.
pub struct Repository {
    conn: ConnectionPair,
}

impl Repository {
    pub fn new(conn: ConnectionPair) -> Self {
        Self { conn }
    }

    pub fn connections(&self) -> &ConnectionPair {
        &self.conn
    }
}

#[async_trait]
impl BookRepository for Repository {
    async fn get_book(&self, id: i64) -> Result<Option<Book>, DbError> {
        let row = self
            .conn
            .read
            .fetch_optional(
                "SELECT id, title, author FROM books WHERE id = ?",
                vec![BindValue::from(id)],
            )
            .await?;

        Ok(row.map(|r| Book::from_row(&r)).transpose()?)
    }

    async fn list_books(&self, limit: u32, offset: u32) -> Result<Vec<Book>, DbError> {
        let rows = self
            .conn
            .read
            .fetch_all(
                "SELECT id, title, author FROM books ORDER BY id LIMIT ? OFFSET ?",
                vec![BindValue::from(limit), BindValue::from(offset)],
            )
            .await?;

        rows.iter()
            .map(|r| Book::from_row(r).map_err(DbError::from))
            .collect()
    }
}
