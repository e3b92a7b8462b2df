//! Domain models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Book record from the `books` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
}
