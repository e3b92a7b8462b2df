//! Route handlers organized by resource

pub mod auth;
pub mod books;
pub mod default;
