//! apigateway-server: HTTP surface over the read/write database pair
//!
//! Layers, outermost first: router and middleware ([`http`]), [`service`],
//! [`repository`] over an [`apigateway_db::ConnectionPair`].

pub mod config;
pub mod http;
pub mod models;
pub mod repository;
pub mod service;

pub use config::{AppConfig, ConfigError, HttpConfig};
pub use http::{build_router, run_server, AppState, ServerError};
pub use repository::{BookRepository, Repository};
pub use service::{BookService, Service};
