/// Structured error types for apigateway-db.
///
/// Configuration problems fail fast, connectivity problems are retried by the
/// opener and surface here only once the backoff budget is spent.
use std::fmt;

use thiserror::Error;

use crate::config::Backend;

/// Which half of a [`ConnectionPair`](crate::ConnectionPair) an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Read,
    Write,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Read => "read",
            Side::Write => "write",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for apigateway-db operations
#[derive(Error, Debug)]
pub enum DbError {
    /// Backend kind string is not one we know about
    #[error("unsupported sql driver: {kind}")]
    UnsupportedDriver { kind: String },

    /// Backend kind is known but has no connector yet
    #[error("{backend} driver is not implemented")]
    NotImplemented { backend: Backend },

    /// Timeout string could not be parsed
    #[error("invalid {field} '{value}': expected a duration such as 10s or 500ms")]
    InvalidDuration { field: &'static str, value: String },

    /// Connect/ping kept failing until the backoff budget ran out
    #[error(
        "{}{backend} connect to database '{database}' at {host} failed after {attempts} attempt(s): {source}",
        side_prefix(.side)
    )]
    Connect {
        /// Set once the pair bootstrap knows which half was being opened
        side: Option<Side>,
        backend: Backend,
        database: String,
        host: String,
        attempts: u32,
        source: sqlx::Error,
    },

    /// Handle opened but the verification ping failed
    #[error("{side} db ping failed, name: {database}: {source}")]
    Ping {
        side: Side,
        database: String,
        source: sqlx::Error,
    },

    /// Statement executed through a handle failed
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

fn side_prefix(side: &Option<Side>) -> String {
    side.map(|s| format!("{s} db: ")).unwrap_or_default()
}

/// Result type alias for apigateway-db operations
pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn unsupported_driver(kind: impl Into<String>) -> Self {
        Self::UnsupportedDriver { kind: kind.into() }
    }

    pub fn invalid_duration(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidDuration {
            field,
            value: value.into(),
        }
    }

    /// Tag a connect failure with the half of the pair it belongs to.
    pub fn on_side(self, side: Side) -> Self {
        match self {
            Self::Connect {
                backend,
                database,
                host,
                attempts,
                source,
                ..
            } => Self::Connect {
                side: Some(side),
                backend,
                database,
                host,
                attempts,
                source,
            },
            other => other,
        }
    }

    /// True for errors that retrying cannot fix.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDriver { .. } | Self::NotImplemented { .. } | Self::InvalidDuration { .. }
        )
    }
}
