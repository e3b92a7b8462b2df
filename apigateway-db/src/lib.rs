//! apigateway-db: database bootstrap for the API gateway
//!
//! - [`open`] establishes a pooled handle, retrying connect + ping with
//!   exponential backoff for up to 180 seconds.
//! - [`init_pair`] opens the read and write handles and attaches a
//!   [`QueryLogger`] to each side whose spec has `debug` set.
//! - [`logger`] renders executed statements, with their bound values
//!   substituted back into the SQL, as structured `tracing` events.

pub mod backoff;
pub mod config;
pub mod connector;
pub mod error;
pub mod handle;
pub mod logger;
pub mod open;
pub mod pair;

pub use backoff::BackoffPolicy;
pub use config::{Backend, ConnectionSpec, PoolLimits, RdbmsConfig, Timeouts};
pub use connector::{Connector, MySqlConnector, Ping};
pub use error::{DbError, Result, Side};
pub use handle::DbHandle;
pub use logger::{
    BindValue, CallSite, Clock, FormatOptions, LogEvent, QueryEvent, QueryLogger,
    RenderedLogLine, SystemClock, Valuer,
};
pub use open::{open, open_with};
pub use pair::{init_pair, init_pair_with, ConnectionPair};
