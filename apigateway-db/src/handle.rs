//! Live pool handle with an optional query logger attached.

use std::future::Future;
use std::time::{Duration, Instant};

use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool};

use crate::connector::Ping;
use crate::error::Result;
use crate::logger::{BindValue, CallSite, LogEvent, QueryEvent, QueryLogger};

/// A pooled database handle.
///
/// Query methods capture the caller's location, time the statement and, when a
/// logger is attached, emit one log line per statement. Logging never changes
/// the statement's outcome.
#[derive(Debug, Clone)]
pub struct DbHandle<P> {
    pool: P,
    logger: Option<QueryLogger>,
}

impl<P> DbHandle<P> {
    pub fn new(pool: P) -> Self {
        Self { pool, logger: None }
    }

    pub fn with_logger(mut self, logger: QueryLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn logger(&self) -> Option<&QueryLogger> {
        self.logger.as_ref()
    }

    fn observe(&self, site: CallSite, sql: &str, values: Vec<BindValue>, duration: Duration, rows: u64) {
        if let Some(logger) = &self.logger {
            logger.log(&LogEvent::Query(QueryEvent {
                source: site.to_string(),
                duration,
                sql: sql.to_string(),
                values,
                rows_affected: rows,
                callers: vec![site],
            }));
        }
    }

    fn observe_error(&self, site: CallSite, err: &sqlx::Error) {
        if let Some(logger) = &self.logger {
            logger.log(&LogEvent::generic(["error".to_string(), site.to_string(), err.to_string()]));
        }
    }
}

impl<P: Ping> DbHandle<P> {
    pub async fn ping(&self) -> std::result::Result<(), sqlx::Error> {
        self.pool.ping().await
    }
}

impl DbHandle<MySqlPool> {
    /// Run a statement, returning rows affected.
    #[track_caller]
    pub fn execute<'a>(
        &'a self,
        sql: &'a str,
        values: Vec<BindValue>,
    ) -> impl Future<Output = Result<u64>> + Send + 'a {
        let site = CallSite::capture();
        async move {
            let started = Instant::now();
            let result = bind_all(sqlx::query(sql), &values).execute(&self.pool).await;
            let elapsed = started.elapsed();
            match result {
                Ok(done) => {
                    self.observe(site, sql, values, elapsed, done.rows_affected());
                    Ok(done.rows_affected())
                }
                Err(e) => {
                    self.observe(site, sql, values, elapsed, 0);
                    self.observe_error(site, &e);
                    Err(e.into())
                }
            }
        }
    }

    /// Run a query, returning every row.
    #[track_caller]
    pub fn fetch_all<'a>(
        &'a self,
        sql: &'a str,
        values: Vec<BindValue>,
    ) -> impl Future<Output = Result<Vec<MySqlRow>>> + Send + 'a {
        let site = CallSite::capture();
        async move {
            let started = Instant::now();
            let result = bind_all(sqlx::query(sql), &values).fetch_all(&self.pool).await;
            let elapsed = started.elapsed();
            match result {
                Ok(rows) => {
                    self.observe(site, sql, values, elapsed, rows.len() as u64);
                    Ok(rows)
                }
                Err(e) => {
                    self.observe(site, sql, values, elapsed, 0);
                    self.observe_error(site, &e);
                    Err(e.into())
                }
            }
        }
    }

    /// Run a query expected to return at most one row.
    #[track_caller]
    pub fn fetch_optional<'a>(
        &'a self,
        sql: &'a str,
        values: Vec<BindValue>,
    ) -> impl Future<Output = Result<Option<MySqlRow>>> + Send + 'a {
        let site = CallSite::capture();
        async move {
            let started = Instant::now();
            let result = bind_all(sqlx::query(sql), &values).fetch_optional(&self.pool).await;
            let elapsed = started.elapsed();
            match result {
                Ok(row) => {
                    self.observe(site, sql, values, elapsed, u64::from(row.is_some()));
                    Ok(row)
                }
                Err(e) => {
                    self.observe(site, sql, values, elapsed, 0);
                    self.observe_error(site, &e);
                    Err(e.into())
                }
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &[BindValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value.resolve() {
            BindValue::Time(t) => query.bind(t),
            BindValue::Bytes(b) => query.bind(b),
            BindValue::Int(n) => query.bind(n),
            BindValue::UInt(n) => query.bind(n),
            BindValue::Float(f) => query.bind(f),
            BindValue::Bool(b) => query.bind(b),
            BindValue::Text(s) => query.bind(s),
            // resolve() never yields a valuer
            BindValue::Valuer(_) | BindValue::Null => query.bind(None::<String>),
        };
    }
    query
}
