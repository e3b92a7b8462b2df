//! Driver boundary: how a pool gets created and checked for liveness.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions};
use sqlx::Connection;

use crate::config::{ConnectionSpec, PoolLimits, Timeouts};

/// Liveness check on an open pool.
#[async_trait]
pub trait Ping: Send + Sync {
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Creates a pool for one backend with the given limits applied.
#[async_trait]
pub trait Connector: Send + Sync {
    type Pool: Ping + 'static;

    async fn connect(
        &self,
        spec: &ConnectionSpec,
        limits: &PoolLimits,
        timeouts: &Timeouts,
    ) -> Result<Self::Pool, sqlx::Error>;
}

#[async_trait]
impl Ping for MySqlPool {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.acquire().await?;
        conn.ping().await
    }
}

/// sqlx-backed MySQL connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn connect_options(spec: &ConnectionSpec) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&spec.host)
            .port(spec.port)
            .username(&spec.username)
            .password(&spec.password)
            .database(&spec.database)
            .charset("utf8mb4")
    }

    /// sqlx has no max-idle knob: connections above `min_connections` are
    /// reaped by the idle timeout, so the idle limit becomes the warm floor.
    pub fn pool_options(limits: &PoolLimits, timeouts: &Timeouts) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(limits.max_open)
            .min_connections(limits.max_idle.min(limits.max_open))
            .max_lifetime(limits.max_lifetime)
            .acquire_timeout(timeouts.read.max(timeouts.write))
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Pool = MySqlPool;

    async fn connect(
        &self,
        spec: &ConnectionSpec,
        limits: &PoolLimits,
        timeouts: &Timeouts,
    ) -> Result<MySqlPool, sqlx::Error> {
        let options = Self::connect_options(spec);

        // The pool retries internally and reports only PoolTimedOut, so one
        // direct connection surfaces the driver's own error first.
        let conn = MySqlConnection::connect_with(&options).await?;
        conn.close().await?;

        Ok(Self::pool_options(limits, timeouts).connect_lazy_with(options))
    }
}
