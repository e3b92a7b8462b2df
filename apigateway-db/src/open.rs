//! Connection opener: connect + ping under a bounded exponential backoff.

use sqlx::MySqlPool;
use tracing::{debug, error, info};

use crate::backoff::BackoffPolicy;
use crate::config::{Backend, ConnectionSpec};
use crate::connector::{Connector, MySqlConnector, Ping};
use crate::error::{DbError, Result};
use crate::handle::DbHandle;

/// Open a handle for `spec`, dispatching on its backend kind.
pub async fn open(spec: &ConnectionSpec) -> Result<DbHandle<MySqlPool>> {
    match spec.backend {
        Backend::Mysql => open_with(&MySqlConnector, spec, BackoffPolicy::default()).await,
        Backend::Postgres => Err(DbError::NotImplemented {
            backend: Backend::Postgres,
        }),
    }
}

/// Open through an explicit connector and backoff policy.
///
/// Configuration errors return immediately. Connect or ping failures are
/// logged and retried until the policy's elapsed-time ceiling is reached.
pub async fn open_with<C: Connector>(
    connector: &C,
    spec: &ConnectionSpec,
    policy: BackoffPolicy,
) -> Result<DbHandle<C::Pool>> {
    let limits = spec.pool_limits();
    let timeouts = spec.timeouts()?;
    debug!(
        backend = %spec.backend,
        dsn = %spec.connection_string()?,
        "database connection string"
    );

    let host = format!("{}:{}", spec.host, spec.port);
    let mut backoff = policy.start();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let attempt = async {
            let pool = connector.connect(spec, &limits, &timeouts).await.map_err(|e| {
                error!(backend = %spec.backend, database = %spec.database, host = %host, attempt = attempts, "{} open failed: {}", spec.backend, e);
                e
            })?;
            pool.ping().await.map_err(|e| {
                error!(backend = %spec.backend, database = %spec.database, host = %host, attempt = attempts, "{} ping error: {}", spec.backend, e);
                e
            })?;
            Ok::<_, sqlx::Error>(pool)
        };

        // An attempt may not outlive the remaining budget.
        let outcome = match tokio::time::timeout(backoff.remaining(), attempt).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(backend = %spec.backend, database = %spec.database, host = %host, attempt = attempts, "{} connect attempt timed out", spec.backend);
                Err(sqlx::Error::PoolTimedOut)
            }
        };

        match outcome {
            Ok(pool) => {
                info!(
                    backend = %spec.backend,
                    database = %spec.database,
                    host = %host,
                    attempts,
                    max_idle = limits.max_idle,
                    max_open = limits.max_open,
                    max_lifetime_secs = limits.max_lifetime.as_secs(),
                    "database ping success"
                );
                return Ok(DbHandle::new(pool));
            }
            Err(source) => match backoff.next_delay() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    error!(
                        backend = %spec.backend,
                        database = %spec.database,
                        host = %host,
                        attempts,
                        elapsed_secs = backoff.elapsed().as_secs(),
                        "{} connect err: {}",
                        spec.backend,
                        source
                    );
                    return Err(DbError::Connect {
                        side: None,
                        backend: spec.backend,
                        database: spec.database.clone(),
                        host,
                        attempts,
                        source,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{PoolLimits, Timeouts};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Pool whose ping outcome is scripted by the test.
    #[derive(Debug, Clone)]
    pub struct FakePool {
        pub pings: Arc<AtomicU32>,
        /// Ping number (1-based) from which pings start failing.
        pub fail_ping_from: Option<u32>,
        pub limits: PoolLimits,
    }

    #[async_trait]
    impl Ping for FakePool {
        async fn ping(&self) -> std::result::Result<(), sqlx::Error> {
            let n = self.pings.fetch_add(1, Ordering::SeqCst) + 1;
            match self.fail_ping_from {
                Some(from) if n >= from => Err(sqlx::Error::PoolClosed),
                _ => Ok(()),
            }
        }
    }

    /// Connector failing its first `failures` connects, and every connect to
    /// `fail_host`.
    #[derive(Debug, Default)]
    pub struct FakeConnector {
        pub failures: u32,
        pub fail_ping_from: Option<u32>,
        pub fail_host: Option<String>,
        pub connects: AtomicU32,
    }

    impl FakeConnector {
        pub fn failing(failures: u32) -> Self {
            Self {
                failures,
                ..Default::default()
            }
        }

        pub fn never() -> Self {
            Self::failing(u32::MAX)
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        type Pool = FakePool;

        async fn connect(
            &self,
            spec: &ConnectionSpec,
            limits: &PoolLimits,
            _timeouts: &Timeouts,
        ) -> std::result::Result<FakePool, sqlx::Error> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures || self.fail_host.as_deref() == Some(spec.host.as_str()) {
                return Err(sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            Ok(FakePool {
                pings: Arc::new(AtomicU32::new(0)),
                fail_ping_from: self.fail_ping_from,
                limits: *limits,
            })
        }
    }

    /// Connector whose connect never resolves.
    #[derive(Debug, Default)]
    struct HangingConnector {
        connects: AtomicU32,
    }

    #[async_trait]
    impl Connector for HangingConnector {
        type Pool = FakePool;

        async fn connect(
            &self,
            _spec: &ConnectionSpec,
            _limits: &PoolLimits,
            _timeouts: &Timeouts,
        ) -> std::result::Result<FakePool, sqlx::Error> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn spec() -> ConnectionSpec {
        ConnectionSpec {
            host: "db".into(),
            username: "u".into(),
            password: "p".into(),
            database: "app".into(),
            debug: true,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let connector = FakeConnector::failing(2);
        let handle = open_with(&connector, &spec(), BackoffPolicy::default())
            .await
            .unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
        assert_eq!(handle.pool().pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_pool_settings_use_defaults() {
        let handle = open_with(&FakeConnector::default(), &spec(), BackoffPolicy::default())
            .await
            .unwrap();

        assert_eq!(handle.pool().limits.max_idle, 2);
        assert_eq!(handle.pool().limits.max_open, 5);
        assert_eq!(handle.pool().limits.max_lifetime, Duration::from_secs(14_400));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_target_gives_up_within_ceiling() {
        let connector = FakeConnector::never();
        let started = Instant::now();

        let err = open_with(&connector, &spec(), BackoffPolicy::default())
            .await
            .unwrap_err();

        assert!(started.elapsed() <= Duration::from_secs(180));
        assert!(connector.connects.load(Ordering::SeqCst) >= 2);
        match &err {
            DbError::Connect {
                backend,
                database,
                host,
                side,
                ..
            } => {
                assert_eq!(*backend, Backend::Mysql);
                assert_eq!(database, "app");
                assert_eq!(host, "db:3306");
                assert_eq!(*side, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("mysql"));
        assert!(msg.contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn connect_that_never_resolves_is_cut_off_at_ceiling() {
        let connector = HangingConnector::default();
        let started = Instant::now();

        let err = open_with(&connector, &spec(), BackoffPolicy::default())
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(180), "{elapsed:?}");
        assert!(elapsed <= Duration::from_secs(181), "{elapsed:?}");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            DbError::Connect {
                attempts: 1,
                source: sqlx::Error::PoolTimedOut,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_failure_is_retried() {
        let connector = FakeConnector {
            fail_ping_from: Some(1),
            ..Default::default()
        };
        let policy = BackoffPolicy {
            max_elapsed: Duration::from_secs(5),
            ..Default::default()
        };

        let err = open_with(&connector, &spec(), policy).await.unwrap_err();
        assert!(matches!(err, DbError::Connect { .. }));
        assert!(connector.connects.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_timeout_is_not_retried() {
        let connector = FakeConnector::default();
        let spec = ConnectionSpec {
            write_timeout: "forever".into(),
            ..spec()
        };

        let err = open_with(&connector, &spec, BackoffPolicy::default())
            .await
            .unwrap_err();
        assert!(err.is_config());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn postgres_is_not_implemented() {
        let spec = ConnectionSpec {
            backend: Backend::Postgres,
            ..spec()
        };
        let err = open(&spec).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::NotImplemented {
                backend: Backend::Postgres
            }
        ));
    }
}
