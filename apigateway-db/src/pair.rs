//! Read/write handle bootstrap.

use sqlx::MySqlPool;
use tracing::{error, info, info_span, Instrument};

use crate::backoff::BackoffPolicy;
use crate::config::{Backend, ConnectionSpec, RdbmsConfig};
use crate::connector::{Connector, MySqlConnector};
use crate::error::{DbError, Result, Side};
use crate::handle::DbHandle;
use crate::logger::{FormatOptions, QueryLogger};
use crate::open::open_with;

/// Independently configured read and write handles.
///
/// Nothing stops a caller from writing through `read`; routing is up to them.
#[derive(Debug, Clone)]
pub struct ConnectionPair<P = MySqlPool> {
    pub read: DbHandle<P>,
    pub write: DbHandle<P>,
}

/// Open both handles from `config` using the sqlx connectors.
pub async fn init_pair(config: &RdbmsConfig) -> Result<ConnectionPair> {
    for spec in [&config.read, &config.write] {
        if spec.backend != Backend::Mysql {
            return Err(DbError::NotImplemented {
                backend: spec.backend,
            });
        }
    }
    init_pair_with(&MySqlConnector, config, BackoffPolicy::default()).await
}

/// Open both handles through `connector`.
///
/// Either open failing aborts the bootstrap. Each handle is pinged once more
/// after opening and gets a query logger when its spec has `debug` set.
pub async fn init_pair_with<C: Connector>(
    connector: &C,
    config: &RdbmsConfig,
    policy: BackoffPolicy,
) -> Result<ConnectionPair<C::Pool>> {
    let read = open_side(connector, Side::Read, &config.read, policy).await?;
    let write = open_side(connector, Side::Write, &config.write, policy).await?;

    verify(&read, Side::Read, &config.read).await?;
    verify(&write, Side::Write, &config.write).await?;

    let options = FormatOptions {
        with_color: config.with_color,
        with_caller: config.with_caller,
    };

    Ok(ConnectionPair {
        read: attach_logger(read, Side::Read, &config.read, options),
        write: attach_logger(write, Side::Write, &config.write, options),
    })
}

async fn open_side<C: Connector>(
    connector: &C,
    side: Side,
    spec: &ConnectionSpec,
    policy: BackoffPolicy,
) -> Result<DbHandle<C::Pool>> {
    open_with(connector, spec, policy)
        .instrument(info_span!("db_open", side = %side, host = %spec.host))
        .await
        .map_err(|e| e.on_side(side))
}

async fn verify<P: crate::connector::Ping>(
    handle: &DbHandle<P>,
    side: Side,
    spec: &ConnectionSpec,
) -> Result<()> {
    handle.ping().await.map_err(|source| {
        error!(side = %side, backend = %spec.backend, database = %spec.database, "{} db ping failed: {}", side, source);
        DbError::Ping {
            side,
            database: spec.database.clone(),
            source,
        }
    })
}

fn attach_logger<P>(
    handle: DbHandle<P>,
    side: Side,
    spec: &ConnectionSpec,
    options: FormatOptions,
) -> DbHandle<P> {
    if spec.debug {
        info!(side = %side, database = %spec.database, "query logging enabled");
        handle.with_logger(QueryLogger::new(side.as_str(), options))
    } else {
        handle
    }
}
