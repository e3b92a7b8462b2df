//! HTTP server command
//!
//! Opens the read/write database pair, wires repository, service and router,
//! and serves until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use apigateway_db::init_pair;
use apigateway_server::{AppConfig, AppState, Repository, Service};

/// Arguments for the server command
#[derive(Parser, Debug)]
pub struct ServerArgs {
    /// Address to bind to (overrides http.address from the config file)
    #[arg(long, short = 'b')]
    pub bind: Option<String>,
}

/// Run the HTTP server
pub async fn run_server(mut config: AppConfig, args: ServerArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.http.address = bind;
    }

    tracing::info!(
        app_id = %config.http.app_id,
        "Starting apigateway on {}",
        config.http.address
    );

    let pair = init_pair(&config.database)
        .await
        .context("Failed to initialise database connections")?;

    let repository = Repository::new(pair.clone());
    let state = AppState::new(Arc::new(Service::new(repository)));

    // Run server (blocks until shutdown)
    let served = apigateway_server::run_server(&config.http, state).await;

    pair.read.close().await;
    pair.write.close().await;

    served.context("Server error")
}
