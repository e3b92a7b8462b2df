//! apigateway CLI - runs the API gateway HTTP server
//!
//! Configuration is read from `--config`, or from `$CONFIGPATH/$CONFIG_NAME.toml`
//! (defaults `./env/app.toml`). A `.env` file in the working directory is
//! loaded first so `${VAR}` references in the config can be satisfied from it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use apigateway_server::AppConfig;

mod commands;
mod tracing_setup;

use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "apigateway",
    author,
    version,
    about = "API gateway with a retrying MySQL read/write bootstrap and SQL query logging"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, short = 'c', global = true, env = "APIGATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Server(commands::server::ServerArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&TracingConfig { debug: cli.debug }).ok();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Server(args) => commands::server::run_server(config, args).await?,
    }

    Ok(())
}
