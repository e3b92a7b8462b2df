//! Subcommand implementations

pub mod server;
