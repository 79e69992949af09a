//! Configuration types for the kindred web server.

use std::path::PathBuf;

use clap::Parser;

/// Local API server for the kindred social connections client.
///
/// Exposes accounts, discovery, connection requests, and connections over a
/// loopback HTTP API, and persists state in SQLite.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "kindred", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: KINDRED_WEB_BIND] [default: 127.0.0.1:3000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database [env: KINDRED_HOME] [default: ~/.kindred]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,
}

pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| std::env::var("KINDRED_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".kindred"))
                    .unwrap_or_else(|_| PathBuf::from(".kindred"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("KINDRED_WEB_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());

        Self {
            bind_addr,
            data_dir,
        }
    }
}
