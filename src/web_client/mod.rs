//! kindred web client: local API server over the shared store.
//!
//! Provides a loopback REST API for accounts, discovery, connection
//! requests, and connections, and persists state in SQLite.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::sync::Arc;

use clap::Parser;

use crate::accounts;
use crate::storage::{db_path, Storage};

use config::{Cli, Config};
use state::{AppState, SharedState};

/// Entry point: parse CLI, open storage, seed demo data, start server.
pub async fn run() {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    crate::klog!("kindred starting");
    crate::klog!("  data directory: {}", config.data_dir.display());

    let database = db_path(&config.data_dir);
    let storage = Storage::open(&database).expect("failed to open database");
    crate::klog!("  database: {}", database.display());

    match accounts::ensure_demo_users(&storage) {
        Ok(0) => {}
        Ok(n) => crate::klog!("  seeded {} demo account(s)", n),
        Err(e) => crate::klog!("  WARNING: demo seeding failed: {}", e),
    }

    let state: SharedState = Arc::new(tokio::sync::Mutex::new(AppState { storage }));

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    crate::klog!("kindred listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}
