//! Hosted kanban store.
//!
//! An axum WebSocket server that authenticates clients by email and serves
//! board, column, task and subtask operations from an in-memory dataset.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9400
//! cargo run --bin kanban-store
//!
//! # Run on custom address
//! cargo run --bin kanban-store -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! KANBAN_STORE_ADDR=127.0.0.1:8080 cargo run --bin kanban-store
//! ```

use std::sync::Arc;

use clap::Parser;
use kanban_store::config::{StoreCliArgs, StoreConfig};
use kanban_store::server::{self, StoreState};

#[tokio::main]
async fn main() {
    let cli = StoreCliArgs::parse();

    let config = match StoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        board = %config.provisioning.board_name,
        columns = config.provisioning.columns.len(),
        "starting kanban store"
    );

    let state = Arc::new(StoreState::with_config(
        config.max_payload_size,
        config.provisioning,
    ));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "kanban store listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start store server");
            std::process::exit(1);
        }
    }
}
