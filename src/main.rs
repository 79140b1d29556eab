//! verkv - An In-Memory, Versioned Key-Value Cache
//!
//! Main entry point: sets up logging, the shared store, the optional reaper
//! and the TCP listener.

use clap::Parser;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use verkv::commands::CommandHandler;
use verkv::connection::{handle_connection, ConnectionStats};
use verkv::protocol::RequestDecoder;
use verkv::storage::{Reaper, Store};
use verkv::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(version = verkv::VERSION, "Starting verkv");

    // Shared across all connections
    let store = Arc::new(Store::new());

    let _reaper = match config.reaper_config() {
        Some(reaper_config) => Some(Reaper::start(Arc::clone(&store), reaper_config)),
        None => {
            info!("Reaper disabled, expired keys are dropped on access");
            None
        }
    };

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&store), Arc::clone(&stats), config.max_value_size) => {}
        _ = shutdown => {}
    }

    log_summary(&store, &stats);
    info!("Server shutdown complete");
    Ok(())
}

/// Logs the lifetime counters of the store and the connections.
fn log_summary(store: &Store, stats: &ConnectionStats) {
    let store_stats = store.stats();
    info!(
        keys = store_stats.keys,
        reads = store_stats.reads,
        writes = store_stats.writes,
        deletes = store_stats.deletes,
        cas_hits = store_stats.cas_hits,
        cas_conflicts = store_stats.cas_conflicts,
        expired = store_stats.expired,
        "Store summary"
    );
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        protocol_errors = stats.protocol_errors.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        "Connection summary"
    );
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    store: Arc<Store>,
    stats: Arc<ConnectionStats>,
    max_value_size: usize,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&store));
                let decoder = RequestDecoder::with_max_value_size(max_value_size);
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, decoder, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
