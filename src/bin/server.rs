//! ruledb Server Binary
//!
//! Opens the rule store and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ruledb::http::{self, AppState};
use ruledb::{Config, RuleRepository, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// ruledb Server
#[derive(Parser, Debug)]
#[command(name = "ruledb-server")]
#[command(about = "IP filter rule store with an HTTP API")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "./ruledb.db")]
    db_path: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// How long to wait for the store file lock (milliseconds)
    #[arg(long, default_value = "1000")]
    lock_timeout_ms: u64,

    /// Bucket holding the rules
    #[arg(short, long, default_value = ruledb::DEFAULT_BUCKET)]
    bucket: String,

    /// Maximum request body size in KB
    #[arg(long, default_value = "4096")]
    max_body_kb: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ruledb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ruledb Server v{}", ruledb::VERSION);
    tracing::info!("Store file: {}", args.db_path);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .db_path(&args.db_path)
        .listen_addr(&args.listen)
        .lock_timeout(Duration::from_millis(args.lock_timeout_ms))
        .default_bucket(&args.bucket)
        .max_body_bytes(args.max_body_kb * 1024)
        .build();

    // Open store
    let store = match Store::open(config.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(RuleRepository::new(Arc::clone(&store)));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    };

    let served = http::serve(&config, state, shutdown).await;

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store: {}", e);
    }

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
