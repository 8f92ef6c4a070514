//! Rentboard Engine Daemon
//!
//! Runs the search-match notification pipeline: the lease-guarded match
//! scheduler, the maintenance loop, and the delivery worker. Ad submission,
//! review, and saved-search management are driven by external collaborators
//! through the engine's services; this process only keeps the periodic
//! machinery alive.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use rentboard_core::config::{self, Config};
use rentboard_core::tracing_init::init_tracing;
use rentboard_engine::delivery::{DeliveryError, DeliverySink, DeliveryWorker, spawn_delivery_loop};
use rentboard_engine::scheduler::{Scheduler, spawn_maintenance_loop, spawn_match_loop};
use rentboard_engine::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "rentboard-daemon")]
#[command(version, about = "Rentboard engine daemon - match scheduler and delivery loops")]
struct Args {
    /// Path to the SQLite database file.
    #[arg(long, env = "RENTBOARD_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Seconds between match-scan ticks.
    #[arg(long, env = "RENTBOARD_MATCH_INTERVAL_SECS")]
    match_interval: Option<u64>,

    /// Identifier of this instance in the shared lease table.
    #[arg(long)]
    instance_id: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

/// Default sink: writes would-be messages to the log. Real chat transports
/// are external collaborators that implement [`DeliverySink`].
struct LogDeliverySink;

#[async_trait]
impl DeliverySink for LogDeliverySink {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), DeliveryError> {
        info!(user_id, text, "Delivering notification");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing("rentboard_daemon=info,rentboard_engine=info", args.log_json);

    let mut config: Config = config::load_config(Some(&std::env::current_dir()?))?;
    if let Some(path) = args.db_path {
        config.database.path = Some(path);
    }
    if let Some(secs) = args.match_interval {
        config.scheduler.match_interval_secs = secs;
    }

    let instance_id = args
        .instance_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        instance_id = %instance_id,
        "Starting rentboard-daemon"
    );

    let db_path = match config.database.path.clone() {
        Some(path) => path,
        None => config::default_database_path()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?,
    };
    let db = Database::open(&db_path).await?;

    let scheduler = Arc::new(Scheduler::new(
        db.clone(),
        config.scheduler.clone(),
        config.retention.clone(),
        instance_id,
    ));
    let worker = Arc::new(DeliveryWorker::new(
        db,
        Arc::new(LogDeliverySink),
        config.delivery.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = vec![
        spawn_match_loop(Arc::clone(&scheduler), shutdown_rx.clone()),
        spawn_maintenance_loop(scheduler, shutdown_rx.clone()),
        spawn_delivery_loop(worker, shutdown_rx),
    ];

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    info!("Daemon stopped");
    Ok(())
}
