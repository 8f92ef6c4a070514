//! Delivery port and worker.
//!
//! The engine's observable output is notification rows; pushing them to a
//! chat transport is the delivery collaborator's job, behind the
//! [`DeliverySink`] trait. The worker sweeps unread rows oldest-first,
//! sends, and marks a row read only after a successful send, so failed
//! sends are retried on the next sweep.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rentboard_core::config::DeliveryConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::Database;

/// Transport-side failure.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Outbound message transport (chat bot, e-mail bridge, test recorder).
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(&self, user_id: &str, text: &str) -> std::result::Result<(), DeliveryError>;
}

pub struct DeliveryWorker {
    db: Database,
    sink: Arc<dyn DeliverySink>,
    config: DeliveryConfig,
}

impl DeliveryWorker {
    pub fn new(db: Database, sink: Arc<dyn DeliverySink>, config: DeliveryConfig) -> Self {
        Self { db, sink, config }
    }

    /// One sweep over unread notifications. Returns the number sent.
    pub async fn run_once(&self) -> Result<usize> {
        let pending = self
            .db
            .list_unread_notifications(self.config.batch_size)
            .await?;
        let mut sent = 0usize;

        for notification in &pending {
            match self
                .sink
                .send(&notification.user_id, &notification.content)
                .await
            {
                Ok(()) => {
                    self.db.mark_notification_read(&notification.id).await?;
                    sent += 1;
                }
                Err(e) => {
                    warn!(
                        notification_id = %notification.id,
                        user_id = %notification.user_id,
                        error = %e,
                        "Delivery failed; will retry next sweep"
                    );
                }
            }

            if self.config.throttle_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.throttle_ms)).await;
            }
        }

        if sent > 0 {
            debug!(sent, "Delivery sweep complete");
        }

        Ok(sent)
    }
}

/// Spawn the periodic delivery loop.
pub fn spawn_delivery_loop(
    worker: Arc<DeliveryWorker>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer =
            tokio::time::interval(Duration::from_secs(worker.config.sweep_interval_secs));
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = worker.run_once().await {
                        warn!(error = %e, "Delivery sweep failed; will retry next interval");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Delivery loop shutting down");
                    return;
                }
            }
        }
    })
}
