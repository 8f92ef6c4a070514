//! Periodic driver for the match pipeline and maintenance work.
//!
//! Each tick is guarded by a database lease so that, with several instances
//! deployed, only one executes the pipeline per interval; a held lease means
//! the tick is skipped, not queued. The watermark is advanced only after
//! dispatch fully commits, so a crash mid-tick re-runs the same window and
//! the dispatcher's idempotence absorbs the duplicates.

use std::sync::Arc;
use std::time::Duration;

use rentboard_core::config::{RetentionConfig, SchedulerConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::matching::MatchEngine;
use crate::storage::{Database, unix_timestamp};

const MATCH_LEASE: &str = "match-tick";
const MAINTENANCE_LEASE: &str = "maintenance";
const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Outcome of one match tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another instance holds the lease; nothing was done.
    Skipped,
    /// The tick ran to completion.
    Completed {
        /// Watermark position after the tick.
        scanned_to: i64,
        /// Notifications created.
        created: usize,
    },
}

/// Outcome of one maintenance tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceOutcome {
    Skipped,
    Completed { purged: u64, deactivated: u64 },
}

pub struct Scheduler {
    db: Database,
    matcher: MatchEngine,
    dispatcher: Dispatcher,
    config: SchedulerConfig,
    retention: RetentionConfig,
    instance_id: String,
}

impl Scheduler {
    pub fn new(
        db: Database,
        config: SchedulerConfig,
        retention: RetentionConfig,
        instance_id: impl Into<String>,
    ) -> Self {
        let matcher = MatchEngine::new(db.clone(), config.batch_size);
        let dispatcher = Dispatcher::new(db.clone());
        Self {
            db,
            matcher,
            dispatcher,
            config,
            retention,
            instance_id: instance_id.into(),
        }
    }

    /// One lease-guarded pass of the match pipeline.
    pub async fn run_match_tick(&self) -> Result<TickOutcome> {
        if !self
            .db
            .try_acquire_lease(MATCH_LEASE, &self.instance_id, self.config.lease_ttl_secs)
            .await?
        {
            debug!("Match lease held elsewhere; skipping tick");
            return Ok(TickOutcome::Skipped);
        }

        let outcome = self.match_and_dispatch().await;

        // On failure the lease is still released; a crashed holder's lease
        // expires on its own.
        if let Err(e) = self.db.release_lease(MATCH_LEASE, &self.instance_id).await {
            warn!(error = %e, "Failed to release match lease");
        }

        outcome
    }

    /// Watermark → find matches → dispatch → advance watermark.
    async fn match_and_dispatch(&self) -> Result<TickOutcome> {
        let since = self.db.watermark().await?;
        let batch = self.matcher.find_matches(since).await?;
        let created = self.dispatcher.dispatch(&batch.pairs).await?;

        if batch.max_cursor > since {
            self.db.set_watermark(batch.max_cursor).await?;
            info!(
                since,
                scanned_to = batch.max_cursor,
                created,
                "Match tick complete"
            );
        }

        Ok(TickOutcome::Completed {
            scanned_to: batch.max_cursor,
            created,
        })
    }

    /// One lease-guarded maintenance pass: retention windows plus a stats
    /// snapshot at info level.
    pub async fn run_maintenance_tick(&self) -> Result<MaintenanceOutcome> {
        if !self
            .db
            .try_acquire_lease(MAINTENANCE_LEASE, &self.instance_id, self.config.lease_ttl_secs)
            .await?
        {
            debug!("Maintenance lease held elsewhere; skipping tick");
            return Ok(MaintenanceOutcome::Skipped);
        }

        let outcome = self.maintain().await;

        if let Err(e) = self
            .db
            .release_lease(MAINTENANCE_LEASE, &self.instance_id)
            .await
        {
            warn!(error = %e, "Failed to release maintenance lease");
        }

        outcome
    }

    async fn maintain(&self) -> Result<MaintenanceOutcome> {
        let now = unix_timestamp();

        let purged = self
            .db
            .purge_read_notifications_before(now - self.retention.purge_read_after_days * SECS_PER_DAY)
            .await?;
        let deactivated = self
            .db
            .deactivate_stale_queries(
                now - self.retention.deactivate_queries_after_days * SECS_PER_DAY,
            )
            .await?;

        let stats = self.db.stats().await?;
        info!(
            purged,
            deactivated,
            users = stats.users,
            ads = stats.ads,
            pending_ads = stats.pending_ads,
            approved_ads = stats.approved_ads,
            active_queries = stats.active_queries,
            unread_notifications = stats.unread_notifications,
            "Maintenance tick complete"
        );

        Ok(MaintenanceOutcome::Completed { purged, deactivated })
    }
}

/// Spawn the periodic match loop.
pub fn spawn_match_loop(
    scheduler: Arc<Scheduler>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer =
            tokio::time::interval(Duration::from_secs(scheduler.config.match_interval_secs));
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let budget = Duration::from_secs(scheduler.config.tick_timeout_secs);
                    match tokio::time::timeout(budget, scheduler.run_match_tick()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!(error = %e, "Match tick failed; will retry next interval"),
                        Err(_) => warn!("Match tick timed out; will retry next interval"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Match loop shutting down");
                    return;
                }
            }
        }
    })
}

/// Spawn the periodic maintenance loop.
pub fn spawn_maintenance_loop(
    scheduler: Arc<Scheduler>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(Duration::from_secs(
            scheduler.config.maintenance_interval_secs,
        ));
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let budget = Duration::from_secs(scheduler.config.tick_timeout_secs);
                    match tokio::time::timeout(budget, scheduler.run_maintenance_tick()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!(error = %e, "Maintenance tick failed; will retry next interval"),
                        Err(_) => warn!("Maintenance tick timed out; will retry next interval"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Maintenance loop shutting down");
                    return;
                }
            }
        }
    })
}
