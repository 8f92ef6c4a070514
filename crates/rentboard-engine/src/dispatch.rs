//! Notification dispatcher: turns match pairs into idempotent notification
//! rows.
//!
//! The insert goes through the (ad_id, query_id) uniqueness constraint; a
//! pair that was already notified — by this run or a prior crashed one — is
//! a success-no-op. That makes the whole pipeline safely re-runnable.

use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::matching::MatchPair;
use crate::render;
use crate::storage::{Database, unix_timestamp};

pub struct Dispatcher {
    db: Database,
}

impl Dispatcher {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist one notification per pair. Returns the number actually
    /// created (already-notified pairs are skipped silently).
    pub async fn dispatch(&self, pairs: &[MatchPair]) -> Result<usize> {
        let mut created = 0usize;

        for pair in pairs {
            let content = render::match_notice(&pair.ad, &pair.query);
            let id = Uuid::new_v4().to_string();

            let inserted = self
                .db
                .insert_notification_if_absent(
                    &id,
                    &pair.query.user_id,
                    &pair.ad.id,
                    &pair.query.id,
                    &content,
                )
                .await?;

            if inserted {
                created += 1;
                self.db
                    .touch_query_matched(&pair.query.id, unix_timestamp())
                    .await?;
            }
        }

        if created > 0 {
            debug!(created, total = pairs.len(), "Dispatched match notifications");
        }

        Ok(created)
    }
}
