//! Moderation queries: the review queue and the append-only decision history.

use super::db::{Database, StorageError, unix_timestamp};
use super::models::{Ad, AdStatus, ModerationDecision, NotificationKind, QueueEntry, ReviewDecision};
use super::queries_state::next_match_cursor;

impl Database {
    /// Apply a review decision to a pending listing.
    ///
    /// The whole decision is one transaction: the status-guarded update, the
    /// cursor allocation (approvals only), the decision-history row, the
    /// queue drain, and the owner's notice. Returns `None` when the listing
    /// was not pending (a concurrent reviewer won or the status moved).
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_review(
        &self,
        ad_id: &str,
        owner_id: &str,
        reviewer_id: &str,
        decision: ReviewDecision,
        reason: Option<&str>,
        notice_id: &str,
        notice_content: &str,
    ) -> Result<Option<Ad>, StorageError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let result = match decision {
            ReviewDecision::Approved => {
                let cursor = next_match_cursor(&mut tx).await?;
                sqlx::query(
                    "UPDATE ads SET status = ?, match_cursor = ?, updated_at = ? \
                     WHERE id = ? AND status = ?",
                )
                .bind(AdStatus::Approved)
                .bind(cursor)
                .bind(now)
                .bind(ad_id)
                .bind(AdStatus::Pending)
                .execute(&mut *tx)
                .await?
            }
            ReviewDecision::Rejected => {
                sqlx::query(
                    "UPDATE ads SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                )
                .bind(AdStatus::Rejected)
                .bind(now)
                .bind(ad_id)
                .bind(AdStatus::Pending)
                .execute(&mut *tx)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO moderation_decisions (ad_id, reviewer_id, decision, reason, decided_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(ad_id)
        .bind(reviewer_id)
        .bind(decision)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM moderation_queue WHERE ad_id = ?")
            .bind(ad_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO notifications (id, user_id, ad_id, query_id, kind, content, is_read, created_at) \
             VALUES (?, ?, ?, NULL, ?, ?, 0, ?)",
        )
        .bind(notice_id)
        .bind(owner_id)
        .bind(ad_id)
        .bind(NotificationKind::Moderation)
        .bind(notice_content)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_ad(ad_id).await.map(Some)
    }

    /// Number of listings waiting for review.
    pub async fn pending_moderation_count(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM moderation_queue")
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }

    /// Next listing to review: highest priority first, then oldest.
    pub async fn next_ad_for_review(&self) -> Result<Option<Ad>, StorageError> {
        let ad = sqlx::query_as::<_, Ad>(
            "SELECT a.* FROM moderation_queue q JOIN ads a ON a.id = q.ad_id \
             ORDER BY q.priority DESC, q.created_at ASC LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await?;

        Ok(ad)
    }

    /// Get a queue entry by listing ID.
    pub async fn get_queue_entry(&self, ad_id: &str) -> Result<Option<QueueEntry>, StorageError> {
        let entry =
            sqlx::query_as::<_, QueueEntry>("SELECT * FROM moderation_queue WHERE ad_id = ?")
                .bind(ad_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(entry)
    }

    /// Assign a queued listing to a moderator. Returns `false` when the
    /// listing is not queued.
    pub async fn assign_moderator(
        &self,
        ad_id: &str,
        moderator_id: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE moderation_queue SET assigned_to = ? WHERE ad_id = ?")
            .bind(moderator_id)
            .bind(ad_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Full decision history for a listing, oldest first.
    pub async fn decisions_for_ad(
        &self,
        ad_id: &str,
    ) -> Result<Vec<ModerationDecision>, StorageError> {
        let decisions = sqlx::query_as::<_, ModerationDecision>(
            "SELECT * FROM moderation_decisions WHERE ad_id = ? ORDER BY id",
        )
        .bind(ad_id)
        .fetch_all(self.pool())
        .await?;

        Ok(decisions)
    }
}
