//! Listing (ad) queries for the Rentboard engine.

use super::db::{Database, StorageError, unix_timestamp};
use super::models::{Ad, AdStatus};
use super::queries_state::next_match_cursor;

impl Database {
    /// Insert a new listing in `pending` state and enqueue it for moderation.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_ad(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        description: &str,
        category_id: &str,
        price: f64,
        location: &str,
        queue_priority: i64,
    ) -> Result<Ad, StorageError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO ads (id, owner_id, title, description, category_id, price, location, \
             status, match_cursor, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .bind(category_id)
        .bind(price)
        .bind(location)
        .bind(AdStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO moderation_queue (ad_id, priority, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(queue_priority)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_ad(id).await
    }

    /// Get a listing by ID.
    pub async fn get_ad(&self, id: &str) -> Result<Ad, StorageError> {
        sqlx::query_as::<_, Ad>("SELECT * FROM ads WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("Ad {id}")))
    }

    /// Conditional status transition: applies only when the listing is
    /// currently in `expected`. Returns `false` when the guard did not hold
    /// (missing row or a concurrent transition won).
    pub async fn update_ad_status(
        &self,
        id: &str,
        expected: AdStatus,
        new: AdStatus,
    ) -> Result<bool, StorageError> {
        let now = unix_timestamp();

        let result =
            sqlx::query("UPDATE ads SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(new)
                .bind(now)
                .bind(id)
                .bind(expected)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Page of approved listings past the watermark, in cursor order.
    pub async fn list_approved_ads_since(
        &self,
        watermark: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Ad>, StorageError> {
        let ads = sqlx::query_as::<_, Ad>(
            "SELECT * FROM ads WHERE status = 'approved' AND match_cursor > ? \
             ORDER BY match_cursor ASC LIMIT ? OFFSET ?",
        )
        .bind(watermark)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(ads)
    }

    /// Count of an owner's listings still occupying marketplace slots
    /// (pending or approved).
    pub async fn count_active_ads_for_owner(&self, owner_id: &str) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ads WHERE owner_id = ? AND status IN ('pending', 'approved')",
        )
        .bind(owner_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    /// All listings for an owner, newest first.
    pub async fn list_ads_for_owner(&self, owner_id: &str) -> Result<Vec<Ad>, StorageError> {
        let ads = sqlx::query_as::<_, Ad>(
            "SELECT * FROM ads WHERE owner_id = ? ORDER BY created_at DESC, id",
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;

        Ok(ads)
    }

    /// Owner edit: rewrite the searchable fields, move the listing back to
    /// `pending`, bump its match cursor, and re-enqueue it for moderation.
    ///
    /// Guarded on the status the caller observed; returns `None` when a
    /// concurrent transition invalidated that observation.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_resubmit(
        &self,
        id: &str,
        expected: AdStatus,
        title: &str,
        description: &str,
        category_id: &str,
        price: f64,
        location: &str,
        queue_priority: i64,
    ) -> Result<Option<Ad>, StorageError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let cursor = next_match_cursor(&mut tx).await?;

        let result = sqlx::query(
            "UPDATE ads SET title = ?, description = ?, category_id = ?, price = ?, \
             location = ?, status = ?, match_cursor = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(title)
        .bind(description)
        .bind(category_id)
        .bind(price)
        .bind(location)
        .bind(AdStatus::Pending)
        .bind(cursor)
        .bind(now)
        .bind(id)
        .bind(expected)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "INSERT OR REPLACE INTO moderation_queue (ad_id, priority, created_at) \
             VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(queue_priority)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_ad(id).await.map(Some)
    }
}
