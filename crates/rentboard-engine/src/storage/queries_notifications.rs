//! Notification queries for the Rentboard engine.
//!
//! Match notifications are keyed by (ad_id, query_id) under a uniqueness
//! constraint; a conflicting insert means the pair was already notified (by
//! this run or a prior crashed one) and is treated as success-no-op. That is
//! the idempotence mechanism the whole pipeline leans on.

use super::db::{Database, StorageError, unix_timestamp};
use super::models::{Notification, NotificationKind};

impl Database {
    /// Insert a match notification unless the (ad, query) pair was already
    /// notified. Returns `true` when a row was actually created.
    pub async fn insert_notification_if_absent(
        &self,
        id: &str,
        user_id: &str,
        ad_id: &str,
        query_id: &str,
        content: &str,
    ) -> Result<bool, StorageError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO notifications (id, user_id, ad_id, query_id, kind, content, is_read, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?) \
             ON CONFLICT (ad_id, query_id) DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .bind(ad_id)
        .bind(query_id)
        .bind(NotificationKind::Match)
        .bind(content)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a notification by ID.
    pub async fn get_notification(&self, id: &str) -> Result<Notification, StorageError> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("Notification {id}")))
    }

    /// Oldest unread notifications across all recipients, up to `limit`.
    pub async fn list_unread_notifications(
        &self,
        limit: u32,
    ) -> Result<Vec<Notification>, StorageError> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE is_read = 0 ORDER BY created_at ASC, id LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(notifications)
    }

    /// A recipient's unread notifications, oldest first.
    pub async fn list_unread_notifications_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Notification>, StorageError> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = ? AND is_read = 0 \
             ORDER BY created_at ASC, id LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(notifications)
    }

    /// Mark one notification read. Returns `false` if it does not exist.
    pub async fn mark_notification_read(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark all of a recipient's notifications read. Returns the count.
    pub async fn mark_all_read_for_user(&self, user_id: &str) -> Result<u64, StorageError> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected())
    }

    /// Delete read notifications created before `cutoff`. Returns the count.
    pub async fn purge_read_notifications_before(
        &self,
        cutoff: i64,
    ) -> Result<u64, StorageError> {
        let result =
            sqlx::query("DELETE FROM notifications WHERE is_read = 1 AND created_at <= ?")
                .bind(cutoff)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::super::models::UserRole;
    use super::*;

    async fn test_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.create_user("u-1", "anton", UserRole::User).await.unwrap();
        db.create_user("u-2", "boris", UserRole::User).await.unwrap();
        db.create_category("cat-1", "Apartments").await.unwrap();
        db.create_ad("ad-1", "u-1", "Bike", "City bike", "cat-1", 100.0, "Moscow", 1)
            .await
            .unwrap();
        db.create_search_query("q-1", "u-2", "bike", None, None, None, None)
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn insert_once_then_no_op() {
        let db = test_db().await;

        let created = db
            .insert_notification_if_absent("n-1", "u-2", "ad-1", "q-1", "new listing")
            .await
            .unwrap();
        assert!(created);

        // Same pair again: swallowed by the constraint, no error.
        let created = db
            .insert_notification_if_absent("n-2", "u-2", "ad-1", "q-1", "new listing")
            .await
            .unwrap();
        assert!(!created);

        let unread = db.list_unread_notifications(10).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, "n-1");
    }

    #[tokio::test]
    async fn mark_read_removes_from_unread() {
        let db = test_db().await;
        db.insert_notification_if_absent("n-1", "u-2", "ad-1", "q-1", "x")
            .await
            .unwrap();

        assert!(db.mark_notification_read("n-1").await.unwrap());
        assert!(db.list_unread_notifications(10).await.unwrap().is_empty());

        assert!(!db.mark_notification_read("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn unread_listing_is_scoped_per_user() {
        let db = test_db().await;
        db.create_search_query("q-2", "u-1", "bike", None, None, None, None)
            .await
            .unwrap();
        db.insert_notification_if_absent("n-1", "u-2", "ad-1", "q-1", "x")
            .await
            .unwrap();
        db.insert_notification_if_absent("n-2", "u-1", "ad-1", "q-2", "y")
            .await
            .unwrap();

        let for_u2 = db.list_unread_notifications_for_user("u-2", 10).await.unwrap();
        assert_eq!(for_u2.len(), 1);
        assert_eq!(for_u2[0].id, "n-1");

        assert_eq!(db.mark_all_read_for_user("u-1").await.unwrap(), 1);
        assert_eq!(db.list_unread_notifications(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_only_touches_read_rows() {
        let db = test_db().await;
        db.insert_notification_if_absent("n-1", "u-2", "ad-1", "q-1", "x")
            .await
            .unwrap();

        let future = unix_timestamp() + 10;
        // Unread rows survive any cutoff.
        assert_eq!(db.purge_read_notifications_before(future).await.unwrap(), 0);

        db.mark_notification_read("n-1").await.unwrap();
        assert_eq!(db.purge_read_notifications_before(future).await.unwrap(), 1);
        assert!(matches!(
            db.get_notification("n-1").await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }
}
