//! Durable scheduler state: watermark, cursor counter, leases, and counters.
//!
//! The `engine_state` table, not process memory, is authoritative for the
//! match pipeline position, so any instance can resume after a restart.

use sqlx::SqliteConnection;

use super::db::{Database, StorageError, unix_timestamp};
use super::models::EngineStats;

/// Advance the cursor counter and return the new value.
///
/// Runs on the caller's transaction so the allocated value commits (or rolls
/// back) together with the row that consumes it.
pub(crate) async fn next_match_cursor(conn: &mut SqliteConnection) -> Result<i64, StorageError> {
    sqlx::query("UPDATE engine_state SET value = value + 1 WHERE key = 'match_cursor_seq'")
        .execute(&mut *conn)
        .await?;

    let cursor: i64 =
        sqlx::query_scalar("SELECT value FROM engine_state WHERE key = 'match_cursor_seq'")
            .fetch_one(&mut *conn)
            .await?;

    Ok(cursor)
}

impl Database {
    /// Last match cursor whose dispatch fully committed.
    pub async fn watermark(&self) -> Result<i64, StorageError> {
        let value: i64 =
            sqlx::query_scalar("SELECT value FROM engine_state WHERE key = 'watermark'")
                .fetch_one(self.pool())
                .await?;

        Ok(value)
    }

    /// Persist the watermark.
    pub async fn set_watermark(&self, value: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE engine_state SET value = ? WHERE key = 'watermark'")
            .bind(value)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Try to take (or refresh) a named lease for `ttl_secs`.
    ///
    /// Succeeds when the lease is free, expired, or already held by this
    /// holder. Returns `false` when another live holder owns it.
    pub async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl_secs: i64,
    ) -> Result<bool, StorageError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE engine_lease SET holder = ?, expires_at = ? \
             WHERE name = ? AND (holder IS NULL OR holder = ? OR expires_at <= ?)",
        )
        .bind(holder)
        .bind(now + ttl_secs)
        .bind(name)
        .bind(holder)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release a lease held by `holder`. Releasing someone else's lease is a
    /// no-op and returns `false`.
    pub async fn release_lease(&self, name: &str, holder: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE engine_lease SET holder = NULL, expires_at = 0 \
             WHERE name = ? AND holder = ?",
        )
        .bind(name)
        .bind(holder)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Engine-wide counters for the maintenance tick's stats log.
    pub async fn stats(&self) -> Result<EngineStats, StorageError> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        let ads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads")
            .fetch_one(self.pool())
            .await?;
        let pending_ads: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE status = 'pending'")
                .fetch_one(self.pool())
                .await?;
        let approved_ads: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE status = 'approved'")
                .fetch_one(self.pool())
                .await?;
        let active_queries: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM search_queries WHERE is_active = 1")
                .fetch_one(self.pool())
                .await?;
        let unread_notifications: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = 0")
                .fetch_one(self.pool())
                .await?;

        Ok(EngineStats {
            users,
            ads,
            pending_ads,
            approved_ads,
            active_queries,
            unread_notifications,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn watermark_starts_at_zero() {
        let db = test_db().await;
        assert_eq!(db.watermark().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn watermark_roundtrip() {
        let db = test_db().await;
        db.set_watermark(42).await.unwrap();
        assert_eq!(db.watermark().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn cursor_counter_is_monotonic() {
        let db = test_db().await;

        let mut conn = db.pool().acquire().await.unwrap();
        let first = next_match_cursor(&mut conn).await.unwrap();
        let second = next_match_cursor(&mut conn).await.unwrap();
        assert_eq!(second, first + 1);
    }

    #[tokio::test]
    async fn lease_excludes_other_holders() {
        let db = test_db().await;

        assert!(db.try_acquire_lease("match-tick", "a", 60).await.unwrap());
        assert!(!db.try_acquire_lease("match-tick", "b", 60).await.unwrap());
        // The holder itself may refresh.
        assert!(db.try_acquire_lease("match-tick", "a", 60).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_is_taken_over() {
        let db = test_db().await;

        assert!(db.try_acquire_lease("match-tick", "a", -1).await.unwrap());
        assert!(db.try_acquire_lease("match-tick", "b", 60).await.unwrap());
    }

    #[tokio::test]
    async fn release_requires_matching_holder() {
        let db = test_db().await;

        assert!(db.try_acquire_lease("match-tick", "a", 60).await.unwrap());
        assert!(!db.release_lease("match-tick", "b").await.unwrap());
        assert!(db.release_lease("match-tick", "a").await.unwrap());
        assert!(db.try_acquire_lease("match-tick", "b", 60).await.unwrap());
    }

    #[tokio::test]
    async fn watermark_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.db");

        {
            let db = Database::open(&path).await.unwrap();
            db.set_watermark(7).await.unwrap();
        }

        // A fresh process resumes from the persisted position.
        let db = Database::open(&path).await.unwrap();
        assert_eq!(db.watermark().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn stats_on_empty_database() {
        let db = test_db().await;

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.users, 0);
        assert_eq!(stats.ads, 0);
        assert_eq!(stats.unread_notifications, 0);
    }
}
