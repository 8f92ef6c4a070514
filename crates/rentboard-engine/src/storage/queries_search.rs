//! Saved-search queries for the Rentboard engine.

use super::db::{Database, StorageError, unix_timestamp};
use super::models::SearchQuery;

impl Database {
    /// Persist a saved search. `keywords` must already be normalized
    /// (space-joined tokens; empty string for an open query).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_search_query(
        &self,
        id: &str,
        user_id: &str,
        keywords: &str,
        location_filter: Option<&str>,
        category_filter: Option<&str>,
        price_min: Option<f64>,
        price_max: Option<f64>,
    ) -> Result<SearchQuery, StorageError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO search_queries (id, user_id, keywords, location_filter, \
             category_filter, price_min, price_max, is_active, last_matched_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, NULL, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(keywords)
        .bind(location_filter)
        .bind(category_filter)
        .bind(price_min)
        .bind(price_max)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_search_query(id).await
    }

    /// Get a saved search by ID.
    pub async fn get_search_query(&self, id: &str) -> Result<SearchQuery, StorageError> {
        sqlx::query_as::<_, SearchQuery>("SELECT * FROM search_queries WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("Search query {id}")))
    }

    /// All active saved searches, in a stable order.
    pub async fn list_active_queries(&self) -> Result<Vec<SearchQuery>, StorageError> {
        let queries = sqlx::query_as::<_, SearchQuery>(
            "SELECT * FROM search_queries WHERE is_active = 1 ORDER BY created_at, id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(queries)
    }

    /// A user's saved searches, newest first.
    pub async fn list_queries_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<SearchQuery>, StorageError> {
        let queries = sqlx::query_as::<_, SearchQuery>(
            "SELECT * FROM search_queries WHERE user_id = ? ORDER BY created_at DESC, id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(queries)
    }

    /// Rewrite a saved search's criteria (owner edit re-arms matching).
    /// Guarded on ownership; returns `false` when the row is missing or
    /// owned by someone else.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_search_query(
        &self,
        id: &str,
        user_id: &str,
        keywords: &str,
        location_filter: Option<&str>,
        category_filter: Option<&str>,
        price_min: Option<f64>,
        price_max: Option<f64>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE search_queries SET keywords = ?, location_filter = ?, category_filter = ?, \
             price_min = ?, price_max = ? WHERE id = ? AND user_id = ?",
        )
        .bind(keywords)
        .bind(location_filter)
        .bind(category_filter)
        .bind(price_min)
        .bind(price_max)
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activate or deactivate a saved search.
    pub async fn set_query_active(&self, id: &str, active: bool) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE search_queries SET is_active = ? WHERE id = ?")
            .bind(i64::from(active))
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp the last time a search produced a notification.
    pub async fn touch_query_matched(&self, id: &str, at: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE search_queries SET last_matched_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Deactivate searches with no match activity since `cutoff` (falling
    /// back to creation time for never-matched searches). Searches are never
    /// deleted. Returns the number deactivated.
    pub async fn deactivate_stale_queries(&self, cutoff: i64) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE search_queries SET is_active = 0 \
             WHERE is_active = 1 AND COALESCE(last_matched_at, created_at) <= ?",
        )
        .bind(cutoff)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
