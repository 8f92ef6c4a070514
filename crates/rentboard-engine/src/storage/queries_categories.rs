//! Category queries for the Rentboard engine.

use super::db::{Database, StorageError, unix_timestamp};
use super::models::Category;

impl Database {
    /// Create a category. The name must be unique.
    pub async fn create_category(&self, id: &str, name: &str) -> Result<Category, StorageError> {
        let now = unix_timestamp();

        sqlx::query("INSERT INTO categories (id, name, is_active, created_at) VALUES (?, ?, 1, ?)")
            .bind(id)
            .bind(name)
            .bind(now)
            .execute(self.pool())
            .await?;

        self.get_category(id).await
    }

    /// Get a category by ID.
    pub async fn get_category(&self, id: &str) -> Result<Category, StorageError> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("Category {id}")))
    }

    /// List active categories ordered by name.
    pub async fn list_active_categories(&self) -> Result<Vec<Category>, StorageError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(categories)
    }

    /// Activate or retire a category. Returns `false` if it does not exist.
    pub async fn set_category_active(&self, id: &str, active: bool) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE categories SET is_active = ? WHERE id = ?")
            .bind(i64::from(active))
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
