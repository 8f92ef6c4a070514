//! User queries for the Rentboard engine.

use super::db::{Database, StorageError, unix_timestamp};
use super::models::{User, UserRole};

impl Database {
    /// Create a new user.
    pub async fn create_user(
        &self,
        id: &str,
        username: &str,
        role: UserRole,
    ) -> Result<User, StorageError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO users (id, username, role, is_banned, created_at, updated_at) \
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(username)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_user(id).await
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("User {id}")))
    }

    /// Ban or unban a user. Returns `false` if the user does not exist.
    pub async fn set_user_banned(&self, id: &str, banned: bool) -> Result<bool, StorageError> {
        let now = unix_timestamp();

        let result = sqlx::query("UPDATE users SET is_banned = ?, updated_at = ? WHERE id = ?")
            .bind(i64::from(banned))
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Change a user's role. Returns `false` if the user does not exist.
    pub async fn set_user_role(&self, id: &str, role: UserRole) -> Result<bool, StorageError> {
        let now = unix_timestamp();

        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
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
    async fn create_and_get_user() {
        let db = test_db().await;

        let user = db.create_user("u-1", "anton", UserRole::User).await.unwrap();
        assert_eq!(user.username, "anton");
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.is_banned, 0);
    }

    #[tokio::test]
    async fn get_user_not_found() {
        let db = test_db().await;

        let err = db.get_user("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn ban_and_unban_user() {
        let db = test_db().await;
        db.create_user("u-1", "anton", UserRole::User).await.unwrap();

        assert!(db.set_user_banned("u-1", true).await.unwrap());
        assert_eq!(db.get_user("u-1").await.unwrap().is_banned, 1);

        assert!(db.set_user_banned("u-1", false).await.unwrap());
        assert_eq!(db.get_user("u-1").await.unwrap().is_banned, 0);
    }

    #[tokio::test]
    async fn set_role_promotes_to_moderator() {
        let db = test_db().await;
        db.create_user("u-1", "anton", UserRole::User).await.unwrap();

        assert!(db.set_user_role("u-1", UserRole::Moderator).await.unwrap());
        let user = db.get_user("u-1").await.unwrap();
        assert!(user.role.can_review());
    }

    #[tokio::test]
    async fn set_role_nonexistent_user() {
        let db = test_db().await;
        assert!(!db.set_user_role("ghost", UserRole::Admin).await.unwrap());
    }
}
