//! Saved-search lifecycle: creation, edits, deactivation.
//!
//! Keywords are normalized at the write path so the match engine compares
//! token sets directly. Edits re-arm matching simply by changing the row the
//! next tick reads.

use rentboard_core::text::tokenize;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::storage::{Database, SearchQuery};

/// Criteria for a new or edited saved search, as entered by the user.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    /// Free text; tokenized and normalized here. Empty means an open query.
    pub keywords: String,
    pub location_filter: Option<String>,
    pub category_filter: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

pub struct SavedSearchService {
    db: Database,
}

impl SavedSearchService {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Save a search for later match notifications.
    pub async fn create(&self, user_id: &str, criteria: SearchCriteria) -> Result<SearchQuery> {
        let user = self.db.get_user(user_id).await?;
        if user.is_banned != 0 {
            return Err(EngineError::Authorization(format!(
                "User {user_id} is banned and may not save searches"
            )));
        }

        let keywords = validate(&criteria)?;
        let id = Uuid::new_v4().to_string();
        let query = self
            .db
            .create_search_query(
                &id,
                user_id,
                &keywords,
                criteria.location_filter.as_deref(),
                criteria.category_filter.as_deref(),
                criteria.price_min,
                criteria.price_max,
            )
            .await?;

        info!(query_id = %query.id, user_id, "Saved search created");
        Ok(query)
    }

    /// Rewrite a saved search's criteria. Only the owner may edit.
    pub async fn update(
        &self,
        query_id: &str,
        user_id: &str,
        criteria: SearchCriteria,
    ) -> Result<SearchQuery> {
        let keywords = validate(&criteria)?;

        let updated = self
            .db
            .update_search_query(
                query_id,
                user_id,
                &keywords,
                criteria.location_filter.as_deref(),
                criteria.category_filter.as_deref(),
                criteria.price_min,
                criteria.price_max,
            )
            .await?;

        if updated {
            Ok(self.db.get_search_query(query_id).await?)
        } else {
            // Distinguish a missing row from someone else's row.
            let existing = self.db.get_search_query(query_id).await?;
            Err(EngineError::Authorization(format!(
                "User {user_id} does not own search query {}",
                existing.id
            )))
        }
    }

    /// Turn a saved search off. The row is kept; no further notifications
    /// are produced for it.
    pub async fn deactivate(&self, query_id: &str, user_id: &str) -> Result<()> {
        let query = self.db.get_search_query(query_id).await?;
        if query.user_id != user_id {
            return Err(EngineError::Authorization(format!(
                "User {user_id} does not own search query {query_id}"
            )));
        }

        self.db.set_query_active(query_id, false).await?;
        info!(query_id, user_id, "Saved search deactivated");
        Ok(())
    }
}

/// Check price bounds and return the normalized keyword string.
fn validate(criteria: &SearchCriteria) -> Result<String> {
    if let Some(min) = criteria.price_min {
        if !min.is_finite() || min < 0.0 {
            return Err(EngineError::Validation(format!(
                "price_min {min} must be a non-negative number"
            )));
        }
    }
    if let Some(max) = criteria.price_max {
        if !max.is_finite() || max < 0.0 {
            return Err(EngineError::Validation(format!(
                "price_max {max} must be a non-negative number"
            )));
        }
    }
    if let (Some(min), Some(max)) = (criteria.price_min, criteria.price_max) {
        if min > max {
            return Err(EngineError::Validation(format!(
                "price_min {min} exceeds price_max {max}"
            )));
        }
    }

    Ok(tokenize(&criteria.keywords).join(" "))
}
