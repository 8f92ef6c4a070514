//! Moderation state machine for listings.
//!
//! Pending → {Approved, Rejected}; Approved → Withdrawn by owner action;
//! Rejected (or Approved) → Pending by owner resubmission. Review races are
//! settled by a status-guarded conditional update, so exactly one reviewer
//! wins and the loser gets a `Conflict`.

use rentboard_core::config::ModerationConfig;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::render;
use crate::storage::{Ad, AdStatus, Database, ReviewDecision, StorageError};

/// Default moderation-queue priority for fresh submissions.
const DEFAULT_QUEUE_PRIORITY: i64 = 1;

/// Input for a new listing submission.
#[derive(Debug, Clone)]
pub struct NewAd {
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub price: f64,
    pub location: String,
}

/// Owner edit applied on resubmission; unset fields keep current values.
#[derive(Debug, Clone, Default)]
pub struct AdEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub price: Option<f64>,
    pub location: Option<String>,
}

pub struct ModerationService {
    db: Database,
    policy: ModerationConfig,
}

impl ModerationService {
    pub const fn new(db: Database, policy: ModerationConfig) -> Self {
        Self { db, policy }
    }

    /// Create a listing in `pending` state and enqueue it for review.
    pub async fn submit(&self, ad: NewAd) -> Result<Ad> {
        self.validate_fields(&ad.title, ad.price)?;

        let owner = self.db.get_user(&ad.owner_id).await?;
        if owner.is_banned != 0 {
            return Err(EngineError::Authorization(format!(
                "User {} is banned and may not submit listings",
                owner.id
            )));
        }

        self.validate_category(&ad.category_id).await?;

        let active = self.db.count_active_ads_for_owner(&ad.owner_id).await?;
        if active >= i64::from(self.policy.max_ads_per_user) {
            return Err(EngineError::Validation(format!(
                "User {} already has {active} active listings (limit {})",
                ad.owner_id, self.policy.max_ads_per_user
            )));
        }

        let id = Uuid::new_v4().to_string();
        let created = self
            .db
            .create_ad(
                &id,
                &ad.owner_id,
                &ad.title,
                &ad.description,
                &ad.category_id,
                ad.price,
                &ad.location,
                DEFAULT_QUEUE_PRIORITY,
            )
            .await?;

        info!(ad_id = %created.id, owner_id = %created.owner_id, "Listing submitted for moderation");
        Ok(created)
    }

    /// Apply a review decision to a pending listing.
    ///
    /// Valid only from `pending`. Two reviewers racing on the same listing
    /// get exactly one success; the loser receives a `Conflict`.
    pub async fn review(
        &self,
        ad_id: &str,
        decision: ReviewDecision,
        reviewer_id: &str,
        reason: Option<&str>,
    ) -> Result<Ad> {
        let reviewer = self.db.get_user(reviewer_id).await?;
        if !reviewer.role.can_review() {
            return Err(EngineError::Authorization(format!(
                "User {reviewer_id} may not review listings"
            )));
        }

        let ad = self.db.get_ad(ad_id).await?;
        if ad.status != AdStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "Ad {ad_id} is {}, not pending",
                ad.status
            )));
        }

        let notice = render::decision_notice(&ad.title, decision, reason);
        let notice_id = Uuid::new_v4().to_string();

        match self
            .db
            .apply_review(ad_id, &ad.owner_id, reviewer_id, decision, reason, &notice_id, &notice)
            .await?
        {
            Some(updated) => {
                info!(ad_id, reviewer_id, decision = %decision, "Listing reviewed");
                Ok(updated)
            }
            None => Err(EngineError::Conflict(format!(
                "Ad {ad_id} was reviewed concurrently"
            ))),
        }
    }

    /// Owner takes an approved listing off the market.
    pub async fn withdraw(&self, ad_id: &str, owner_id: &str) -> Result<Ad> {
        let ad = self.db.get_ad(ad_id).await?;
        if ad.owner_id != owner_id {
            return Err(EngineError::Authorization(format!(
                "User {owner_id} does not own ad {ad_id}"
            )));
        }
        if ad.status != AdStatus::Approved {
            return Err(EngineError::InvalidState(format!(
                "Ad {ad_id} is {}, only approved listings can be withdrawn",
                ad.status
            )));
        }

        if self
            .db
            .update_ad_status(ad_id, AdStatus::Approved, AdStatus::Withdrawn)
            .await?
        {
            info!(ad_id, owner_id, "Listing withdrawn");
            Ok(self.db.get_ad(ad_id).await?)
        } else {
            Err(EngineError::Conflict(format!(
                "Ad {ad_id} changed state during withdrawal"
            )))
        }
    }

    /// Owner edit: rewrites searchable fields and sends the listing back
    /// through moderation with a fresh match cursor.
    pub async fn resubmit(&self, ad_id: &str, owner_id: &str, edit: AdEdit) -> Result<Ad> {
        let ad = self.db.get_ad(ad_id).await?;
        if ad.owner_id != owner_id {
            return Err(EngineError::Authorization(format!(
                "User {owner_id} does not own ad {ad_id}"
            )));
        }
        if !matches!(ad.status, AdStatus::Approved | AdStatus::Rejected) {
            return Err(EngineError::InvalidState(format!(
                "Ad {ad_id} is {}, only approved or rejected listings can be resubmitted",
                ad.status
            )));
        }

        let title = edit.title.unwrap_or_else(|| ad.title.clone());
        let description = edit.description.unwrap_or_else(|| ad.description.clone());
        let category_id = edit.category_id.unwrap_or_else(|| ad.category_id.clone());
        let price = edit.price.unwrap_or(ad.price);
        let location = edit.location.unwrap_or_else(|| ad.location.clone());

        self.validate_fields(&title, price)?;
        if category_id != ad.category_id {
            self.validate_category(&category_id).await?;
        }

        match self
            .db
            .apply_resubmit(
                ad_id,
                ad.status,
                &title,
                &description,
                &category_id,
                price,
                &location,
                DEFAULT_QUEUE_PRIORITY,
            )
            .await?
        {
            Some(updated) => {
                info!(ad_id, owner_id, "Listing resubmitted for moderation");
                Ok(updated)
            }
            None => Err(EngineError::Conflict(format!(
                "Ad {ad_id} changed state during resubmission"
            ))),
        }
    }

    fn validate_fields(&self, title: &str, price: f64) -> Result<()> {
        if title.trim().is_empty() {
            return Err(EngineError::Validation("Title must not be empty".into()));
        }
        if !price.is_finite() || price < self.policy.min_price || price > self.policy.max_price {
            return Err(EngineError::Validation(format!(
                "Price {price} is outside [{}, {}]",
                self.policy.min_price, self.policy.max_price
            )));
        }
        Ok(())
    }

    async fn validate_category(&self, category_id: &str) -> Result<()> {
        let category = match self.db.get_category(category_id).await {
            Ok(category) => category,
            Err(StorageError::NotFound(_)) => {
                return Err(EngineError::Validation(format!(
                    "Unknown category {category_id}"
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if category.is_active == 0 {
            return Err(EngineError::Validation(format!(
                "Category {category_id} is retired"
            )));
        }
        Ok(())
    }
}
