//! Data models for Rentboard engine storage.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AdStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl AdStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl std::fmt::Display for AdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal moderation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator for notification rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationKind {
    Match,
    Moderation,
}

/// Marketplace user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

impl UserRole {
    /// Whether this role may review pending listings.
    pub const fn can_review(self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub is_banned: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub is_active: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ad {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub price: f64,
    pub location: String,
    pub status: AdStatus,
    pub match_cursor: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchQuery {
    pub id: String,
    pub user_id: String,
    /// Space-joined normalized tokens; empty string is an open query.
    pub keywords: String,
    pub location_filter: Option<String>,
    pub category_filter: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub is_active: i64,
    pub last_matched_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub ad_id: String,
    pub query_id: Option<String>,
    pub kind: NotificationKind,
    pub content: String,
    pub is_read: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModerationDecision {
    pub id: i64,
    pub ad_id: String,
    pub reviewer_id: String,
    pub decision: ReviewDecision,
    pub reason: Option<String>,
    pub decided_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub ad_id: String,
    pub priority: i64,
    pub assigned_to: Option<String>,
    pub created_at: i64,
}

/// Snapshot of engine-wide counters, logged by the maintenance tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub users: i64,
    pub ads: i64,
    pub pending_ads: i64,
    pub approved_ads: i64,
    pub active_queries: i64,
    pub unread_notifications: i64,
}
