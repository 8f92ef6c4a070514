//! SQLite storage for the Rentboard engine.
//!
//! Provides persistence for users, categories, ads, saved searches,
//! notifications, moderation records, and the scheduler's durable state
//! (watermark, cursor counter, leases).

mod db;
mod models;
mod queries_ads;
mod queries_categories;
mod queries_moderation;
mod queries_notifications;
mod queries_search;
mod queries_state;
mod queries_users;

pub use db::{Database, StorageError, unix_timestamp};
pub use models::*;
