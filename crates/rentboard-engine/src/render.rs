//! Notification body rendering.
//!
//! Bodies are rendered once, at insert time, so the delivery worker can hand
//! them to any transport without joining back to listings or searches.

use crate::storage::{Ad, ReviewDecision, SearchQuery};

/// Body for a saved-search match notification: listing preview plus the
/// criteria that matched.
pub fn match_notice(ad: &Ad, query: &SearchQuery) -> String {
    let mut text = format!(
        "New listing for your saved search: {} — {:.2}, {}",
        ad.title, ad.price, ad.location
    );

    let mut criteria = Vec::new();
    if !query.keywords.is_empty() {
        criteria.push(format!("keywords: {}", query.keywords));
    }
    if let Some(location) = &query.location_filter {
        criteria.push(format!("location: {location}"));
    }
    if let Some(min) = query.price_min {
        criteria.push(format!("price from: {min:.2}"));
    }
    if let Some(max) = query.price_max {
        criteria.push(format!("price to: {max:.2}"));
    }

    if !criteria.is_empty() {
        text.push_str(" (matched ");
        text.push_str(&criteria.join(", "));
        text.push(')');
    }

    text
}

/// Body for the owner's moderation-outcome notice.
pub fn decision_notice(ad_title: &str, decision: ReviewDecision, reason: Option<&str>) -> String {
    match decision {
        ReviewDecision::Approved => {
            format!("Your listing '{ad_title}' was approved and is now visible")
        }
        ReviewDecision::Rejected => match reason {
            Some(reason) => format!("Your listing '{ad_title}' was rejected: {reason}"),
            None => format!("Your listing '{ad_title}' was rejected"),
        },
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::AdStatus;

    fn sample_ad() -> Ad {
        Ad {
            id: "ad-1".into(),
            owner_id: "u-1".into(),
            title: "Bike".into(),
            description: "City bike".into(),
            category_id: "cat-1".into(),
            price: 100.0,
            location: "Moscow".into(),
            status: AdStatus::Approved,
            match_cursor: 1,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn sample_query() -> SearchQuery {
        SearchQuery {
            id: "q-1".into(),
            user_id: "u-2".into(),
            keywords: "bike".into(),
            location_filter: Some("Moscow".into()),
            category_filter: None,
            price_min: Some(50.0),
            price_max: Some(150.0),
            is_active: 1,
            last_matched_at: None,
            created_at: 0,
        }
    }

    #[test]
    fn match_notice_lists_criteria() {
        let text = match_notice(&sample_ad(), &sample_query());
        assert!(text.contains("Bike"));
        assert!(text.contains("keywords: bike"));
        assert!(text.contains("price from: 50.00"));
        assert!(text.contains("price to: 150.00"));
    }

    #[test]
    fn match_notice_open_query_has_no_criteria() {
        let query = SearchQuery {
            keywords: String::new(),
            location_filter: None,
            price_min: None,
            price_max: None,
            ..sample_query()
        };
        let text = match_notice(&sample_ad(), &query);
        assert!(!text.contains("matched"));
    }

    #[test]
    fn decision_notice_includes_rejection_reason() {
        let text = decision_notice("Bike", ReviewDecision::Rejected, Some("spam"));
        assert!(text.contains("rejected: spam"));

        let text = decision_notice("Bike", ReviewDecision::Approved, None);
        assert!(text.contains("approved"));
    }
}
