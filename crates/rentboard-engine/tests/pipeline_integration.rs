#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! End-to-end pipeline tests: submit, review, match tick, delivery.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rentboard_core::config::{DeliveryConfig, ModerationConfig, RetentionConfig, SchedulerConfig};
use rentboard_engine::delivery::{DeliveryError, DeliverySink, DeliveryWorker};
use rentboard_engine::moderation::{ModerationService, NewAd};
use rentboard_engine::saved_search::{SavedSearchService, SearchCriteria};
use rentboard_engine::scheduler::{Scheduler, TickOutcome};
use rentboard_engine::storage::{AdStatus, Database, ReviewDecision, UserRole};

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

struct Pipeline {
    db: Database,
    moderation: ModerationService,
    searches: SavedSearchService,
    scheduler: Scheduler,
    worker: DeliveryWorker,
    sink: Arc<RecordingSink>,
}

async fn pipeline() -> Pipeline {
    let db = Database::open_in_memory().await.unwrap();
    db.create_user("owner-1", "anton", UserRole::User).await.unwrap();
    db.create_user("mod-1", "mod", UserRole::Moderator).await.unwrap();
    db.create_user("seeker-1", "boris", UserRole::User).await.unwrap();
    db.create_category("cat-1", "Bikes").await.unwrap();

    let sink = Arc::new(RecordingSink::default());
    let delivery_config = DeliveryConfig {
        sweep_interval_secs: 1,
        throttle_ms: 0,
        batch_size: 50,
    };

    Pipeline {
        moderation: ModerationService::new(db.clone(), ModerationConfig::default()),
        searches: SavedSearchService::new(db.clone()),
        scheduler: Scheduler::new(
            db.clone(),
            SchedulerConfig::default(),
            RetentionConfig::default(),
            "it-instance",
        ),
        worker: DeliveryWorker::new(db.clone(), Arc::clone(&sink) as _, delivery_config),
        sink,
        db,
    }
}

fn bike_ad() -> NewAd {
    NewAd {
        owner_id: "owner-1".into(),
        title: "bike".into(),
        description: "City bike, good condition".into(),
        category_id: "cat-1".into(),
        price: 100.0,
        location: "Moscow".into(),
    }
}

fn bike_search() -> SearchCriteria {
    SearchCriteria {
        keywords: "bike".into(),
        location_filter: Some("Moscow".into()),
        price_min: Some(50.0),
        price_max: Some(150.0),
        ..SearchCriteria::default()
    }
}

#[tokio::test]
async fn approved_ad_reaches_the_seeker() {
    let p = pipeline().await;
    p.searches.create("seeker-1", bike_search()).await.unwrap();
    let ad = p.moderation.submit(bike_ad()).await.unwrap();

    // Pending: invisible to the match tick.
    let outcome = p.scheduler.run_match_tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Completed {
            scanned_to: 0,
            created: 0
        }
    );

    p.moderation
        .review(&ad.id, ReviewDecision::Approved, "mod-1", None)
        .await
        .unwrap();

    let outcome = p.scheduler.run_match_tick().await.unwrap();
    let TickOutcome::Completed { created, .. } = outcome else {
        panic!("tick was skipped");
    };
    assert_eq!(created, 1);

    // Delivery: the seeker's match plus the owner's moderation notice.
    let sent = p.worker.run_once().await.unwrap();
    assert_eq!(sent, 2);

    let messages = p.sink.sent.lock().unwrap().clone();
    let seeker_messages: Vec<_> = messages.iter().filter(|(u, _)| u == "seeker-1").collect();
    assert_eq!(seeker_messages.len(), 1);
    assert!(seeker_messages[0].1.contains("bike"));

    let owner_messages: Vec<_> = messages.iter().filter(|(u, _)| u == "owner-1").collect();
    assert_eq!(owner_messages.len(), 1);
    assert!(owner_messages[0].1.contains("approved"));
}

#[tokio::test]
async fn replayed_window_never_notifies_twice() {
    let p = pipeline().await;
    p.searches.create("seeker-1", bike_search()).await.unwrap();
    let ad = p.moderation.submit(bike_ad()).await.unwrap();
    p.moderation
        .review(&ad.id, ReviewDecision::Approved, "mod-1", None)
        .await
        .unwrap();

    p.scheduler.run_match_tick().await.unwrap();

    // Crash between dispatch and watermark advance: the next run sees the
    // old watermark and replays the window.
    p.db.set_watermark(0).await.unwrap();
    let outcome = p.scheduler.run_match_tick().await.unwrap();
    let TickOutcome::Completed { created, .. } = outcome else {
        panic!("tick was skipped");
    };
    assert_eq!(created, 0);

    assert_eq!(
        p.db.list_unread_notifications_for_user("seeker-1", 10)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn withdrawn_ad_stops_matching_new_queries() {
    let p = pipeline().await;
    let ad = p.moderation.submit(bike_ad()).await.unwrap();
    p.moderation
        .review(&ad.id, ReviewDecision::Approved, "mod-1", None)
        .await
        .unwrap();
    p.moderation.withdraw(&ad.id, "owner-1").await.unwrap();

    p.searches.create("seeker-1", bike_search()).await.unwrap();
    let outcome = p.scheduler.run_match_tick().await.unwrap();
    let TickOutcome::Completed { created, .. } = outcome else {
        panic!("tick was skipped");
    };
    assert_eq!(created, 0);
    assert!(
        p.db.list_unread_notifications_for_user("seeker-1", 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn resubmitted_ad_is_rescanned_after_reapproval() {
    let p = pipeline().await;
    p.searches.create("seeker-1", bike_search()).await.unwrap();

    let ad = p.moderation.submit(bike_ad()).await.unwrap();
    p.moderation
        .review(&ad.id, ReviewDecision::Rejected, "mod-1", Some("no photos"))
        .await
        .unwrap();
    p.scheduler.run_match_tick().await.unwrap();
    assert!(
        p.db.list_unread_notifications_for_user("seeker-1", 10)
            .await
            .unwrap()
            .is_empty()
    );

    let edited = p
        .moderation
        .resubmit(&ad.id, "owner-1", rentboard_engine::moderation::AdEdit::default())
        .await
        .unwrap();
    assert_eq!(edited.status, AdStatus::Pending);

    p.moderation
        .review(&ad.id, ReviewDecision::Approved, "mod-1", None)
        .await
        .unwrap();
    let outcome = p.scheduler.run_match_tick().await.unwrap();
    let TickOutcome::Completed { created, .. } = outcome else {
        panic!("tick was skipped");
    };
    assert_eq!(created, 1);
}

#[tokio::test]
async fn open_query_sees_everything_once() {
    let p = pipeline().await;
    p.searches
        .create("seeker-1", SearchCriteria::default())
        .await
        .unwrap();

    for _ in 0..3 {
        let ad = p.moderation.submit(bike_ad()).await.unwrap();
        p.moderation
            .review(&ad.id, ReviewDecision::Approved, "mod-1", None)
            .await
            .unwrap();
    }

    let outcome = p.scheduler.run_match_tick().await.unwrap();
    let TickOutcome::Completed { created, .. } = outcome else {
        panic!("tick was skipped");
    };
    assert_eq!(created, 3);

    // A second tick past the watermark adds nothing.
    let outcome = p.scheduler.run_match_tick().await.unwrap();
    let TickOutcome::Completed { created, .. } = outcome else {
        panic!("tick was skipped");
    };
    assert_eq!(created, 0);
}
