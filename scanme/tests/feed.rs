//! Integration and property tests for the feed.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{env_with, event, member, post};
use proptest::prelude::*;
use scanme::mocks::MockScanMeApi;
use scanme::providers::ApiOperation;
use scanme::types::RawTimestamp;
use scanme::{FeedAction, FeedReducer, FeedState, merge_feed};
use scanme_runtime::Store;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// A raw date: either a valid RFC 3339 instant or junk.
fn raw_date() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        (0i64..4_000_000_000).prop_map(|secs| {
            Some(Utc.timestamp_opt(secs, 0).unwrap().to_rfc3339())
        }),
        "[a-z ]{0,12}".prop_map(Some),
        Just(None),
    ]
}

proptest! {
    #[test]
    fn merged_feed_is_sorted_and_complete(
        post_dates in prop::collection::vec(raw_date(), 0..20),
        event_dates in prop::collection::vec(raw_date(), 0..20),
    ) {
        let posts: Vec<_> = post_dates
            .iter()
            .enumerate()
            .map(|(i, d)| post(&format!("p{i}"), d.as_deref()))
            .collect();
        let events: Vec<_> = event_dates
            .iter()
            .enumerate()
            .map(|(i, d)| event(&format!("e{i}"), d.as_deref()))
            .collect();

        let merged = merge_feed(&posts, &events, now());

        prop_assert_eq!(merged.len(), posts.len() + events.len());
        for pair in merged.windows(2) {
            prop_assert!(pair[0].sort_timestamp >= pair[1].sort_timestamp);
        }
        for entry in &merged {
            let parsed = match entry.item.raw_date() {
                Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(text).ok(),
                _ => None,
            };
            if parsed.is_none() {
                prop_assert_eq!(entry.sort_timestamp, now());
            }
        }
    }
}

#[tokio::test]
async fn load_merges_both_collections() {
    let api = MockScanMeApi::new()
        .with_posts(vec![
            post("old", Some("2024-12-01T10:00:00Z")),
            post("broken", Some("not a date")),
        ])
        .with_events(vec![event("soon", Some("2025-02-15T18:30"))]);
    let store = Store::new(
        FeedState::default(),
        FeedReducer::new(),
        env_with(api, Some(member("ada"))),
    );

    store
        .send_cascading(FeedAction::Load)
        .await
        .unwrap()
        .wait()
        .await;

    let keys = store
        .state(|s| s.entries().iter().map(|e| e.item.key()).collect::<Vec<_>>())
        .await;
    assert_eq!(keys, ["post:broken", "event:soon", "post:old"]);
}

#[tokio::test]
async fn one_failing_source_keeps_the_other() {
    let api = MockScanMeApi::new()
        .with_posts(vec![post("p1", Some("2025-01-10T00:00:00Z"))])
        .with_events(vec![event("e1", Some("2025-01-11"))]);
    api.fail(ApiOperation::ListEvents);
    let store = Store::new(
        FeedState::default(),
        FeedReducer::new(),
        env_with(api, Some(member("ada"))),
    );

    store
        .send_cascading(FeedAction::Load)
        .await
        .unwrap()
        .wait()
        .await;

    let (entries, notified, loading) = store
        .state(|s| (s.entries().len(), s.notification.is_some(), s.is_loading()))
        .await;
    assert_eq!(entries, 1);
    assert!(notified);
    assert!(!loading);
}

#[tokio::test]
async fn unrelated_actions_do_not_rederive_the_timeline() {
    let api = MockScanMeApi::new().with_posts(vec![post("p1", None)]);
    let store = Store::new(
        FeedState::default(),
        FeedReducer::new(),
        env_with(api, Some(member("ada"))),
    );
    store
        .send_cascading(FeedAction::Load)
        .await
        .unwrap()
        .wait()
        .await;
    let merges = store.state(FeedState::merge_count).await;

    store.send(FeedAction::DismissNotification).await.unwrap();
    store
        .send(FeedAction::ItemRenderFailed {
            key: "post:p1".into(),
            message: "bad video".into(),
        })
        .await
        .unwrap();

    assert_eq!(store.state(FeedState::merge_count).await, merges);
    assert!(store.state(|s| s.boundary_error.is_some()).await);

    store
        .send_cascading(FeedAction::Reload)
        .await
        .unwrap()
        .wait()
        .await;
    assert!(store.state(|s| s.boundary_error.is_none()).await);
}
