//! Integration tests for the check-in wall running in a store.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

mod common;

use common::{WAIT, env_with, member, record};
use scanme::mocks::MockScanMeApi;
use scanme::providers::{ApiOperation, SharedIdentity};
use scanme::{
    CheckInStatus, EventId, PresenceAction, PresenceReducer, PresenceState, Visibility, WallTab,
};
use scanme_runtime::Store;
use std::time::Duration;

type PresenceStore = Store<
    PresenceState,
    PresenceAction,
    common::TestEnv,
    PresenceReducer<MockScanMeApi, SharedIdentity>,
>;

fn store(api: MockScanMeApi, viewer: &str) -> PresenceStore {
    Store::new(
        PresenceState::default(),
        PresenceReducer::new(),
        env_with(api, Some(member(viewer))),
    )
}

fn is_loaded(action: &PresenceAction) -> bool {
    matches!(action, PresenceAction::CheckInsLoaded { .. })
}

fn is_saved(action: &PresenceAction) -> bool {
    matches!(action, PresenceAction::CheckInSaved { .. })
}

async fn start(store: &PresenceStore, event: &EventId) {
    store
        .send_and_wait_for(
            PresenceAction::Start {
                event_id: event.clone(),
            },
            is_loaded,
            WAIT,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn polling_replaces_the_list_wholesale() {
    let event = EventId::new("gig");
    let api = MockScanMeApi::new().with_check_ins(
        &event,
        vec![record("bea", CheckInStatus::Here, Visibility::Public, 100)],
    );
    let store = store(api.clone(), "ada");
    start(&store, &event).await;
    assert_eq!(store.state(|s| s.check_ins().len()).await, 1);

    let _ = api.clone().with_check_ins(
        &event,
        vec![
            record("cal", CheckInStatus::Going, Visibility::Public, 300),
            record("dee", CheckInStatus::Here, Visibility::Public, 200),
        ],
    );

    tokio::time::timeout(WAIT, async {
        loop {
            let users = store
                .state(|s| {
                    s.check_ins()
                        .iter()
                        .map(|c| c.user_id.to_string())
                        .collect::<Vec<_>>()
                })
                .await;
            if users == ["cal", "dee"] {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    store.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn stop_ends_polling() {
    let event = EventId::new("gig");
    let api = MockScanMeApi::new();
    let store = store(api.clone(), "ada");
    start(&store, &event).await;

    store.send(PresenceAction::Stop).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let calls = api.calls(ApiOperation::ListCheckIns);
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(api.calls(ApiOperation::ListCheckIns), calls);
    assert!(!store.state(PresenceState::is_polling).await);
    store.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn anonymous_records_are_counted_but_hidden() {
    let event = EventId::new("gig");
    let api = MockScanMeApi::new().with_check_ins(
        &event,
        vec![
            record("bea", CheckInStatus::Here, Visibility::Public, 100),
            record("ghost", CheckInStatus::Here, Visibility::Anonymous, 200),
            record("cal", CheckInStatus::Going, Visibility::FriendsOnly, 300),
        ],
    );
    let store = store(api, "ada");
    start(&store, &event).await;

    let (here, going, here_tab) = store
        .state(|s| (s.here_count(), s.going_count(), s.visible_check_ins().len()))
        .await;
    assert_eq!(here, 2);
    assert_eq!(going, 1);
    assert_eq!(here_tab, 1);

    store
        .send(PresenceAction::SelectTab(WallTab::Everyone))
        .await
        .unwrap();
    let everyone = store.state(|s| s.visible_check_ins().len()).await;
    assert_eq!(everyone, 2);

    store.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn recheck_in_upserts_single_record() {
    let event = EventId::new("gig");
    let api = MockScanMeApi::new();
    let store = store(api.clone(), "ada");
    start(&store, &event).await;

    store
        .send_and_wait_for(PresenceAction::MarkGoing, is_saved, WAIT)
        .await
        .unwrap();
    assert_eq!(
        store.state(PresenceState::own_status).await,
        Some(CheckInStatus::Going)
    );

    store
        .send_and_wait_for(
            PresenceAction::CheckInHere {
                icebreaker: Some("  Ask me about jazz  ".into()),
                visibility: Visibility::Public,
                tags: vec!["jazz".into()],
            },
            is_saved,
            WAIT,
        )
        .await
        .unwrap();

    let records = api.check_ins(&event);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, CheckInStatus::Here);
    assert_eq!(records[0].icebreaker.as_deref(), Some("Ask me about jazz"));
    assert_eq!(
        store.state(PresenceState::own_status).await,
        Some(CheckInStatus::Here)
    );

    store.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn failed_check_out_is_reconciled_by_next_poll() {
    let event = EventId::new("gig");
    let api = MockScanMeApi::new().with_check_ins(
        &event,
        vec![record("ada", CheckInStatus::Here, Visibility::Public, 100)],
    );
    api.fail(ApiOperation::RemoveCheckIn);
    let store = store(api.clone(), "ada");
    start(&store, &event).await;
    assert!(store.state(PresenceState::own_status).await.is_some());

    store
        .send_and_wait_for(
            PresenceAction::CheckOut,
            |a| matches!(a, PresenceAction::CheckOutFailed { .. }),
            WAIT,
        )
        .await
        .unwrap();
    assert!(store.state(|s| s.notification.is_some()).await);

    tokio::time::timeout(WAIT, async {
        while store.state(PresenceState::own_status).await != Some(CheckInStatus::Here) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    store.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn shutdown_cancels_the_poll_timer() {
    let event = EventId::new("gig");
    let api = MockScanMeApi::new();
    let store = store(api.clone(), "ada");
    start(&store, &event).await;

    store.shutdown(WAIT).await.unwrap();
    let calls = api.calls(ApiOperation::ListCheckIns);
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(api.calls(ApiOperation::ListCheckIns), calls);
    assert_eq!(store.pending_effects(), 0);
}

#[tokio::test]
async fn check_in_then_check_out_leaves_no_record() {
    let event = EventId::new("gig");
    let api = MockScanMeApi::new();
    let store = store(api.clone(), "ada");
    start(&store, &event).await;

    store
        .send_and_wait_for(
            PresenceAction::CheckInHere {
                icebreaker: Some("Say hi".into()),
                visibility: Visibility::Public,
                tags: vec!["jazz".into()],
            },
            is_saved,
            WAIT,
        )
        .await
        .unwrap();
    assert_eq!(api.check_ins(&event).len(), 1);

    store
        .send_and_wait_for(
            PresenceAction::CheckOut,
            |a| matches!(a, PresenceAction::CheckOutConfirmed { .. }),
            WAIT,
        )
        .await
        .unwrap();

    assert!(
        api.check_ins(&event)
            .iter()
            .all(|r| r.user_id.as_str() != "ada")
    );
    tokio::time::timeout(WAIT, async {
        while store.state(PresenceState::own_status).await.is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(api.calls(ApiOperation::RemoveCheckIn), 1);

    store.shutdown(WAIT).await.unwrap();
}
