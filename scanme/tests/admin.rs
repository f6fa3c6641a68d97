//! Integration tests for the admin panels running in stores.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

mod common;

use chrono::{TimeZone, Utc};
use common::{admin, env_with, member};
use scanme::admin::{
    ActivationCodesAction, ActivationCodesReducer, ActivationCodesState, QuestsAction,
    QuestsReducer, QuestsState, ReviewQueueAction, ReviewQueueReducer, ReviewQueueState,
};
use scanme::mocks::MockScanMeApi;
use scanme::providers::ApiOperation;
use scanme::types::{UserId, VerificationId, VerificationRequest, VerificationStatus};
use scanme_runtime::Store;

fn pending(id: &str) -> VerificationRequest {
    VerificationRequest {
        id: VerificationId::new(id),
        user_id: UserId::new(format!("user-{id}")),
        display_name: id.to_string(),
        proof_url: format!("https://files.scanme.test/{id}.png"),
        status: VerificationStatus::Pending,
        submitted_at: Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn generate_then_delete_codes() {
    let api = MockScanMeApi::new();
    let store = Store::new(
        ActivationCodesState::default(),
        ActivationCodesReducer::new(),
        env_with(api.clone(), Some(admin("root"))),
    );

    store
        .send_cascading(ActivationCodesAction::GenerateBatch {
            count: 4,
            batch_label: "Spring".into(),
        })
        .await
        .unwrap()
        .wait()
        .await;

    let codes = store.state(|s| s.codes().to_vec()).await;
    assert_eq!(codes.len(), 4);
    assert_eq!(api.calls(ApiOperation::ListActivationCodes), 1);

    store
        .send_cascading(ActivationCodesAction::Delete {
            id: codes[0].id.clone(),
        })
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(store.state(|s| s.codes().len()).await, 3);
    assert_eq!(api.activation_codes().len(), 3);
}

#[tokio::test]
async fn oversized_batch_never_reaches_the_api() {
    let api = MockScanMeApi::new();
    let store = Store::new(
        ActivationCodesState::default(),
        ActivationCodesReducer::new(),
        env_with(api.clone(), Some(admin("root"))),
    );

    store
        .send(ActivationCodesAction::GenerateBatch {
            count: 101,
            batch_label: "Too many".into(),
        })
        .await
        .unwrap();

    assert!(store.state(|s| s.validation_error.is_some()).await);
    assert_eq!(api.calls(ApiOperation::GenerateActivationCodes), 0);
}

#[tokio::test]
async fn quest_delete_failure_keeps_local_removal() {
    let api = MockScanMeApi::new();
    let store = Store::new(
        QuestsState::default(),
        QuestsReducer::new(),
        env_with(api.clone(), Some(admin("root"))),
    );
    store
        .send_cascading(QuestsAction::Create {
            title: "Photo hunt".into(),
            prompt: "Snap someone in a red hat".into(),
            points: 5,
        })
        .await
        .unwrap()
        .wait()
        .await;
    let id = store.state(|s| s.quests()[0].id.clone()).await;

    api.fail(ApiOperation::DeleteQuest);
    store
        .send_cascading(QuestsAction::Delete { id })
        .await
        .unwrap()
        .wait()
        .await;

    let (listed, notified) = store
        .state(|s| (s.quests().len(), s.notification.is_some()))
        .await;
    assert_eq!(listed, 0);
    assert!(notified);
    assert_eq!(api.quests().len(), 1);
}

#[tokio::test]
async fn review_queue_removes_after_remote_review() {
    let api = MockScanMeApi::new().with_verification_requests(vec![pending("a"), pending("b")]);
    let store = Store::new(
        ReviewQueueState::default(),
        ReviewQueueReducer::new(),
        env_with(api.clone(), Some(admin("root"))),
    );
    store
        .send_cascading(ReviewQueueAction::Load)
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(store.state(|s| s.requests().len()).await, 2);

    store
        .send_cascading(ReviewQueueAction::Reject {
            id: VerificationId::new("a"),
            reason: "Document unreadable".into(),
        })
        .await
        .unwrap()
        .wait()
        .await;

    let remaining = store
        .state(|s| s.requests().iter().map(|r| r.id.to_string()).collect::<Vec<_>>())
        .await;
    assert_eq!(remaining, ["b"]);
    assert!(matches!(
        api.verification_requests()[0].status,
        VerificationStatus::Rejected { .. }
    ));
}

#[tokio::test]
async fn panels_refuse_non_admins() {
    let api = MockScanMeApi::new();
    let store = Store::new(
        ReviewQueueState::default(),
        ReviewQueueReducer::new(),
        env_with(api.clone(), Some(member("ada"))),
    );

    store.send(ReviewQueueAction::Load).await.unwrap();

    assert!(store.state(|s| s.notification.is_some()).await);
    assert_eq!(api.calls(ApiOperation::ListVerificationRequests), 0);
}
