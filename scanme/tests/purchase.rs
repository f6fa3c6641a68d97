//! Integration tests for the purchase dialog running in a store.

#![allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/panic

mod common;

use common::{WAIT, env_with, event, member};
use scanme::mocks::MockScanMeApi;
use scanme::providers::{ApiOperation, SharedIdentity};
use scanme::types::QrPayload;
use scanme::{NotificationKind, PurchaseAction, PurchaseReducer, PurchaseState, PurchaseStep};
use scanme_runtime::Store;

type PurchaseStore = Store<
    PurchaseState,
    PurchaseAction,
    common::TestEnv,
    PurchaseReducer<MockScanMeApi, SharedIdentity>,
>;

fn store(api: MockScanMeApi) -> PurchaseStore {
    Store::new(
        PurchaseState::default(),
        PurchaseReducer::new(),
        env_with(api, Some(member("ada"))),
    )
}

async fn open(store: &PurchaseStore) {
    store
        .send_and_wait_for(
            PurchaseAction::Open {
                event: event("gig", Some("2025-06-01T20:00:00Z")),
            },
            |a| matches!(a, PurchaseAction::PublishableKeyLoaded { .. }),
            WAIT,
        )
        .await
        .unwrap();
}

async fn proceed(store: &PurchaseStore) -> PurchaseAction {
    store
        .send_and_wait_for(
            PurchaseAction::ProceedToPayment,
            |a| {
                matches!(
                    a,
                    PurchaseAction::PaymentIntentCreated { .. }
                        | PurchaseAction::PaymentIntentFailed { .. }
                )
            },
            WAIT,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn full_purchase_issues_tickets() {
    let api = MockScanMeApi::new().with_events(vec![event("gig", Some("2025-06-01T20:00:00Z"))]);
    let store = store(api.clone());
    open(&store).await;

    store
        .send(PurchaseAction::SetQuantity { quantity: 3 })
        .await
        .unwrap();
    assert_eq!(store.state(PurchaseState::total_cents).await, 3600);

    let PurchaseAction::PaymentIntentCreated { intent, .. } = proceed(&store).await else {
        panic!("intent creation failed");
    };
    assert_eq!(store.state(|s| s.step).await, PurchaseStep::Payment);
    assert_eq!(
        store.state(|s| s.client_secret().map(str::to_string)).await,
        Some(intent.client_secret.clone())
    );

    store
        .send_and_wait_for(
            PurchaseAction::PaymentSucceeded {
                payment_intent_id: intent.id,
            },
            |a| matches!(a, PurchaseAction::PurchaseConfirmed { .. }),
            WAIT,
        )
        .await
        .unwrap();

    let tickets = store.state(|s| s.tickets.clone()).await;
    assert_eq!(tickets.len(), 3);
    assert_eq!(api.issued_tickets().len(), 3);

    let payload = QrPayload::for_ticket(&tickets[0]);
    assert_eq!(payload, QrPayload::for_ticket(&tickets[0]));
    assert!(payload.as_str().contains(&tickets[0].code));
}

#[tokio::test]
async fn failed_intent_stays_on_quantity_selection() {
    let api = MockScanMeApi::new();
    api.fail(ApiOperation::CreatePaymentIntent);
    let store = store(api);
    open(&store).await;
    store
        .send(PurchaseAction::SetQuantity { quantity: 4 })
        .await
        .unwrap();

    let outcome = proceed(&store).await;
    assert!(matches!(outcome, PurchaseAction::PaymentIntentFailed { .. }));

    let (step, quantity, kind) = store
        .state(|s| (s.step, s.quantity, s.notification.as_ref().map(|n| n.kind)))
        .await;
    assert_eq!(step, PurchaseStep::QuantitySelection);
    assert_eq!(quantity, 4);
    assert_eq!(kind, Some(NotificationKind::Error));
}

#[tokio::test]
async fn fulfillment_failure_after_payment_asks_for_support() {
    let api = MockScanMeApi::new();
    api.fail(ApiOperation::ConfirmTicketPurchase);
    let store = store(api.clone());
    open(&store).await;

    let PurchaseAction::PaymentIntentCreated { intent, .. } = proceed(&store).await else {
        panic!("intent creation failed");
    };
    store
        .send_and_wait_for(
            PurchaseAction::PaymentSucceeded {
                payment_intent_id: intent.id,
            },
            |a| matches!(a, PurchaseAction::FulfillmentFailed { .. }),
            WAIT,
        )
        .await
        .unwrap();

    let notification = store.state(|s| s.notification.clone()).await.unwrap();
    assert_eq!(notification.kind, NotificationKind::SupportRequired);
    assert!(notification.message.contains("help@scanme.test"));
    assert!(api.issued_tickets().is_empty());
    assert_eq!(api.calls(ApiOperation::ConfirmTicketPurchase), 1);
}

#[tokio::test]
async fn close_resets_the_dialog() {
    let store = store(MockScanMeApi::new());
    open(&store).await;
    store
        .send(PurchaseAction::SetQuantity { quantity: 2 })
        .await
        .unwrap();
    proceed(&store).await;

    store.send(PurchaseAction::Close).await.unwrap();

    let (step, quantity, secret) = store
        .state(|s| (s.step, s.quantity, s.client_secret().map(str::to_string)))
        .await;
    assert_eq!(step, PurchaseStep::QuantitySelection);
    assert_eq!(quantity, 1);
    assert_eq!(secret, None);
}

#[tokio::test]
async fn payment_captured_after_close_still_issues_tickets() {
    let api = MockScanMeApi::new().with_events(vec![event("gig", Some("2025-06-01T20:00:00Z"))]);
    let store = store(api.clone());
    open(&store).await;
    store
        .send(PurchaseAction::SetQuantity { quantity: 2 })
        .await
        .unwrap();

    let PurchaseAction::PaymentIntentCreated { intent, .. } = proceed(&store).await else {
        panic!("intent creation failed");
    };
    store.send(PurchaseAction::Close).await.unwrap();

    store
        .send_and_wait_for(
            PurchaseAction::PaymentSucceeded {
                payment_intent_id: intent.id,
            },
            |a| matches!(a, PurchaseAction::PurchaseConfirmed { .. }),
            WAIT,
        )
        .await
        .unwrap();

    assert_eq!(api.calls(ApiOperation::ConfirmTicketPurchase), 1);
    assert_eq!(api.issued_tickets().len(), 2);
    let (tickets, kind) = store
        .state(|s| (s.tickets.len(), s.notification.as_ref().map(|n| n.kind)))
        .await;
    assert_eq!(tickets, 2);
    assert_eq!(kind, Some(NotificationKind::Info));
}
