//! ScanMe Demo
//!
//! Drives every screen once against the in-memory API and logs what each
//! screen would render.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin demo
//!
//! # With Prometheus metrics rendered at the end
//! SCANME_METRICS_ADDR=127.0.0.1:9090 cargo run --bin demo
//! ```

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use scanme::admin::{ActivationCodesAction, QuestsAction, ReviewQueueAction};
use scanme::missions::MissionsAction;
use scanme::mocks::MockScanMeApi;
use scanme::types::{
    CheckInRecord, Event, Friend, IcebreakerQuest, Post, PostId, ProofSubmission, QuestId,
    RawTimestamp, Scan, VerificationId, VerificationRequest, VerificationStatus,
};
use scanme::veteran::VeteranAction;
use scanme::{
    CheckInStatus, EventId, FeedAction, Identity, PresenceAction, PresenceState,
    PurchaseAction, QrPayload, ScanMeApp, ScanMeConfig, ScanMeEnvironment, SharedIdentity,
    UserId, Visibility, can_access_hub,
};
use scanme_runtime::metrics::MetricsServer;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

fn seeded_api(me: &Identity) -> MockScanMeApi {
    let now = Utc::now();
    let launch = EventId::new("launch-party");

    let posts = (1..=3)
        .map(|i| Post {
            id: PostId::new(format!("post-{i}")),
            author_id: UserId::new("creator"),
            author_name: "Creator".to_string(),
            caption: format!("Clip #{i}"),
            video_url: Some(format!("https://cdn.scanme.app/clips/{i}.mp4")),
            created_at: Some(RawTimestamp::Text((now - ChronoDuration::hours(i)).to_rfc3339())),
        })
        .chain(std::iter::once(Post {
            id: PostId::new("post-undated"),
            author_id: UserId::new("creator"),
            author_name: "Creator".to_string(),
            caption: "No date on this one".to_string(),
            video_url: None,
            created_at: Some(RawTimestamp::Text("sometime last week".to_string())),
        }))
        .collect();

    let events = vec![
        Event {
            id: launch.clone(),
            title: "Launch Party".to_string(),
            venue: "Warehouse 9".to_string(),
            starts_at: Some(RawTimestamp::Text(
                (now + ChronoDuration::days(2))
                    .format("%Y-%m-%dT%H:%M")
                    .to_string(),
            )),
            price_cents: 1500,
            image_url: None,
        },
        Event {
            id: EventId::new("rooftop"),
            title: "Rooftop Mixer".to_string(),
            venue: "Skyline".to_string(),
            starts_at: Some(RawTimestamp::PrefixedEpoch {
                seconds: (now - ChronoDuration::days(1)).timestamp(),
                nanoseconds: 0,
            }),
            price_cents: 0,
            image_url: None,
        },
    ];

    let check_ins = vec![
        CheckInRecord {
            user_id: UserId::new("bea"),
            display_name: "Bea".to_string(),
            avatar_url: None,
            status: CheckInStatus::Here,
            icebreaker: Some("Ask me about synths".to_string()),
            visibility: Visibility::Public,
            tags: vec!["music".to_string()],
            timestamp: Some(RawTimestamp::Epoch {
                seconds: now.timestamp() - 600,
                nanoseconds: 0,
            }),
        },
        CheckInRecord {
            user_id: UserId::new("ghost"),
            display_name: "Ghost".to_string(),
            avatar_url: None,
            status: CheckInStatus::Here,
            icebreaker: None,
            visibility: Visibility::Anonymous,
            tags: Vec::new(),
            timestamp: Some(RawTimestamp::Text((now - ChronoDuration::minutes(5)).to_rfc3339())),
        },
    ];

    let quests = vec![IcebreakerQuest {
        id: QuestId::new("q-karaoke"),
        title: "Karaoke".to_string(),
        prompt: "Find someone who knows every word".to_string(),
        points: 15,
        active: true,
    }];

    let pending = vec![VerificationRequest {
        id: VerificationId::new("vr-1"),
        user_id: UserId::new("sam"),
        display_name: "Sam".to_string(),
        proof_url: "https://files.scanme.app/proofs/sam.pdf".to_string(),
        status: VerificationStatus::Pending,
        submitted_at: now - ChronoDuration::hours(3),
    }];

    let friends = ["Bea", "Cal", "Dee", "Eli", "Fay", "Gus"]
        .iter()
        .map(|name| Friend {
            user_id: UserId::new(name.to_lowercase()),
            display_name: (*name).to_string(),
            tags: if *name == "Bea" {
                vec!["music".to_string()]
            } else {
                Vec::new()
            },
        })
        .collect();

    let scans = vec![
        Scan {
            id: "s1".to_string(),
            name: "Booth 4".to_string(),
            tag: Some("booth".to_string()),
            scanned_at: now - ChronoDuration::hours(1),
        },
        Scan {
            id: "s2".to_string(),
            name: "Bea".to_string(),
            tag: Some("person".to_string()),
            scanned_at: now,
        },
    ];

    MockScanMeApi::new()
        .with_posts(posts)
        .with_events(events)
        .with_check_ins(&launch, check_ins)
        .with_quests(quests)
        .with_verification_requests(pending)
        .with_friends(&me.user_id, friends)
        .with_scans(&me.user_id, scans)
        .with_submitter(&me.user_id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scanme=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ScanMeConfig::from_env();
    let mut metrics = config.metrics_addr.map(MetricsServer::new);
    if let Some(server) = metrics.as_mut() {
        server.start().context("starting metrics recorder")?;
    }

    let me = Identity {
        user_id: UserId::new("demo"),
        display_name: "Demo User".to_string(),
        avatar_url: None,
        is_admin: true,
        is_veteran: false,
    };
    let api = seeded_api(&me);
    let env = ScanMeEnvironment::new(api, SharedIdentity::signed_in(me.clone()), config);
    let app = ScanMeApp::init(env);

    // Feed
    app.feed.send_cascading(FeedAction::Load).await?.wait().await;
    let keys = app
        .feed
        .state(|s| s.entries().iter().map(|e| e.item.key()).collect::<Vec<_>>())
        .await;
    tracing::info!(?keys, "Feed");

    // Check-in wall
    let launch = EventId::new("launch-party");
    app.presence
        .send_and_wait_for(
            PresenceAction::Start {
                event_id: launch.clone(),
            },
            |a| matches!(a, PresenceAction::CheckInsLoaded { .. }),
            STEP_TIMEOUT,
        )
        .await?;
    app.presence
        .send_and_wait_for(
            PresenceAction::CheckInHere {
                icebreaker: Some("First time here!".to_string()),
                visibility: Visibility::Public,
                tags: vec!["music".to_string(), "design".to_string()],
            },
            |a| matches!(a, PresenceAction::CheckInsLoaded { .. }),
            STEP_TIMEOUT,
        )
        .await?;
    let (here, visible) = app
        .presence
        .state(|s: &PresenceState| (s.here_count(), s.visible_check_ins().len()))
        .await;
    tracing::info!(here, visible, "Check-in wall");

    // Purchase
    let event = app
        .feed
        .state(|s| s.events().iter().find(|e| e.id == launch).cloned())
        .await
        .context("launch event missing from feed")?;
    app.purchase
        .send_and_wait_for(
            PurchaseAction::Open { event },
            |a| matches!(a, PurchaseAction::PublishableKeyLoaded { .. }),
            STEP_TIMEOUT,
        )
        .await?;
    app.purchase
        .send(PurchaseAction::SetQuantity { quantity: 2 })
        .await?;
    let created = app
        .purchase
        .send_and_wait_for(
            PurchaseAction::ProceedToPayment,
            |a| {
                matches!(
                    a,
                    PurchaseAction::PaymentIntentCreated { .. }
                        | PurchaseAction::PaymentIntentFailed { .. }
                )
            },
            STEP_TIMEOUT,
        )
        .await?;
    if let PurchaseAction::PaymentIntentCreated { intent, .. } = created {
        app.purchase
            .send_and_wait_for(
                PurchaseAction::PaymentSucceeded {
                    payment_intent_id: intent.id,
                },
                |a| {
                    matches!(
                        a,
                        PurchaseAction::PurchaseConfirmed { .. }
                            | PurchaseAction::FulfillmentFailed { .. }
                    )
                },
                STEP_TIMEOUT,
            )
            .await?;
    }
    let payloads = app
        .purchase
        .state(|s| {
            s.tickets
                .iter()
                .map(|t| QrPayload::for_ticket(t).to_string())
                .collect::<Vec<_>>()
        })
        .await;
    tracing::info!(?payloads, "Tickets");
    app.purchase.send(PurchaseAction::Close).await?;

    // Admin panels
    app.activation_codes
        .send_cascading(ActivationCodesAction::GenerateBatch {
            count: 3,
            batch_label: "Launch VIP".to_string(),
        })
        .await?
        .wait()
        .await;
    let codes = app.activation_codes.state(|s| s.codes().len()).await;
    tracing::info!(codes, "Activation codes");

    app.quests
        .send_cascading(QuestsAction::Create {
            title: "Two truths".to_string(),
            prompt: "Guess which one is the lie".to_string(),
            points: 10,
        })
        .await?
        .wait()
        .await;
    let quests = app.quests.state(|s| s.quests().len()).await;
    tracing::info!(quests, "Quests");

    app.review_queue
        .send_cascading(ReviewQueueAction::Load)
        .await?
        .wait()
        .await;
    let first = app
        .review_queue
        .state(|s| s.requests().first().map(|r| r.id.clone()))
        .await;
    if let Some(id) = first {
        app.review_queue
            .send_cascading(ReviewQueueAction::Approve { id })
            .await?
            .wait()
            .await;
    }
    let pending = app.review_queue.state(|s| s.requests().len()).await;
    tracing::info!(pending, "Review queue");

    // Missions
    app.missions
        .send_cascading(MissionsAction::Load)
        .await?
        .wait()
        .await;
    for progress in app.missions.state(scanme::missions::MissionsState::progress).await {
        tracing::info!(
            mission = progress.mission_id,
            current = progress.current,
            target = progress.target,
            done = progress.is_completed,
            "Mission"
        );
    }

    // Veteran hub
    tracing::info!(open = can_access_hub(&me), "Veteran hub access");
    app.veteran
        .send_cascading(VeteranAction::SubmitProof {
            proof: ProofSubmission {
                file_name: "service-record.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size_bytes: 240_000,
                proof_url: "https://files.scanme.app/proofs/demo.pdf".to_string(),
            },
        })
        .await?
        .wait()
        .await;
    let submitted = app.veteran.state(scanme::veteran::VeteranState::is_pending).await;
    tracing::info!(submitted, "Veteran proof");

    app.dispose().await?;

    if let Some(rendered) = metrics.as_ref().and_then(MetricsServer::render) {
        println!("{rendered}");
    }
    Ok(())
}
