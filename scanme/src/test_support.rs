//! Fixtures shared by the unit tests.

use crate::config::ScanMeConfig;
use crate::environment::ScanMeEnvironment;
use crate::mocks::MockScanMeApi;
use crate::providers::SharedIdentity;
use crate::types::{
    CheckInRecord, CheckInStatus, Event, EventId, Identity, Post, PostId, RawTimestamp, UserId,
    Visibility,
};
use scanme_testing::test_clock;
use std::sync::Arc;
use std::time::Duration;

pub fn test_env(
    api: MockScanMeApi,
    identity: Option<Identity>,
) -> ScanMeEnvironment<MockScanMeApi, SharedIdentity> {
    let identity = identity.map_or_else(SharedIdentity::new, SharedIdentity::signed_in);
    let config = ScanMeConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_support_contact("support@scanme.app");

    ScanMeEnvironment::new(api, identity, config).with_clock(Arc::new(test_clock()))
}

pub fn user(id: &str) -> Identity {
    Identity {
        user_id: UserId::new(id),
        display_name: id.to_uppercase(),
        avatar_url: None,
        is_admin: false,
        is_veteran: false,
    }
}

pub fn admin(id: &str) -> Identity {
    Identity {
        is_admin: true,
        ..user(id)
    }
}

pub fn post(id: &str, created_at: Option<&str>) -> Post {
    Post {
        id: PostId::new(id),
        author_id: UserId::new("author"),
        author_name: "Author".to_string(),
        caption: String::new(),
        video_url: None,
        created_at: created_at.map(|d| RawTimestamp::Text(d.to_string())),
    }
}

pub fn event(id: &str, starts_at: Option<&str>) -> Event {
    Event {
        id: EventId::new(id),
        title: format!("Event {id}"),
        venue: "Hall".to_string(),
        starts_at: starts_at.map(|d| RawTimestamp::Text(d.to_string())),
        price_cents: 2500,
        image_url: None,
    }
}

pub fn record(
    user_id: &str,
    status: CheckInStatus,
    visibility: Visibility,
    seconds: i64,
) -> CheckInRecord {
    CheckInRecord {
        user_id: UserId::new(user_id),
        display_name: user_id.to_uppercase(),
        avatar_url: None,
        status,
        icebreaker: None,
        visibility,
        tags: Vec::new(),
        timestamp: Some(RawTimestamp::Epoch {
            seconds,
            nanoseconds: 0,
        }),
    }
}
