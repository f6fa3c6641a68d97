//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used)] // Each test binary uses a different subset

use chrono::{TimeZone, Utc};
use scanme::mocks::MockScanMeApi;
use scanme::types::{CheckInRecord, Event, Post, PostId, RawTimestamp};
use scanme::{
    CheckInStatus, EventId, Identity, ScanMeConfig, ScanMeEnvironment, SharedIdentity, UserId,
    Visibility,
};
use scanme_testing::FixedClock;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(2);

pub type TestEnv = ScanMeEnvironment<MockScanMeApi, SharedIdentity>;

pub fn config() -> ScanMeConfig {
    ScanMeConfig::default()
        .with_poll_interval(Duration::from_millis(25))
        .with_support_contact("help@scanme.test")
}

pub fn env_with(api: MockScanMeApi, identity: Option<Identity>) -> TestEnv {
    let identity = identity.map_or_else(SharedIdentity::new, SharedIdentity::signed_in);
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    ScanMeEnvironment::new(api, identity, config()).with_clock(Arc::new(clock))
}

pub fn member(id: &str) -> Identity {
    Identity {
        user_id: UserId::new(id),
        display_name: id.to_string(),
        avatar_url: None,
        is_admin: false,
        is_veteran: false,
    }
}

pub fn admin(id: &str) -> Identity {
    Identity {
        is_admin: true,
        ..member(id)
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
        price_cents: 1200,
        image_url: None,
    }
}

pub fn record(
    user: &str,
    status: CheckInStatus,
    visibility: Visibility,
    seconds: i64,
) -> CheckInRecord {
    CheckInRecord {
        user_id: UserId::new(user),
        display_name: user.to_string(),
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
