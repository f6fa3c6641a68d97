//! # ScanMe Client Core
//!
//! State containers for every screen of the ScanMe app: the mixed feed, the
//! live check-in wall of an event, the ticket purchase dialog, the admin
//! panels, missions and the veteran hub.
//!
//! ## Architecture
//!
//! Each screen is a reducer over its own state. Remote work is returned as
//! effects and executed by the [`scanme_runtime::Store`]:
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! The backend and the signed-in identity are reached through the traits in
//! [`providers`] and injected with [`ScanMeEnvironment`], so every screen runs
//! against [`mocks::MockScanMeApi`] in tests.
//!
//! ## Example: check in at an event
//!
//! ```rust,ignore
//! use scanme::*;
//!
//! let app = ScanMeApp::init(env);
//!
//! app.presence
//!     .send(PresenceAction::Start { event_id: EventId::new("launch-party") })
//!     .await?;
//! app.presence.send(PresenceAction::MarkGoing).await?;
//!
//! let going = app.presence.state(PresenceState::going_count).await;
//!
//! app.dispose().await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod admin;
pub mod app;
pub mod config;
pub mod environment;
pub mod error;
pub mod feed;
pub mod missions;
pub mod mocks;
pub mod presence;
pub mod providers;
pub mod purchase;
pub mod types;
pub mod veteran;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use app::ScanMeApp;
pub use config::ScanMeConfig;
pub use environment::ScanMeEnvironment;
pub use error::{ErrorClass, Notification, NotificationKind, Result, ScanMeError};
pub use feed::{FeedAction, FeedEntry, FeedItem, FeedReducer, FeedState, merge_feed};
pub use missions::{MISSIONS, Mission, MissionProgress, evaluate_missions};
pub use presence::{PresenceAction, PresenceReducer, PresenceState, WallTab};
pub use providers::{HttpApiClient, IdentityProvider, ScanMeApi, SharedIdentity};
pub use purchase::{PurchaseAction, PurchaseReducer, PurchaseState, PurchaseStep};
pub use types::{CheckIn, CheckInStatus, EventId, Identity, QrPayload, UserId, Visibility};
pub use veteran::{can_access_hub, validate_proof_upload};
