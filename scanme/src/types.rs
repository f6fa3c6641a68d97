//! Domain and wire types shared by the screens.
//!
//! Everything here is plain data that crosses the API boundary. Timestamps
//! that arrive in several shapes are normalised once, on ingestion, into
//! `DateTime<Utc>`; nothing past this module branches on the raw shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw id.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Account identifier issued by the identity provider.
    UserId
);
string_id!(
    /// Event identifier.
    EventId
);
string_id!(
    /// Feed post identifier.
    PostId
);
string_id!(
    /// Issued ticket identifier.
    TicketId
);
string_id!(
    /// Activation code identifier.
    ActivationCodeId
);
string_id!(
    /// Icebreaker quest identifier.
    QuestId
);
string_id!(
    /// Veteran verification request identifier.
    VerificationId
);

// ═══════════════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════════════

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account id
    pub user_id: UserId,
    /// Name shown to other users
    pub display_name: String,
    /// Profile picture
    pub avatar_url: Option<String>,
    /// Admin flag; gates the admin panels client-side only
    #[serde(default)]
    pub is_admin: bool,
    /// Verified veteran status
    #[serde(default)]
    pub is_veteran: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Timestamps
// ═══════════════════════════════════════════════════════════════════════

/// A timestamp as the backend sends it.
///
/// Accepted shapes are an epoch-seconds object (with or without leading
/// underscores on the field names) and a date string. Any other JSON value
/// is kept as [`RawTimestamp::Other`] and resolves to no instant, so a bad
/// date never fails the record around it. A missing field is modelled as
/// `Option<RawTimestamp>::None` by the containing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// `{ "seconds": .., "nanoseconds": .. }`
    Epoch {
        /// Seconds since the Unix epoch
        seconds: i64,
        /// Sub-second part
        #[serde(default)]
        nanoseconds: u32,
    },
    /// `{ "_seconds": .., "_nanoseconds": .. }`
    PrefixedEpoch {
        /// Seconds since the Unix epoch
        #[serde(rename = "_seconds")]
        seconds: i64,
        /// Sub-second part
        #[serde(rename = "_nanoseconds", default)]
        nanoseconds: u32,
    },
    /// ISO-8601 / RFC 3339 string
    Text(String),
    /// Any other shape
    Other(serde_json::Value),
}

impl RawTimestamp {
    /// The instant this value denotes, if it denotes one.
    #[must_use]
    pub fn to_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch {
                seconds,
                nanoseconds,
            }
            | Self::PrefixedEpoch {
                seconds,
                nanoseconds,
            } => DateTime::from_timestamp(*seconds, *nanoseconds),
            Self::Text(text) => parse_instant(text),
            Self::Other(_) => None,
        }
    }
}

/// Collapse an optional raw timestamp into an instant, using `now` when it
/// is absent or unparsable.
#[must_use]
pub fn normalize_timestamp(raw: Option<&RawTimestamp>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(RawTimestamp::to_instant).unwrap_or(now)
}

/// Parse a date string as sent by the backend.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]`, `YYYY-MM-DD HH:MM:SS` and a
/// bare `YYYY-MM-DD`. Strings without an offset are read as UTC.
#[must_use]
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ═══════════════════════════════════════════════════════════════════════
// Feed content
// ═══════════════════════════════════════════════════════════════════════

/// Short-form video post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Post id
    pub id: PostId,
    /// Author account
    pub author_id: UserId,
    /// Author name at posting time
    pub author_name: String,
    /// Caption text
    #[serde(default)]
    pub caption: String,
    /// Video location
    pub video_url: Option<String>,
    /// Creation time as sent; resolved when the feed is merged
    #[serde(default)]
    pub created_at: Option<RawTimestamp>,
}

/// Ticketed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event id
    pub id: EventId,
    /// Title
    pub title: String,
    /// Venue name
    #[serde(default)]
    pub venue: String,
    /// Start time as sent; resolved when the feed is merged
    #[serde(default)]
    pub starts_at: Option<RawTimestamp>,
    /// Price of one ticket in cents
    #[serde(default)]
    pub price_cents: u64,
    /// Cover image
    pub image_url: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Check-ins
// ═══════════════════════════════════════════════════════════════════════

/// Presence status of one user at one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckInStatus {
    /// At the venue now
    Here,
    /// Planning to attend
    Going,
}

/// Who may see a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Everyone at the event
    #[default]
    Public,
    /// Friends only
    FriendsOnly,
    /// Counted but never listed
    Anonymous,
}

/// A check-in as it arrives from the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRecord {
    /// Owner of the record
    pub user_id: UserId,
    /// Owner's display name
    #[serde(default)]
    pub display_name: String,
    /// Owner's avatar
    pub avatar_url: Option<String>,
    /// Presence status
    pub status: CheckInStatus,
    /// Conversation starter shown on the wall
    pub icebreaker: Option<String>,
    /// Who may see the record
    #[serde(default)]
    pub visibility: Visibility,
    /// Interest tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the record was written, in any accepted shape
    pub timestamp: Option<RawTimestamp>,
}

impl CheckInRecord {
    /// Normalise the record, resolving its timestamp against `now`.
    #[must_use]
    pub fn normalize(self, now: DateTime<Utc>) -> CheckIn {
        let timestamp = normalize_timestamp(self.timestamp.as_ref(), now);
        CheckIn {
            user_id: self.user_id,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            status: self.status,
            icebreaker: self.icebreaker,
            visibility: self.visibility,
            tags: self.tags,
            timestamp,
        }
    }
}

/// A normalised check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    /// Owner of the record
    pub user_id: UserId,
    /// Owner's display name
    pub display_name: String,
    /// Owner's avatar
    pub avatar_url: Option<String>,
    /// Presence status
    pub status: CheckInStatus,
    /// Conversation starter
    pub icebreaker: Option<String>,
    /// Who may see the record
    pub visibility: Visibility,
    /// Interest tags
    pub tags: Vec<String>,
    /// When the record was written
    pub timestamp: DateTime<Utc>,
}

/// Body of a check-in upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRequest {
    /// Requested status
    pub status: CheckInStatus,
    /// Conversation starter, `here` only
    pub icebreaker: Option<String>,
    /// Who may see the record
    pub visibility: Visibility,
    /// Interest tags, `here` only
    pub tags: Vec<String>,
}

impl CheckInRequest {
    /// A plain `going` check-in.
    #[must_use]
    pub const fn going() -> Self {
        Self {
            status: CheckInStatus::Going,
            icebreaker: None,
            visibility: Visibility::Public,
            tags: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Payments and tickets
// ═══════════════════════════════════════════════════════════════════════

/// Checkout attempt created by the backend for the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Payment provider's intent id
    pub id: String,
    /// Opaque secret that authorises this attempt in the widget
    pub client_secret: String,
}

/// Lifecycle of an issued ticket; only the backend changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Not yet redeemed
    Valid,
    /// Redeemed at the door
    Used,
    /// Money returned
    Refunded,
}

/// One purchased admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id
    pub id: TicketId,
    /// Event admitted to
    pub event_id: EventId,
    /// Event title at purchase time
    pub event_title: String,
    /// Event date at purchase time
    #[serde(default)]
    pub event_date: Option<RawTimestamp>,
    /// Price paid in cents
    pub price_cents: u64,
    /// Unique redemption code
    pub code: String,
    /// Redemption status
    pub status: TicketStatus,
}

/// Content of a scannable 2D barcode.
///
/// A stable string; the same ticket always yields the same payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QrPayload(String);

impl QrPayload {
    /// Payload redeeming `ticket` at the door.
    #[must_use]
    pub fn for_ticket(ticket: &Ticket) -> Self {
        Self(format!("scanme:ticket:{}", ticket.code))
    }

    /// Payload for a verification or activation code.
    #[must_use]
    pub fn for_code(code: &str) -> Self {
        Self(format!("scanme:code:{code}"))
    }

    /// Payload opening `url`.
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        Self(url.to_string())
    }

    /// The string to encode.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QrPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Admin collections
// ═══════════════════════════════════════════════════════════════════════

/// Single-use code that unlocks an account feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationCode {
    /// Code id
    pub id: ActivationCodeId,
    /// The code users type in
    pub code: String,
    /// Batch this code was generated in
    pub batch_label: String,
    /// Whether someone already used it
    #[serde(default)]
    pub redeemed: bool,
    /// Generation time
    pub created_at: DateTime<Utc>,
}

/// Request for a new batch of activation codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivationBatch {
    /// Number of codes
    pub count: u32,
    /// Label attached to every code of the batch
    pub batch_label: String,
}

/// Conversation prompt awarded points when completed at an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcebreakerQuest {
    /// Quest id
    pub id: QuestId,
    /// Short title
    pub title: String,
    /// What the user has to do
    pub prompt: String,
    /// Points awarded
    pub points: u32,
    /// Whether users currently see it
    #[serde(default = "default_true")]
    pub active: bool,
}

const fn default_true() -> bool {
    true
}

/// Fields of a quest to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuest {
    /// Short title
    pub title: String,
    /// What the user has to do
    pub prompt: String,
    /// Points awarded
    pub points: u32,
}

/// Review state of a veteran verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Waiting for an admin
    Pending,
    /// Veteran status granted
    Approved,
    /// Turned down
    Rejected {
        /// Why, as written by the reviewer
        reason: String,
    },
}

/// A user's proof of veteran status awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Request id
    pub id: VerificationId,
    /// Applicant
    pub user_id: UserId,
    /// Applicant's display name
    #[serde(default)]
    pub display_name: String,
    /// Location of the uploaded proof document
    pub proof_url: String,
    /// Review state
    pub status: VerificationStatus,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
}

/// Outcome an admin chooses for a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum ReviewDecision {
    /// Grant veteran status
    Approve,
    /// Turn down with a reason
    Reject {
        /// Why, shown to the applicant
        reason: String,
    },
}

/// Metadata of an uploaded proof document, sent for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSubmission {
    /// Original file name
    pub file_name: String,
    /// MIME type
    pub content_type: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Where the storage provider put the file
    pub proof_url: String,
}

// ═══════════════════════════════════════════════════════════════════════
// Social graph
// ═══════════════════════════════════════════════════════════════════════

/// A connection in the user's friend list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    /// Friend's account
    pub user_id: UserId,
    /// Friend's display name
    pub display_name: String,
    /// Friend's interest tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One QR scan the user performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    /// Scan id
    pub id: String,
    /// What was scanned (person, venue, booth)
    pub name: String,
    /// Category tag of the scanned target
    pub tag: Option<String>,
    /// When it was scanned
    pub scanned_at: DateTime<Utc>,
}
