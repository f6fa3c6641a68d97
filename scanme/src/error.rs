//! Error types for the ScanMe client.

use thiserror::Error;

/// Result type alias for ScanMe operations.
pub type Result<T> = std::result::Result<T, ScanMeError>;

/// Every way an operation of the client can fail.
///
/// Variants fall in three classes (see [`ErrorClass`]): remote failures,
/// local validation failures caught before any remote call, and partial
/// success where money has moved but the follow-up step failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanMeError {
    // ═══════════════════════════════════════════════════════════
    // Remote Errors
    // ═══════════════════════════════════════════════════════════

    /// The request never produced a response.
    #[error("Request to {operation} failed: {message}")]
    Remote {
        /// API operation that failed
        operation: &'static str,
        /// Transport error message
        message: String,
    },

    /// The API answered with a non-success status.
    #[error("{operation} returned status {status}: {body}")]
    Status {
        /// API operation that failed
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The success body could not be parsed.
    #[error("Could not decode {operation} response: {message}")]
    Decode {
        /// API operation that failed
        operation: &'static str,
        /// Parser message
        message: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Local Errors
    // ═══════════════════════════════════════════════════════════

    /// Input rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    /// Admin-only or owner-only action attempted without the flag.
    #[error("Not allowed: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════
    // Partial Success
    // ═══════════════════════════════════════════════════════════

    /// Payment captured but ticket issuance failed.
    #[error("Payment received but ticket issuance failed: {message}")]
    FulfillmentFailed {
        /// Underlying failure of the confirmation call
        message: String,
    },
}

/// Coarse classification used to pick how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient notification, operation abandoned, no retry.
    Remote,
    /// Shown inline next to the offending input.
    Validation,
    /// Directed to the support contact, never offered as a retry.
    PartialSuccess,
}

impl ScanMeError {
    /// Build a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Remote { .. } | Self::Status { .. } | Self::Decode { .. } => ErrorClass::Remote,
            Self::Validation(_) | Self::Unauthorized(_) => ErrorClass::Validation,
            Self::FulfillmentFailed { .. } => ErrorClass::PartialSuccess,
        }
    }

    /// Whether this error was raised locally, before any remote call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.class(), ErrorClass::Validation)
    }
}

/// Kind of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Confirmation of a completed action.
    Info,
    /// Something failed; the user may try again.
    Error,
    /// Something failed after money moved; the user must contact support.
    SupportRequired,
}

/// Transient message a screen shows to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity and handling of the message
    pub kind: NotificationKind,
    /// Text shown to the user
    pub message: String,
}

impl Notification {
    /// Informational message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    /// Generic failure message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    /// Notification for `error`, prefixed with what the user was doing.
    ///
    /// Partial-success errors always produce a support notification that
    /// names `support_contact`.
    #[must_use]
    pub fn from_error(context: &str, error: &ScanMeError, support_contact: &str) -> Self {
        match error.class() {
            ErrorClass::PartialSuccess => Self::support_required(support_contact),
            ErrorClass::Remote | ErrorClass::Validation => {
                Self::error(format!("{context}: {error}"))
            },
        }
    }

    /// Payment went through but fulfillment did not.
    #[must_use]
    pub fn support_required(support_contact: &str) -> Self {
        Self {
            kind: NotificationKind::SupportRequired,
            message: format!(
                "Your payment was received but we could not issue your tickets. \
                 Please do not pay again; contact {support_contact} and we will sort it out."
            ),
        }
    }
}
