//! Client configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Default interval between presence polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default largest ticket quantity per purchase.
pub const DEFAULT_MAX_TICKET_QUANTITY: u32 = 10;

/// Default largest activation-code batch.
pub const DEFAULT_MAX_BATCH_SIZE: u32 = 100;

/// Default largest veteran proof upload (5 MiB).
pub const DEFAULT_MAX_PROOF_BYTES: u64 = 5 * 1024 * 1024;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ScanMeConfig {
    /// Base URL of the ScanMe API
    pub api_base_url: String,
    /// Bearer token sent with every API call
    pub api_token: Option<String>,
    /// Per-request timeout of the HTTP client
    pub request_timeout: Duration,
    /// Interval between presence polls
    pub poll_interval: Duration,
    /// Largest ticket quantity per purchase
    pub max_ticket_quantity: u32,
    /// Largest activation-code batch
    pub max_batch_size: u32,
    /// Largest veteran proof upload in bytes
    pub max_proof_bytes: u64,
    /// Where users are sent when a payment needs manual follow-up
    pub support_contact: String,
    /// Prometheus exporter address, if metrics are enabled
    pub metrics_addr: Option<SocketAddr>,
}

impl ScanMeConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_base_url: env::var("SCANME_API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_token: env::var("SCANME_API_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout: env::var("SCANME_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            poll_interval: env::var("SCANME_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map_or(defaults.poll_interval, Duration::from_secs),
            max_ticket_quantity: env::var("SCANME_MAX_TICKET_QUANTITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_ticket_quantity),
            max_batch_size: env::var("SCANME_MAX_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_batch_size),
            max_proof_bytes: env::var("SCANME_MAX_PROOF_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_proof_bytes),
            support_contact: env::var("SCANME_SUPPORT_CONTACT")
                .unwrap_or(defaults.support_contact),
            metrics_addr: env::var("SCANME_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the presence poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the largest ticket quantity.
    #[must_use]
    pub const fn with_max_ticket_quantity(mut self, max: u32) -> Self {
        self.max_ticket_quantity = max;
        self
    }

    /// Set the largest activation-code batch.
    #[must_use]
    pub const fn with_max_batch_size(mut self, max: u32) -> Self {
        self.max_batch_size = max;
        self
    }

    /// Set the largest proof upload.
    #[must_use]
    pub const fn with_max_proof_bytes(mut self, max: u64) -> Self {
        self.max_proof_bytes = max;
        self
    }

    /// Set the support contact.
    #[must_use]
    pub fn with_support_contact(mut self, contact: impl Into<String>) -> Self {
        self.support_contact = contact.into();
        self
    }
}

impl Default for ScanMeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(15),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_ticket_quantity: DEFAULT_MAX_TICKET_QUANTITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_proof_bytes: DEFAULT_MAX_PROOF_BYTES,
            support_contact: "support@scanme.app".to_string(),
            metrics_addr: None,
        }
    }
}
