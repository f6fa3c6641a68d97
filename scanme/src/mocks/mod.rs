//! In-memory implementations of the providers.
//!
//! Used by tests and the demo binary. Not meant for production.

pub mod api;

pub use api::MockScanMeApi;
