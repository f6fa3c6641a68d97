//! Screen environment.
//!
//! This module defines the environment type shared by every screen reducer.

use crate::config::ScanMeConfig;
use crate::error::ScanMeError;
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::Identity;
use scanme_core::environment::{Clock, SystemClock};
use std::sync::Arc;

/// Dependencies injected into every screen.
///
/// # Type Parameters
///
/// - `A`: API client
/// - `I`: Identity provider
#[derive(Clone)]
pub struct ScanMeEnvironment<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    /// Backend API.
    pub api: A,

    /// Signed-in user.
    pub identity: I,

    /// Source of "now" for timestamp fallbacks.
    pub clock: Arc<dyn Clock>,

    /// Limits, intervals and contacts.
    pub config: ScanMeConfig,
}

impl<A, I> ScanMeEnvironment<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    /// Create an environment on the wall clock.
    #[must_use]
    pub fn new(api: A, identity: I, config: ScanMeConfig) -> Self {
        Self {
            api,
            identity,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The signed-in user, or an authorisation error.
    ///
    /// # Errors
    ///
    /// Returns [`ScanMeError::Unauthorized`] when nobody is signed in.
    pub fn signed_in(&self) -> Result<Identity, ScanMeError> {
        self.identity
            .current()
            .ok_or_else(|| ScanMeError::Unauthorized("sign in first".to_string()))
    }

    /// The signed-in user if they are an admin.
    ///
    /// # Errors
    ///
    /// Returns [`ScanMeError::Unauthorized`] when nobody is signed in or the
    /// user lacks the admin flag.
    pub fn admin(&self) -> Result<Identity, ScanMeError> {
        let identity = self.signed_in()?;
        if identity.is_admin {
            Ok(identity)
        } else {
            Err(ScanMeError::Unauthorized("admin only".to_string()))
        }
    }
}
