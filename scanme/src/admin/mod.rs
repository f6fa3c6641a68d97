//! Admin panels.
//!
//! Three independent CRUD screens share the same shape: `Load` on mount,
//! optimistic local removal on delete, and a full refetch after create.
//! Every action is gated on the admin flag of the signed-in identity before
//! any remote call is made.

pub mod codes;
pub mod quests;
pub mod verification;

pub use codes::{ActivationCodesAction, ActivationCodesReducer, ActivationCodesState};
pub use quests::{QuestsAction, QuestsReducer, QuestsState};
pub use verification::{ReviewQueueAction, ReviewQueueReducer, ReviewQueueState};

use crate::environment::ScanMeEnvironment;
use crate::error::Notification;
use crate::providers::{IdentityProvider, ScanMeApi};

/// Ordering of list fetches against local mutations.
///
/// A fetch issued before an optimistic removal must not resurrect the
/// removed row, so removals raise the floor below which results are stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FetchTracker {
    issued: u64,
    floor: u64,
}

impl FetchTracker {
    /// Number for a new fetch.
    pub(crate) fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Whether a result numbered `seq` may replace local state.
    pub(crate) fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.floor {
            return false;
        }
        self.floor = seq;
        true
    }

    /// Whether `seq` is the newest fetch issued.
    pub(crate) const fn is_latest(&self, seq: u64) -> bool {
        seq >= self.issued
    }

    /// Discard every fetch issued so far.
    pub(crate) fn invalidate(&mut self) {
        self.floor = self.issued;
    }
}

/// Reject the action unless the signed-in user is an admin.
pub(crate) fn gate<A, I>(env: &ScanMeEnvironment<A, I>) -> Result<(), Notification>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    env.admin().map(|_| ()).map_err(|error| {
        tracing::warn!(%error, "Rejected admin action");
        Notification::error(error.to_string())
    })
}
