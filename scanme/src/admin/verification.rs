//! Veteran review queue.
//!
//! Admins approve or reject pending proofs of veteran status. A request
//! leaves the queue only after the remote review succeeds; a failed review
//! keeps it listed so it can be reviewed again.

use super::{FetchTracker, gate};
use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{
    QrPayload, ReviewDecision, VerificationId, VerificationRequest, VerificationStatus,
};
use scanme_core::effect::Effect;
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::collections::HashSet;
use std::marker::PhantomData;

/// Review queue state.
#[derive(Debug, Clone, Default)]
pub struct ReviewQueueState {
    requests: Vec<VerificationRequest>,
    in_review: HashSet<VerificationId>,
    fetch: FetchTracker,
    /// List fetch in flight
    pub loading: bool,
    /// Inline message for rejected input
    pub validation_error: Option<String>,
    /// Transient message for the admin
    pub notification: Option<Notification>,
}

impl ReviewQueueState {
    /// Pending requests, oldest first.
    #[must_use]
    pub fn requests(&self) -> &[VerificationRequest] {
        &self.requests
    }

    /// Whether a review of `id` is in flight.
    #[must_use]
    pub fn is_reviewing(&self, id: &VerificationId) -> bool {
        self.in_review.contains(id)
    }

    /// QR payload linking to the proof document of `id`.
    #[must_use]
    pub fn proof_qr(&self, id: &VerificationId) -> Option<QrPayload> {
        self.requests
            .iter()
            .find(|r| &r.id == id)
            .map(|r| QrPayload::for_url(&r.proof_url))
    }
}

/// Review queue actions.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewQueueAction {
    /// Fetch pending requests
    Load,
    /// Pending requests arrived
    Loaded {
        /// Fetch number
        seq: u64,
        /// Pending requests
        requests: Vec<VerificationRequest>,
    },
    /// Fetch failed
    LoadFailed {
        /// Fetch number
        seq: u64,
        /// Why
        error: ScanMeError,
    },
    /// Grant veteran status
    Approve {
        /// Request to approve
        id: VerificationId,
    },
    /// Turn a request down
    Reject {
        /// Request to reject
        id: VerificationId,
        /// Why, shown to the applicant
        reason: String,
    },
    /// Remote review succeeded
    Reviewed {
        /// Reviewed request
        id: VerificationId,
        /// What was decided
        decision: ReviewDecision,
    },
    /// Remote review failed
    ReviewFailed {
        /// Request that is still pending
        id: VerificationId,
        /// Why
        error: ScanMeError,
    },
    /// Clear the notification
    DismissNotification,
}

/// Review queue reducer.
#[derive(Debug, Clone)]
pub struct ReviewQueueReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> ReviewQueueReducer<A, I> {
    /// Create a new review queue reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for ReviewQueueReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, I> ReviewQueueReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    fn review(
        state: &mut ReviewQueueState,
        env: &ScanMeEnvironment<A, I>,
        id: VerificationId,
        decision: ReviewDecision,
    ) -> SmallVec<[Effect<ReviewQueueAction>; 4]> {
        if let Err(notification) = gate(env) {
            state.notification = Some(notification);
            return smallvec![Effect::None];
        }
        if !state.requests.iter().any(|r| r.id == id) || !state.in_review.insert(id.clone()) {
            return smallvec![Effect::None];
        }

        state.validation_error = None;
        let api = env.api.clone();

        smallvec![Effect::future(async move {
            Some(match api.review_verification_request(&id, &decision).await {
                Ok(()) => ReviewQueueAction::Reviewed { id, decision },
                Err(error) => ReviewQueueAction::ReviewFailed { id, error },
            })
        })]
    }
}

impl<A, I> Reducer for ReviewQueueReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = ReviewQueueState;
    type Action = ReviewQueueAction;
    type Environment = ScanMeEnvironment<A, I>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ReviewQueueAction::Load => {
                if let Err(notification) = gate(env) {
                    state.notification = Some(notification);
                    return smallvec![Effect::None];
                }

                state.loading = true;
                let seq = state.fetch.issue();
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(match api.list_verification_requests().await {
                        Ok(requests) => ReviewQueueAction::Loaded { seq, requests },
                        Err(error) => ReviewQueueAction::LoadFailed { seq, error },
                    })
                })]
            },

            ReviewQueueAction::Loaded { seq, mut requests } => {
                if state.fetch.is_latest(seq) {
                    state.loading = false;
                }
                if !state.fetch.accept(seq) {
                    tracing::warn!(seq, "Dropped stale review queue");
                    return smallvec![Effect::None];
                }
                requests.retain(|r| r.status == VerificationStatus::Pending);
                requests.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
                state.requests = requests;
                smallvec![Effect::None]
            },

            ReviewQueueAction::LoadFailed { seq, error } => {
                if state.fetch.is_latest(seq) {
                    state.loading = false;
                    state.notification = Some(Notification::from_error(
                        "Could not load review queue",
                        &error,
                        &env.config.support_contact,
                    ));
                }
                smallvec![Effect::None]
            },

            ReviewQueueAction::Approve { id } => {
                Self::review(state, env, id, ReviewDecision::Approve)
            },

            ReviewQueueAction::Reject { id, reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    state.validation_error = Some("A reason is required to reject".to_string());
                    return smallvec![Effect::None];
                }
                let decision = ReviewDecision::Reject {
                    reason: reason.to_string(),
                };
                Self::review(state, env, id, decision)
            },

            ReviewQueueAction::Reviewed { id, decision } => {
                let approved = decision == ReviewDecision::Approve;
                tracing::info!(%id, approved, "Verification request reviewed");

                state.in_review.remove(&id);
                state.requests.retain(|r| r.id != id);
                state.fetch.invalidate();
                state.notification = Some(Notification::info(if approved {
                    "Veteran status granted"
                } else {
                    "Request rejected"
                }));
                smallvec![Effect::None]
            },

            ReviewQueueAction::ReviewFailed { id, error } => {
                tracing::warn!(%id, %error, "Review failed");
                state.in_review.remove(&id);
                state.notification = Some(Notification::from_error(
                    "Could not submit review",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            ReviewQueueAction::DismissNotification => {
                state.notification = None;
                smallvec![Effect::None]
            },
        }
    }
}
