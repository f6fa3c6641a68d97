//! External collaborators of the client.
//!
//! This module defines traits for everything the screens talk to but do not
//! own: the backend API and the identity provider. Reducers depend on these
//! traits only; the host injects concrete implementations through the
//! environment.
//!
//! - **Production**: [`HttpApiClient`] against the ScanMe API
//! - **Testing/demo**: [`crate::mocks::MockScanMeApi`], in memory

use crate::error::Result;
use crate::types::{
    ActivationCode, ActivationCodeId, CheckInRecord, CheckInRequest, Event, EventId, Friend,
    Identity, IcebreakerQuest, NewActivationBatch, NewQuest, PaymentIntent, Post,
    ProofSubmission, QuestId, ReviewDecision, Scan, Ticket, UserId, VerificationId,
    VerificationRequest,
};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

pub mod http;

pub use http::HttpApiClient;

/// Named remote procedures of the API.
///
/// Used for metrics labels, error messages and failure injection in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// List feed posts
    ListPosts,
    /// List events
    ListEvents,
    /// List check-ins of an event
    ListCheckIns,
    /// Create or replace the caller's check-in
    UpsertCheckIn,
    /// Delete the caller's check-in
    RemoveCheckIn,
    /// Fetch the payment widget's publishable key
    PaymentPublishableKey,
    /// Create a payment intent
    CreatePaymentIntent,
    /// Confirm a paid purchase and issue tickets
    ConfirmTicketPurchase,
    /// List activation codes
    ListActivationCodes,
    /// Generate an activation-code batch
    GenerateActivationCodes,
    /// Delete an activation code
    DeleteActivationCode,
    /// List icebreaker quests
    ListQuests,
    /// Create an icebreaker quest
    CreateQuest,
    /// Delete an icebreaker quest
    DeleteQuest,
    /// List pending verification requests
    ListVerificationRequests,
    /// Approve or reject a verification request
    ReviewVerificationRequest,
    /// Submit proof of veteran status
    SubmitVerificationProof,
    /// List the user's friends
    ListFriends,
    /// List the user's scans
    ListScans,
}

impl ApiOperation {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListPosts => "list_posts",
            Self::ListEvents => "list_events",
            Self::ListCheckIns => "list_check_ins",
            Self::UpsertCheckIn => "upsert_check_in",
            Self::RemoveCheckIn => "remove_check_in",
            Self::PaymentPublishableKey => "payment_publishable_key",
            Self::CreatePaymentIntent => "create_payment_intent",
            Self::ConfirmTicketPurchase => "confirm_ticket_purchase",
            Self::ListActivationCodes => "list_activation_codes",
            Self::GenerateActivationCodes => "generate_activation_codes",
            Self::DeleteActivationCode => "delete_activation_code",
            Self::ListQuests => "list_quests",
            Self::CreateQuest => "create_quest",
            Self::DeleteQuest => "delete_quest",
            Self::ListVerificationRequests => "list_verification_requests",
            Self::ReviewVerificationRequest => "review_verification_request",
            Self::SubmitVerificationProof => "submit_verification_proof",
            Self::ListFriends => "list_friends",
            Self::ListScans => "list_scans",
        }
    }
}

/// The ScanMe backend API.
///
/// Every call either returns the parsed success body or an error; callers
/// never see a response whose status was not checked.
///
/// Implementations must be cheap to clone: reducers clone the client into
/// each effect.
///
/// # Errors
///
/// Every method returns [`crate::error::ScanMeError::Remote`],
/// [`crate::error::ScanMeError::Status`] or
/// [`crate::error::ScanMeError::Decode`] on failure.
pub trait ScanMeApi: Clone + Send + Sync + 'static {
    /// All feed posts.
    fn list_posts(&self) -> impl Future<Output = Result<Vec<Post>>> + Send;

    /// All events.
    fn list_events(&self) -> impl Future<Output = Result<Vec<Event>>> + Send;

    /// Every check-in of `event_id`.
    fn list_check_ins(
        &self,
        event_id: &EventId,
    ) -> impl Future<Output = Result<Vec<CheckInRecord>>> + Send;

    /// Create or replace `user_id`'s check-in at `event_id`.
    fn upsert_check_in(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        request: &CheckInRequest,
    ) -> impl Future<Output = Result<CheckInRecord>> + Send;

    /// Delete `user_id`'s check-in at `event_id`.
    fn remove_check_in(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Publishable key the payment widget is initialised with.
    fn payment_publishable_key(&self) -> impl Future<Output = Result<String>> + Send;

    /// Create a payment intent for `quantity` tickets of `event_id`.
    fn create_payment_intent(
        &self,
        event_id: &EventId,
        quantity: u32,
    ) -> impl Future<Output = Result<PaymentIntent>> + Send;

    /// Confirm a captured payment and issue its tickets.
    fn confirm_ticket_purchase(
        &self,
        event_id: &EventId,
        payment_intent_id: &str,
        quantity: u32,
    ) -> impl Future<Output = Result<Vec<Ticket>>> + Send;

    /// All activation codes.
    fn list_activation_codes(&self) -> impl Future<Output = Result<Vec<ActivationCode>>> + Send;

    /// Generate a batch of activation codes.
    fn generate_activation_codes(
        &self,
        batch: &NewActivationBatch,
    ) -> impl Future<Output = Result<Vec<ActivationCode>>> + Send;

    /// Delete one activation code.
    fn delete_activation_code(
        &self,
        id: &ActivationCodeId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All icebreaker quests.
    fn list_quests(&self) -> impl Future<Output = Result<Vec<IcebreakerQuest>>> + Send;

    /// Create a quest.
    fn create_quest(&self, quest: &NewQuest)
    -> impl Future<Output = Result<IcebreakerQuest>> + Send;

    /// Delete a quest.
    fn delete_quest(&self, id: &QuestId) -> impl Future<Output = Result<()>> + Send;

    /// Verification requests still waiting for review.
    fn list_verification_requests(
        &self,
    ) -> impl Future<Output = Result<Vec<VerificationRequest>>> + Send;

    /// Approve or reject a pending request.
    fn review_verification_request(
        &self,
        id: &VerificationId,
        decision: &ReviewDecision,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Submit proof of veteran status for the signed-in user.
    fn submit_verification_proof(
        &self,
        submission: &ProofSubmission,
    ) -> impl Future<Output = Result<VerificationRequest>> + Send;

    /// `user_id`'s friends.
    fn list_friends(&self, user_id: &UserId) -> impl Future<Output = Result<Vec<Friend>>> + Send;

    /// `user_id`'s scan history.
    fn list_scans(&self, user_id: &UserId) -> impl Future<Output = Result<Vec<Scan>>> + Send;
}

/// Source of the signed-in user's identity.
///
/// Authentication itself happens elsewhere; the client only reads the
/// result. Admin and veteran gating built on this is UX, the server
/// enforces authorisation independently.
pub trait IdentityProvider: Clone + Send + Sync + 'static {
    /// The signed-in user, if any.
    fn current(&self) -> Option<Identity>;
}

/// Identity slot the host updates on sign-in and sign-out.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    inner: Arc<RwLock<Option<Identity>>>,
}

impl SharedIdentity {
    /// Empty slot (signed out).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot holding `identity`.
    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(identity))),
        }
    }

    /// Replace the current identity.
    pub fn set(&self, identity: Option<Identity>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }
}

impl IdentityProvider for SharedIdentity {
    fn current(&self) -> Option<Identity> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
