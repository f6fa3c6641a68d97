//! Mock ScanMe API for testing.

use crate::error::{Result, ScanMeError};
use crate::providers::{ApiOperation, ScanMeApi};
use crate::types::{
    ActivationCode, ActivationCodeId, CheckInRecord, CheckInRequest, Event, EventId, Friend,
    IcebreakerQuest, NewActivationBatch, NewQuest, PaymentIntent, Post, ProofSubmission,
    QuestId, RawTimestamp, ReviewDecision, Scan, Ticket, TicketId, TicketStatus, UserId,
    VerificationId, VerificationRequest, VerificationStatus,
};
use chrono::Utc;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Default)]
struct MockData {
    posts: Vec<Post>,
    events: Vec<Event>,
    check_ins: HashMap<EventId, Vec<CheckInRecord>>,
    intents: HashMap<String, (EventId, u32)>,
    tickets: Vec<Ticket>,
    activation_codes: Vec<ActivationCode>,
    quests: Vec<IcebreakerQuest>,
    verifications: Vec<VerificationRequest>,
    friends: HashMap<UserId, Vec<Friend>>,
    scans: HashMap<UserId, Vec<Scan>>,
    failing: HashSet<ApiOperation>,
    calls: Vec<ApiOperation>,
    submitter: Option<UserId>,
}

/// Mock ScanMe API.
///
/// In-memory implementation for testing and the demo. Every operation can be
/// made to fail with [`MockScanMeApi::fail`], and every call is logged.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct MockScanMeApi {
    data: Arc<Mutex<MockData>>,
}

impl MockScanMeApi {
    /// Create an empty mock API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed feed posts.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_posts(self, posts: Vec<Post>) -> Self {
        self.data.lock().unwrap().posts = posts;
        self
    }

    /// Seed events.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_events(self, events: Vec<Event>) -> Self {
        self.data.lock().unwrap().events = events;
        self
    }

    /// Seed the check-ins of one event.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_check_ins(self, event_id: &EventId, records: Vec<CheckInRecord>) -> Self {
        self.data
            .lock()
            .unwrap()
            .check_ins
            .insert(event_id.clone(), records);
        self
    }

    /// Seed activation codes.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_activation_codes(self, codes: Vec<ActivationCode>) -> Self {
        self.data.lock().unwrap().activation_codes = codes;
        self
    }

    /// Seed icebreaker quests.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_quests(self, quests: Vec<IcebreakerQuest>) -> Self {
        self.data.lock().unwrap().quests = quests;
        self
    }

    /// Seed verification requests (any status).
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_verification_requests(self, requests: Vec<VerificationRequest>) -> Self {
        self.data.lock().unwrap().verifications = requests;
        self
    }

    /// Seed a user's friend list.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_friends(self, user_id: &UserId, friends: Vec<Friend>) -> Self {
        self.data
            .lock()
            .unwrap()
            .friends
            .insert(user_id.clone(), friends);
        self
    }

    /// Seed a user's scan history.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_scans(self, user_id: &UserId, scans: Vec<Scan>) -> Self {
        self.data.lock().unwrap().scans.insert(user_id.clone(), scans);
        self
    }

    /// User recorded as the submitter of proofs.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn with_submitter(self, user_id: &UserId) -> Self {
        self.data.lock().unwrap().submitter = Some(user_id.clone());
        self
    }

    /// Make every later call to `operation` fail with a 503.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn fail(&self, operation: ApiOperation) {
        self.data.lock().unwrap().failing.insert(operation);
    }

    /// Undo [`MockScanMeApi::fail`].
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn succeed(&self, operation: ApiOperation) {
        self.data.lock().unwrap().failing.remove(&operation);
    }

    /// Number of calls made to `operation`, failed ones included.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn calls(&self, operation: ApiOperation) -> usize {
        self.data
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// Current server-side check-ins of an event.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn check_ins(&self, event_id: &EventId) -> Vec<CheckInRecord> {
        self.data
            .lock()
            .unwrap()
            .check_ins
            .get(event_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every ticket issued so far.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn issued_tickets(&self) -> Vec<Ticket> {
        self.data.lock().unwrap().tickets.clone()
    }

    /// Current server-side activation codes.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn activation_codes(&self) -> Vec<ActivationCode> {
        self.data.lock().unwrap().activation_codes.clone()
    }

    /// Current server-side quests.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn quests(&self) -> Vec<IcebreakerQuest> {
        self.data.lock().unwrap().quests.clone()
    }

    /// Every verification request, reviewed ones included.
    #[must_use]
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    pub fn verification_requests(&self) -> Vec<VerificationRequest> {
        self.data.lock().unwrap().verifications.clone()
    }

    /// Log the call and apply injected failures.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn enter(&self, operation: ApiOperation) -> Result<std::sync::MutexGuard<'_, MockData>> {
        let mut data = self.data.lock().unwrap();
        data.calls.push(operation);

        if data.failing.contains(&operation) {
            return Err(ScanMeError::Status {
                operation: operation.as_str(),
                status: 503,
                body: "injected failure".to_string(),
            });
        }
        Ok(data)
    }

    fn not_found(operation: ApiOperation, what: &str) -> ScanMeError {
        ScanMeError::Status {
            operation: operation.as_str(),
            status: 404,
            body: format!("{what} not found"),
        }
    }

    fn random_code() -> String {
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
            .collect()
    }
}

impl ScanMeApi for MockScanMeApi {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        Ok(self.enter(ApiOperation::ListPosts)?.posts.clone())
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.enter(ApiOperation::ListEvents)?.events.clone())
    }

    async fn list_check_ins(&self, event_id: &EventId) -> Result<Vec<CheckInRecord>> {
        let data = self.enter(ApiOperation::ListCheckIns)?;
        Ok(data.check_ins.get(event_id).cloned().unwrap_or_default())
    }

    async fn upsert_check_in(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        request: &CheckInRequest,
    ) -> Result<CheckInRecord> {
        let mut data = self.enter(ApiOperation::UpsertCheckIn)?;
        let now = Utc::now();
        let records = data.check_ins.entry(event_id.clone()).or_default();

        let display_name = records
            .iter()
            .find(|r| &r.user_id == user_id)
            .map(|r| r.display_name.clone())
            .unwrap_or_else(|| user_id.to_string());

        let record = CheckInRecord {
            user_id: user_id.clone(),
            display_name,
            avatar_url: None,
            status: request.status,
            icebreaker: request.icebreaker.clone(),
            visibility: request.visibility,
            tags: request.tags.clone(),
            timestamp: Some(RawTimestamp::Epoch {
                seconds: now.timestamp(),
                nanoseconds: now.timestamp_subsec_nanos(),
            }),
        };

        records.retain(|r| &r.user_id != user_id);
        records.push(record.clone());
        Ok(record)
    }

    async fn remove_check_in(&self, event_id: &EventId, user_id: &UserId) -> Result<()> {
        let mut data = self.enter(ApiOperation::RemoveCheckIn)?;
        if let Some(records) = data.check_ins.get_mut(event_id) {
            records.retain(|r| &r.user_id != user_id);
        }
        Ok(())
    }

    async fn payment_publishable_key(&self) -> Result<String> {
        self.enter(ApiOperation::PaymentPublishableKey)?;
        Ok("pk_test_scanme".to_string())
    }

    async fn create_payment_intent(
        &self,
        event_id: &EventId,
        quantity: u32,
    ) -> Result<PaymentIntent> {
        let mut data = self.enter(ApiOperation::CreatePaymentIntent)?;
        let id = format!("pi_{}", Uuid::new_v4().simple());
        data.intents.insert(id.clone(), (event_id.clone(), quantity));

        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }

    async fn confirm_ticket_purchase(
        &self,
        event_id: &EventId,
        payment_intent_id: &str,
        quantity: u32,
    ) -> Result<Vec<Ticket>> {
        let operation = ApiOperation::ConfirmTicketPurchase;
        let mut data = self.enter(operation)?;

        match data.intents.get(payment_intent_id) {
            Some((intent_event, intent_quantity))
                if intent_event == event_id && *intent_quantity == quantity => {},
            _ => return Err(Self::not_found(operation, "payment intent")),
        }
        data.intents.remove(payment_intent_id);

        let (title, date, price) = data
            .events
            .iter()
            .find(|e| &e.id == event_id)
            .map(|e| (e.title.clone(), e.starts_at.clone(), e.price_cents))
            .unwrap_or_default();

        let tickets: Vec<Ticket> = (0..quantity)
            .map(|_| Ticket {
                id: TicketId::new(Uuid::new_v4().to_string()),
                event_id: event_id.clone(),
                event_title: title.clone(),
                event_date: date.clone(),
                price_cents: price,
                code: Self::random_code(),
                status: TicketStatus::Valid,
            })
            .collect();

        data.tickets.extend(tickets.iter().cloned());
        Ok(tickets)
    }

    async fn list_activation_codes(&self) -> Result<Vec<ActivationCode>> {
        Ok(self
            .enter(ApiOperation::ListActivationCodes)?
            .activation_codes
            .clone())
    }

    async fn generate_activation_codes(
        &self,
        batch: &NewActivationBatch,
    ) -> Result<Vec<ActivationCode>> {
        let mut data = self.enter(ApiOperation::GenerateActivationCodes)?;
        let now = Utc::now();

        let codes: Vec<ActivationCode> = (0..batch.count)
            .map(|_| ActivationCode {
                id: ActivationCodeId::new(Uuid::new_v4().to_string()),
                code: Self::random_code(),
                batch_label: batch.batch_label.clone(),
                redeemed: false,
                created_at: now,
            })
            .collect();

        data.activation_codes.extend(codes.iter().cloned());
        Ok(codes)
    }

    async fn delete_activation_code(&self, id: &ActivationCodeId) -> Result<()> {
        let operation = ApiOperation::DeleteActivationCode;
        let mut data = self.enter(operation)?;
        let before = data.activation_codes.len();
        data.activation_codes.retain(|c| &c.id != id);

        if data.activation_codes.len() == before {
            return Err(Self::not_found(operation, "activation code"));
        }
        Ok(())
    }

    async fn list_quests(&self) -> Result<Vec<IcebreakerQuest>> {
        Ok(self.enter(ApiOperation::ListQuests)?.quests.clone())
    }

    async fn create_quest(&self, quest: &NewQuest) -> Result<IcebreakerQuest> {
        let mut data = self.enter(ApiOperation::CreateQuest)?;
        let created = IcebreakerQuest {
            id: QuestId::new(Uuid::new_v4().to_string()),
            title: quest.title.clone(),
            prompt: quest.prompt.clone(),
            points: quest.points,
            active: true,
        };
        data.quests.push(created.clone());
        Ok(created)
    }

    async fn delete_quest(&self, id: &QuestId) -> Result<()> {
        let operation = ApiOperation::DeleteQuest;
        let mut data = self.enter(operation)?;
        let before = data.quests.len();
        data.quests.retain(|q| &q.id != id);

        if data.quests.len() == before {
            return Err(Self::not_found(operation, "quest"));
        }
        Ok(())
    }

    async fn list_verification_requests(&self) -> Result<Vec<VerificationRequest>> {
        let data = self.enter(ApiOperation::ListVerificationRequests)?;
        Ok(data
            .verifications
            .iter()
            .filter(|r| r.status == VerificationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn review_verification_request(
        &self,
        id: &VerificationId,
        decision: &ReviewDecision,
    ) -> Result<()> {
        let operation = ApiOperation::ReviewVerificationRequest;
        let mut data = self.enter(operation)?;

        let request = data
            .verifications
            .iter_mut()
            .find(|r| &r.id == id && r.status == VerificationStatus::Pending)
            .ok_or_else(|| Self::not_found(operation, "pending request"))?;

        request.status = match decision {
            ReviewDecision::Approve => VerificationStatus::Approved,
            ReviewDecision::Reject { reason } => VerificationStatus::Rejected {
                reason: reason.clone(),
            },
        };
        Ok(())
    }

    async fn submit_verification_proof(
        &self,
        submission: &ProofSubmission,
    ) -> Result<VerificationRequest> {
        let mut data = self.enter(ApiOperation::SubmitVerificationProof)?;
        let user_id = data
            .submitter
            .clone()
            .unwrap_or_else(|| UserId::new("anonymous"));

        let request = VerificationRequest {
            id: VerificationId::new(Uuid::new_v4().to_string()),
            display_name: user_id.to_string(),
            user_id,
            proof_url: submission.proof_url.clone(),
            status: VerificationStatus::Pending,
            submitted_at: Utc::now(),
        };
        data.verifications.push(request.clone());
        Ok(request)
    }

    async fn list_friends(&self, user_id: &UserId) -> Result<Vec<Friend>> {
        let data = self.enter(ApiOperation::ListFriends)?;
        Ok(data.friends.get(user_id).cloned().unwrap_or_default())
    }

    async fn list_scans(&self, user_id: &UserId) -> Result<Vec<Scan>> {
        let data = self.enter(ApiOperation::ListScans)?;
        Ok(data.scans.get(user_id).cloned().unwrap_or_default())
    }
}
