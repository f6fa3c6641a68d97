//! HTTP implementation of [`ScanMeApi`].

use super::{ApiOperation, ScanMeApi};
use crate::config::ScanMeConfig;
use crate::error::{Result, ScanMeError};
use crate::types::{
    ActivationCode, ActivationCodeId, CheckInRecord, CheckInRequest, Event, EventId, Friend,
    IcebreakerQuest, NewActivationBatch, NewQuest, PaymentIntent, Post, ProofSubmission,
    QuestId, ReviewDecision, Scan, Ticket, UserId, VerificationId, VerificationRequest,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use scanme_runtime::metrics::ApiMetrics;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// ScanMe API client over HTTPS with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct PublishableKeyResponse {
    publishable_key: String,
}

#[derive(Serialize)]
struct PaymentIntentRequest<'a> {
    event_id: &'a EventId,
    quantity: u32,
}

#[derive(Serialize)]
struct ConfirmPurchaseRequest<'a> {
    event_id: &'a EventId,
    payment_intent_id: &'a str,
    quantity: u32,
}

impl HttpApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScanMeError::Remote`] if the HTTP client cannot be built.
    pub fn new(config: &ScanMeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ScanMeError::Remote {
                operation: "client_init",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("accept", "application/json");

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send `request` and reject any non-success status.
    async fn send(&self, operation: ApiOperation, request: RequestBuilder) -> Result<Response> {
        let started = Instant::now();
        let result = Self::send_checked(operation, request).await;
        ApiMetrics::record_call(operation.as_str(), started.elapsed(), result.is_ok());

        if let Err(error) = &result {
            tracing::warn!(operation = operation.as_str(), %error, "API call failed");
        }
        result
    }

    async fn send_checked(operation: ApiOperation, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| ScanMeError::Remote {
            operation: operation.as_str(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanMeError::Status {
                operation: operation.as_str(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(
        &self,
        operation: ApiOperation,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(operation, request).await?;
        response.json::<T>().await.map_err(|e| ScanMeError::Decode {
            operation: operation.as_str(),
            message: e.to_string(),
        })
    }

    async fn empty(&self, operation: ApiOperation, request: RequestBuilder) -> Result<()> {
        self.send(operation, request).await.map(drop)
    }
}

impl ScanMeApi for HttpApiClient {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        self.json(ApiOperation::ListPosts, self.request(Method::GET, "/posts"))
            .await
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        self.json(ApiOperation::ListEvents, self.request(Method::GET, "/events"))
            .await
    }

    async fn list_check_ins(&self, event_id: &EventId) -> Result<Vec<CheckInRecord>> {
        let path = format!("/events/{event_id}/check-ins");
        self.json(ApiOperation::ListCheckIns, self.request(Method::GET, &path))
            .await
    }

    async fn upsert_check_in(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        request: &CheckInRequest,
    ) -> Result<CheckInRecord> {
        let path = format!("/events/{event_id}/check-ins/{user_id}");
        self.json(
            ApiOperation::UpsertCheckIn,
            self.request(Method::PUT, &path).json(request),
        )
        .await
    }

    async fn remove_check_in(&self, event_id: &EventId, user_id: &UserId) -> Result<()> {
        let path = format!("/events/{event_id}/check-ins/{user_id}");
        self.empty(ApiOperation::RemoveCheckIn, self.request(Method::DELETE, &path))
            .await
    }

    async fn payment_publishable_key(&self) -> Result<String> {
        let response: PublishableKeyResponse = self
            .json(
                ApiOperation::PaymentPublishableKey,
                self.request(Method::GET, "/payments/config"),
            )
            .await?;
        Ok(response.publishable_key)
    }

    async fn create_payment_intent(
        &self,
        event_id: &EventId,
        quantity: u32,
    ) -> Result<PaymentIntent> {
        self.json(
            ApiOperation::CreatePaymentIntent,
            self.request(Method::POST, "/payments/intents")
                .json(&PaymentIntentRequest { event_id, quantity }),
        )
        .await
    }

    async fn confirm_ticket_purchase(
        &self,
        event_id: &EventId,
        payment_intent_id: &str,
        quantity: u32,
    ) -> Result<Vec<Ticket>> {
        self.json(
            ApiOperation::ConfirmTicketPurchase,
            self.request(Method::POST, "/tickets/confirm")
                .json(&ConfirmPurchaseRequest {
                    event_id,
                    payment_intent_id,
                    quantity,
                }),
        )
        .await
    }

    async fn list_activation_codes(&self) -> Result<Vec<ActivationCode>> {
        self.json(
            ApiOperation::ListActivationCodes,
            self.request(Method::GET, "/admin/activation-codes"),
        )
        .await
    }

    async fn generate_activation_codes(
        &self,
        batch: &NewActivationBatch,
    ) -> Result<Vec<ActivationCode>> {
        self.json(
            ApiOperation::GenerateActivationCodes,
            self.request(Method::POST, "/admin/activation-codes/batches")
                .json(batch),
        )
        .await
    }

    async fn delete_activation_code(&self, id: &ActivationCodeId) -> Result<()> {
        let path = format!("/admin/activation-codes/{id}");
        self.empty(
            ApiOperation::DeleteActivationCode,
            self.request(Method::DELETE, &path),
        )
        .await
    }

    async fn list_quests(&self) -> Result<Vec<IcebreakerQuest>> {
        self.json(ApiOperation::ListQuests, self.request(Method::GET, "/admin/quests"))
            .await
    }

    async fn create_quest(&self, quest: &NewQuest) -> Result<IcebreakerQuest> {
        self.json(
            ApiOperation::CreateQuest,
            self.request(Method::POST, "/admin/quests").json(quest),
        )
        .await
    }

    async fn delete_quest(&self, id: &QuestId) -> Result<()> {
        let path = format!("/admin/quests/{id}");
        self.empty(ApiOperation::DeleteQuest, self.request(Method::DELETE, &path))
            .await
    }

    async fn list_verification_requests(&self) -> Result<Vec<VerificationRequest>> {
        self.json(
            ApiOperation::ListVerificationRequests,
            self.request(Method::GET, "/admin/verifications?status=pending"),
        )
        .await
    }

    async fn review_verification_request(
        &self,
        id: &VerificationId,
        decision: &ReviewDecision,
    ) -> Result<()> {
        let path = format!("/admin/verifications/{id}/review");
        self.empty(
            ApiOperation::ReviewVerificationRequest,
            self.request(Method::POST, &path).json(decision),
        )
        .await
    }

    async fn submit_verification_proof(
        &self,
        submission: &ProofSubmission,
    ) -> Result<VerificationRequest> {
        self.json(
            ApiOperation::SubmitVerificationProof,
            self.request(Method::POST, "/veteran/verifications")
                .json(submission),
        )
        .await
    }

    async fn list_friends(&self, user_id: &UserId) -> Result<Vec<Friend>> {
        let path = format!("/users/{user_id}/friends");
        self.json(ApiOperation::ListFriends, self.request(Method::GET, &path))
            .await
    }

    async fn list_scans(&self, user_id: &UserId) -> Result<Vec<Scan>> {
        let path = format!("/users/{user_id}/scans");
        self.json(ApiOperation::ListScans, self.request(Method::GET, &path))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ScanMeConfig::default().with_api_base_url("https://api.scanme.app/v1/");
        let client = HttpApiClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://api.scanme.app/v1");
    }

    #[tokio::test]
    async fn unreachable_host_is_remote_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let config = ScanMeConfig::default().with_api_base_url("http://127.0.0.1:9");
        let client = HttpApiClient::new(&config).unwrap();

        let error = client.list_posts().await.unwrap_err();
        assert!(matches!(
            error,
            ScanMeError::Remote {
                operation: "list_posts",
                ..
            }
        ));
    }
}
