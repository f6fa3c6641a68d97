//! Veteran hub.
//!
//! Users apply for veteran status by uploading a proof document; admins
//! review it in the queue of [`crate::admin::verification`]. The hub itself
//! is open to veterans and admins only.

use crate::config::ScanMeConfig;
use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, Result, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{Identity, ProofSubmission, VerificationRequest, VerificationStatus};
use scanme_core::effect::Effect;
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// MIME types accepted as proof.
pub const ACCEPTED_PROOF_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];

/// Whether `identity` may open the hub.
#[must_use]
pub const fn can_access_hub(identity: &Identity) -> bool {
    identity.is_veteran || identity.is_admin
}

/// Check a proof file before upload.
///
/// # Errors
///
/// Returns [`ScanMeError::Validation`] for an unsupported type, an empty
/// file, or a file larger than `max_proof_bytes`.
pub fn validate_proof_upload(
    file_name: &str,
    content_type: &str,
    size_bytes: u64,
    config: &ScanMeConfig,
) -> Result<()> {
    if file_name.trim().is_empty() {
        return Err(ScanMeError::validation("Choose a file to upload"));
    }
    let content_type = content_type.trim().to_ascii_lowercase();
    if !ACCEPTED_PROOF_TYPES.contains(&content_type.as_str()) {
        return Err(ScanMeError::validation(
            "Proof must be a JPEG, PNG or PDF file",
        ));
    }
    if size_bytes == 0 {
        return Err(ScanMeError::validation("The file is empty"));
    }
    if size_bytes > config.max_proof_bytes {
        return Err(ScanMeError::validation(format!(
            "The file is larger than {} MiB",
            config.max_proof_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Proof submission state.
#[derive(Debug, Clone, Default)]
pub struct VeteranState {
    /// The submitted request, once accepted by the API
    pub submission: Option<VerificationRequest>,
    /// Upload call in flight
    pub submitting: bool,
    /// Inline message for a rejected file
    pub validation_error: Option<String>,
    /// Transient message for the user
    pub notification: Option<Notification>,
}

impl VeteranState {
    /// Whether a submission is waiting for review.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.submission
            .as_ref()
            .is_some_and(|r| r.status == VerificationStatus::Pending)
    }
}

/// Proof submission actions.
#[derive(Debug, Clone, PartialEq)]
pub enum VeteranAction {
    /// Send a proof document for review
    SubmitProof {
        /// The uploaded document
        proof: ProofSubmission,
    },
    /// The API queued the request
    ProofSubmitted {
        /// Queued request
        request: VerificationRequest,
    },
    /// Submission failed
    SubmitFailed {
        /// Why
        error: ScanMeError,
    },
    /// Clear the notification
    DismissNotification,
}

/// Proof submission reducer.
#[derive(Debug, Clone)]
pub struct VeteranReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> VeteranReducer<A, I> {
    /// Create a new veteran reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for VeteranReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, I> Reducer for VeteranReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = VeteranState;
    type Action = VeteranAction;
    type Environment = ScanMeEnvironment<A, I>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            VeteranAction::SubmitProof { proof } => {
                if state.submitting || state.is_pending() {
                    return smallvec![Effect::None];
                }
                if let Err(error) = env.signed_in() {
                    state.validation_error = Some(error.to_string());
                    return smallvec![Effect::None];
                }
                if let Err(error) = validate_proof_upload(
                    &proof.file_name,
                    &proof.content_type,
                    proof.size_bytes,
                    &env.config,
                ) {
                    state.validation_error = Some(error.to_string());
                    return smallvec![Effect::None];
                }

                state.validation_error = None;
                state.submitting = true;
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(match api.submit_verification_proof(&proof).await {
                        Ok(request) => VeteranAction::ProofSubmitted { request },
                        Err(error) => VeteranAction::SubmitFailed { error },
                    })
                })]
            },

            VeteranAction::ProofSubmitted { request } => {
                tracing::info!(id = %request.id, "Proof submitted for review");
                state.submitting = false;
                state.submission = Some(request);
                state.notification = Some(Notification::info(
                    "Thanks! An admin will review your proof shortly",
                ));
                smallvec![Effect::None]
            },

            VeteranAction::SubmitFailed { error } => {
                state.submitting = false;
                state.notification = Some(Notification::from_error(
                    "Could not submit proof",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            VeteranAction::DismissNotification => {
                state.notification = None;
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockScanMeApi;
    use crate::providers::{ApiOperation, SharedIdentity};
    use crate::test_support::{admin, test_env, user};
    use scanme_testing::effects::collect_actions;
    use scanme_testing::{ReducerTest, assertions};

    type TestReducer = VeteranReducer<MockScanMeApi, SharedIdentity>;

    fn proof(content_type: &str, size_bytes: u64) -> ProofSubmission {
        ProofSubmission {
            file_name: "dd214.pdf".into(),
            content_type: content_type.into(),
            size_bytes,
            proof_url: "https://files.scanme.app/dd214.pdf".into(),
        }
    }

    #[test]
    fn hub_is_for_veterans_and_admins() {
        let mut veteran = user("vet");
        veteran.is_veteran = true;

        assert!(can_access_hub(&veteran));
        assert!(can_access_hub(&admin("root")));
        assert!(!can_access_hub(&user("ada")));
    }

    #[test]
    fn upload_rules() {
        let config = ScanMeConfig::default();
        let max = config.max_proof_bytes;

        assert!(validate_proof_upload("a.pdf", "application/pdf", 1024, &config).is_ok());
        assert!(validate_proof_upload("a.png", "IMAGE/PNG", max, &config).is_ok());
        assert!(validate_proof_upload("a.gif", "image/gif", 1024, &config).is_err());
        assert!(validate_proof_upload("a.jpg", "image/jpeg", 0, &config).is_err());
        assert!(validate_proof_upload("a.jpg", "image/jpeg", max + 1, &config).is_err());
        assert!(validate_proof_upload(" ", "image/jpeg", 10, &config).is_err());
    }

    #[test]
    fn invalid_file_is_rejected_locally() {
        let api = MockScanMeApi::new();
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(api.clone(), Some(user("ada"))))
            .given_state(VeteranState::default())
            .when_action(VeteranAction::SubmitProof {
                proof: proof("text/plain", 10),
            })
            .then_state(|s| assert!(s.validation_error.is_some()))
            .then_effects(assertions::assert_no_effects)
            .run();
        assert_eq!(api.calls(ApiOperation::SubmitVerificationProof), 0);
    }

    #[tokio::test]
    async fn submitted_proof_is_pending() {
        let me = user("ada");
        let api = MockScanMeApi::new().with_submitter(&me.user_id);
        let env = test_env(api, Some(me));

        let (state, effects) = ReducerTest::new(TestReducer::new())
            .with_env(env.clone())
            .given_state(VeteranState::default())
            .when_action(VeteranAction::SubmitProof {
                proof: proof("application/pdf", 2048),
            })
            .then_state(|s| assert!(s.submitting))
            .run_and_take();
        let submitted = collect_actions(effects).await.into_iter().next().unwrap();

        ReducerTest::new(TestReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(submitted)
            .when_action(VeteranAction::SubmitProof {
                proof: proof("application/pdf", 2048),
            })
            .then_state(|s| {
                assert!(s.is_pending());
                assert!(!s.submitting);
                assert_eq!(s.submission.as_ref().unwrap().user_id.as_str(), "ada");
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
