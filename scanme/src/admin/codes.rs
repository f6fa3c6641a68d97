//! Activation code panel.
//!
//! Admins generate labelled batches of single-use codes and delete codes
//! that should no longer be redeemable. A freshly generated batch is kept
//! apart from the list so the host can print its QR payloads.

use super::{FetchTracker, gate};
use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{ActivationCode, ActivationCodeId, NewActivationBatch, QrPayload};
use scanme_core::effect::Effect;
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Activation code panel state.
#[derive(Debug, Clone, Default)]
pub struct ActivationCodesState {
    codes: Vec<ActivationCode>,
    fetch: FetchTracker,
    /// List fetch in flight
    pub loading: bool,
    /// Batch generation in flight
    pub generating: bool,
    /// Codes returned by the last successful batch
    pub last_batch: Vec<ActivationCode>,
    /// Inline message for rejected input
    pub validation_error: Option<String>,
    /// Transient message for the admin
    pub notification: Option<Notification>,
}

impl ActivationCodesState {
    /// Codes, newest first.
    #[must_use]
    pub fn codes(&self) -> &[ActivationCode] {
        &self.codes
    }

    /// Codes not yet redeemed.
    #[must_use]
    pub fn unredeemed_count(&self) -> usize {
        self.codes.iter().filter(|c| !c.redeemed).count()
    }

    /// QR payloads of the last generated batch, for printing.
    #[must_use]
    pub fn batch_qr_payloads(&self) -> Vec<QrPayload> {
        self.last_batch
            .iter()
            .map(|c| QrPayload::for_code(&c.code))
            .collect()
    }
}

/// Activation code panel actions.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationCodesAction {
    /// Fetch the list
    Load,
    /// List arrived
    Loaded {
        /// Fetch number
        seq: u64,
        /// All codes
        codes: Vec<ActivationCode>,
    },
    /// List fetch failed
    LoadFailed {
        /// Fetch number
        seq: u64,
        /// Why
        error: ScanMeError,
    },
    /// Create a batch of codes
    GenerateBatch {
        /// How many codes
        count: u32,
        /// Label printed with the batch
        batch_label: String,
    },
    /// Batch created
    BatchGenerated {
        /// The new codes
        codes: Vec<ActivationCode>,
    },
    /// Batch creation failed
    GenerateFailed {
        /// Why
        error: ScanMeError,
    },
    /// Delete one code
    Delete {
        /// Code to delete
        id: ActivationCodeId,
    },
    /// Remote delete succeeded
    Deleted {
        /// Deleted code
        id: ActivationCodeId,
    },
    /// Remote delete failed
    DeleteFailed {
        /// Code that could not be deleted
        id: ActivationCodeId,
        /// Why
        error: ScanMeError,
    },
    /// Clear the notification
    DismissNotification,
}

/// Activation code panel reducer.
#[derive(Debug, Clone)]
pub struct ActivationCodesReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> ActivationCodesReducer<A, I> {
    /// Create a new activation code reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for ActivationCodesReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, I> ActivationCodesReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    fn fetch(
        state: &mut ActivationCodesState,
        env: &ScanMeEnvironment<A, I>,
    ) -> Effect<ActivationCodesAction> {
        state.loading = true;
        let seq = state.fetch.issue();
        let api = env.api.clone();

        Effect::future(async move {
            Some(match api.list_activation_codes().await {
                Ok(codes) => ActivationCodesAction::Loaded { seq, codes },
                Err(error) => ActivationCodesAction::LoadFailed { seq, error },
            })
        })
    }

    fn validate(
        count: u32,
        batch_label: &str,
        max_batch_size: u32,
    ) -> Result<NewActivationBatch, ScanMeError> {
        if !(1..=max_batch_size).contains(&count) {
            return Err(ScanMeError::validation(format!(
                "Batch size must be between 1 and {max_batch_size}"
            )));
        }
        let batch_label = batch_label.trim();
        if batch_label.is_empty() {
            return Err(ScanMeError::validation("Batch label is required"));
        }
        Ok(NewActivationBatch {
            count,
            batch_label: batch_label.to_string(),
        })
    }
}

impl<A, I> Reducer for ActivationCodesReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = ActivationCodesState;
    type Action = ActivationCodesAction;
    type Environment = ScanMeEnvironment<A, I>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // Load
            // ═══════════════════════════════════════════════════════════════
            ActivationCodesAction::Load => {
                if let Err(notification) = gate(env) {
                    state.notification = Some(notification);
                    return smallvec![Effect::None];
                }
                smallvec![Self::fetch(state, env)]
            },

            ActivationCodesAction::Loaded { seq, mut codes } => {
                if state.fetch.is_latest(seq) {
                    state.loading = false;
                }
                if !state.fetch.accept(seq) {
                    tracing::warn!(seq, "Dropped stale activation code list");
                    return smallvec![Effect::None];
                }
                codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                state.codes = codes;
                smallvec![Effect::None]
            },

            ActivationCodesAction::LoadFailed { seq, error } => {
                if state.fetch.is_latest(seq) {
                    state.loading = false;
                    state.notification = Some(Notification::from_error(
                        "Could not load activation codes",
                        &error,
                        &env.config.support_contact,
                    ));
                }
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Create: validate, then refetch on success
            // ═══════════════════════════════════════════════════════════════
            ActivationCodesAction::GenerateBatch { count, batch_label } => {
                if let Err(notification) = gate(env) {
                    state.notification = Some(notification);
                    return smallvec![Effect::None];
                }
                if state.generating {
                    return smallvec![Effect::None];
                }
                let batch = match Self::validate(count, &batch_label, env.config.max_batch_size) {
                    Ok(batch) => batch,
                    Err(error) => {
                        state.validation_error = Some(error.to_string());
                        return smallvec![Effect::None];
                    },
                };

                state.validation_error = None;
                state.generating = true;
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(match api.generate_activation_codes(&batch).await {
                        Ok(codes) => ActivationCodesAction::BatchGenerated { codes },
                        Err(error) => ActivationCodesAction::GenerateFailed { error },
                    })
                })]
            },

            ActivationCodesAction::BatchGenerated { codes } => {
                tracing::info!(count = codes.len(), "Activation codes generated");
                state.generating = false;
                state.notification = Some(Notification::info(format!(
                    "Generated {} activation code(s)",
                    codes.len()
                )));
                state.last_batch = codes;
                smallvec![Self::fetch(state, env)]
            },

            ActivationCodesAction::GenerateFailed { error } => {
                state.generating = false;
                state.notification = Some(Notification::from_error(
                    "Could not generate codes",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Delete: optimistic, no rollback
            // ═══════════════════════════════════════════════════════════════
            ActivationCodesAction::Delete { id } => {
                if let Err(notification) = gate(env) {
                    state.notification = Some(notification);
                    return smallvec![Effect::None];
                }

                state.codes.retain(|c| c.id != id);
                state.last_batch.retain(|c| c.id != id);
                state.fetch.invalidate();
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(match api.delete_activation_code(&id).await {
                        Ok(()) => ActivationCodesAction::Deleted { id },
                        Err(error) => ActivationCodesAction::DeleteFailed { id, error },
                    })
                })]
            },

            ActivationCodesAction::Deleted { id } => {
                tracing::debug!(%id, "Activation code deleted");
                smallvec![Effect::None]
            },

            ActivationCodesAction::DeleteFailed { id, error } => {
                tracing::warn!(%id, %error, "Activation code delete failed");
                state.notification = Some(Notification::from_error(
                    "Could not delete code",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            ActivationCodesAction::DismissNotification => {
                state.notification = None;
                smallvec![Effect::None]
            },
        }
    }
}
