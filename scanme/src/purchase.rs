//! Ticket purchase dialog.
//!
//! A two-step state machine around the hosted payment widget:
//!
//! ```text
//! QuantitySelection ──ProceedToPayment──▶ (create intent) ──▶ Payment
//!        ▲                                     │ failure            │
//!        └─────────────────────────────────────┘                    │
//!                                   PaymentSucceeded ──▶ confirm purchase
//!                                                        ├─ ok: tickets issued
//!                                                        └─ err: support required
//! ```
//!
//! The widget's success callback is the only trigger for the confirmation
//! call. When that call fails the money has already moved, so the failure is
//! reported as a support case and never offered as a retry.
//!
//! Every dialog session has an attempt number; intent and key responses
//! from an earlier attempt are ignored. Confirmation results are always
//! applied, since they describe money that already moved. Every created
//! intent is remembered as a charge across `Close`, so a widget success
//! that arrives after the dialog was dismissed still confirms the purchase.

use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{Event, EventId, PaymentIntent, Ticket};
use scanme_core::effect::Effect;
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Step of the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurchaseStep {
    /// Choosing how many tickets
    #[default]
    QuantitySelection,
    /// Payment widget shown
    Payment,
}

/// A payment intent the widget may capture.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Charge {
    payment_intent_id: String,
    event_id: EventId,
    quantity: u32,
    confirming: bool,
}

/// Purchase dialog state.
#[derive(Debug, Clone)]
pub struct PurchaseState {
    event: Option<Event>,
    attempt: u64,
    client_secret: Option<String>,
    payment_intent_id: Option<String>,
    publishable_key: Option<String>,
    charges: Vec<Charge>,
    /// Current step
    pub step: PurchaseStep,
    /// Number of tickets
    pub quantity: u32,
    /// Intent creation in flight
    pub creating_intent: bool,
    /// Confirmation call in flight
    pub confirming: bool,
    /// Tickets issued by this dialog
    pub tickets: Vec<Ticket>,
    /// Inline message for rejected input
    pub validation_error: Option<String>,
    /// Last message from the payment widget
    pub widget_error: Option<String>,
    /// Transient message for the user
    pub notification: Option<Notification>,
}

impl Default for PurchaseState {
    fn default() -> Self {
        Self {
            event: None,
            attempt: 0,
            client_secret: None,
            payment_intent_id: None,
            publishable_key: None,
            charges: Vec::new(),
            step: PurchaseStep::QuantitySelection,
            quantity: 1,
            creating_intent: false,
            confirming: false,
            tickets: Vec::new(),
            validation_error: None,
            widget_error: None,
            notification: None,
        }
    }
}

impl PurchaseState {
    /// Event being purchased.
    #[must_use]
    pub const fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    /// Secret the widget is mounted with, during the payment step.
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    /// Key the widget is initialised with.
    #[must_use]
    pub fn publishable_key(&self) -> Option<&str> {
        self.publishable_key.as_deref()
    }

    /// Price of the selected quantity in cents.
    #[must_use]
    pub fn total_cents(&self) -> u64 {
        self.event
            .as_ref()
            .map_or(0, |event| event.price_cents.saturating_mul(u64::from(self.quantity)))
    }

    fn reset(&mut self) {
        self.attempt += 1;
        self.step = PurchaseStep::QuantitySelection;
        self.quantity = 1;
        self.client_secret = None;
        self.payment_intent_id = None;
        self.creating_intent = false;
        self.validation_error = None;
        self.widget_error = None;
    }
}

/// Purchase dialog actions.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseAction {
    /// Open the dialog for an event
    Open {
        /// Event to buy tickets for
        event: Event,
    },
    /// Widget key arrived
    PublishableKeyLoaded {
        /// Attempt the request belonged to
        attempt: u64,
        /// Publishable key
        key: String,
    },
    /// Widget key could not be loaded
    PublishableKeyFailed {
        /// Attempt the request belonged to
        attempt: u64,
        /// Why
        error: ScanMeError,
    },
    /// Set the quantity directly
    SetQuantity {
        /// Requested quantity
        quantity: u32,
    },
    /// One more ticket
    IncrementQuantity,
    /// One fewer ticket
    DecrementQuantity,
    /// Create the payment intent and show the widget
    ProceedToPayment,
    /// Intent created
    PaymentIntentCreated {
        /// Attempt the request belonged to
        attempt: u64,
        /// The intent
        intent: PaymentIntent,
    },
    /// Intent creation failed
    PaymentIntentFailed {
        /// Attempt the request belonged to
        attempt: u64,
        /// Why
        error: ScanMeError,
    },
    /// Widget reports a captured payment
    PaymentSucceeded {
        /// Intent the widget confirmed
        payment_intent_id: String,
    },
    /// Widget reports a declined or aborted payment
    PaymentFailed {
        /// Widget message
        message: String,
    },
    /// Tickets issued
    PurchaseConfirmed {
        /// The new tickets
        tickets: Vec<Ticket>,
    },
    /// Payment captured but issuance failed
    FulfillmentFailed {
        /// Why the confirmation call failed
        error: ScanMeError,
    },
    /// Dismiss the dialog
    Close,
}

/// Purchase dialog reducer.
#[derive(Debug, Clone)]
pub struct PurchaseReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> PurchaseReducer<A, I> {
    /// Create a new purchase reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for PurchaseReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, I> PurchaseReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    fn set_quantity(
        state: &mut PurchaseState,
        env: &ScanMeEnvironment<A, I>,
        quantity: u32,
    ) -> SmallVec<[Effect<PurchaseAction>; 4]> {
        if state.step != PurchaseStep::QuantitySelection {
            return smallvec![Effect::None];
        }

        let max = env.config.max_ticket_quantity;
        if (1..=max).contains(&quantity) {
            state.quantity = quantity;
            state.validation_error = None;
        } else {
            state.validation_error = Some(format!("Choose between 1 and {max} tickets"));
        }
        smallvec![Effect::None]
    }
}

impl<A, I> Reducer for PurchaseReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = PurchaseState;
    type Action = PurchaseAction;
    type Environment = ScanMeEnvironment<A, I>;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // Open: reset and load the widget key
            // ═══════════════════════════════════════════════════════════════
            PurchaseAction::Open { event } => {
                state.reset();
                state.event = Some(event);
                state.notification = None;

                let attempt = state.attempt;
                let api = env.api.clone();
                smallvec![Effect::future(async move {
                    Some(match api.payment_publishable_key().await {
                        Ok(key) => PurchaseAction::PublishableKeyLoaded { attempt, key },
                        Err(error) => PurchaseAction::PublishableKeyFailed { attempt, error },
                    })
                })]
            },

            PurchaseAction::PublishableKeyLoaded { attempt, key } => {
                if attempt == state.attempt {
                    state.publishable_key = Some(key);
                }
                smallvec![Effect::None]
            },

            PurchaseAction::PublishableKeyFailed { attempt, error } => {
                if attempt == state.attempt {
                    state.notification = Some(Notification::from_error(
                        "Payments are unavailable",
                        &error,
                        &env.config.support_contact,
                    ));
                }
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Quantity selection
            // ═══════════════════════════════════════════════════════════════
            PurchaseAction::SetQuantity { quantity } => Self::set_quantity(state, env, quantity),

            PurchaseAction::IncrementQuantity => {
                let next = state.quantity.saturating_add(1);
                Self::set_quantity(state, env, next)
            },

            PurchaseAction::DecrementQuantity => {
                let next = state.quantity.saturating_sub(1);
                Self::set_quantity(state, env, next)
            },

            // ═══════════════════════════════════════════════════════════════
            // QuantitySelection → Payment
            // ═══════════════════════════════════════════════════════════════
            PurchaseAction::ProceedToPayment => {
                if state.step != PurchaseStep::QuantitySelection || state.creating_intent {
                    return smallvec![Effect::None];
                }
                if let Err(error) = env.signed_in() {
                    state.validation_error = Some(error.to_string());
                    return smallvec![Effect::None];
                }
                let Some(event_id) = state.event.as_ref().map(|event| event.id.clone()) else {
                    return smallvec![Effect::None];
                };
                if state.publishable_key.is_none() {
                    state.validation_error = Some("Payment is not available yet".to_string());
                    return smallvec![Effect::None];
                }

                state.creating_intent = true;
                state.validation_error = None;
                let attempt = state.attempt;
                let quantity = state.quantity;
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(match api.create_payment_intent(&event_id, quantity).await {
                        Ok(intent) => PurchaseAction::PaymentIntentCreated { attempt, intent },
                        Err(error) => PurchaseAction::PaymentIntentFailed { attempt, error },
                    })
                })]
            },

            PurchaseAction::PaymentIntentCreated { attempt, intent } => {
                if attempt != state.attempt {
                    tracing::warn!(
                        attempt,
                        current = state.attempt,
                        "Dropped stale payment intent"
                    );
                    return smallvec![Effect::None];
                }
                let Some(event_id) = state.event.as_ref().map(|event| event.id.clone()) else {
                    return smallvec![Effect::None];
                };
                state.creating_intent = false;
                state.charges.push(Charge {
                    payment_intent_id: intent.id.clone(),
                    event_id,
                    quantity: state.quantity,
                    confirming: false,
                });
                state.client_secret = Some(intent.client_secret);
                state.payment_intent_id = Some(intent.id);
                state.step = PurchaseStep::Payment;
                smallvec![Effect::None]
            },

            PurchaseAction::PaymentIntentFailed { attempt, error } => {
                if attempt != state.attempt {
                    return smallvec![Effect::None];
                }
                state.creating_intent = false;
                state.notification = Some(Notification::from_error(
                    "Could not start checkout",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Widget outcome
            // ═══════════════════════════════════════════════════════════════
            PurchaseAction::PaymentSucceeded { payment_intent_id } => {
                let Some(charge) = state
                    .charges
                    .iter_mut()
                    .find(|charge| charge.payment_intent_id == payment_intent_id)
                else {
                    tracing::error!(%payment_intent_id, "Payment captured for an unknown intent");
                    state.notification =
                        Some(Notification::support_required(&env.config.support_contact));
                    return smallvec![Effect::None];
                };
                if charge.confirming {
                    tracing::warn!(%payment_intent_id, "Ignored repeated payment success");
                    return smallvec![Effect::None];
                }

                charge.confirming = true;
                let event_id = charge.event_id.clone();
                let quantity = charge.quantity;
                state.confirming = true;
                state.widget_error = None;
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(
                        match api
                            .confirm_ticket_purchase(&event_id, &payment_intent_id, quantity)
                            .await
                        {
                            Ok(tickets) => PurchaseAction::PurchaseConfirmed { tickets },
                            Err(error) => PurchaseAction::FulfillmentFailed { error },
                        },
                    )
                })]
            },

            PurchaseAction::PaymentFailed { message } => {
                if state.step != PurchaseStep::Payment {
                    return smallvec![Effect::None];
                }
                state.notification =
                    Some(Notification::error(format!("Payment failed: {message}")));
                state.widget_error = Some(message);
                smallvec![Effect::None]
            },

            PurchaseAction::PurchaseConfirmed { tickets } => {
                tracing::info!(count = tickets.len(), "Tickets issued");
                state.confirming = false;
                state.notification = Some(Notification::info(format!(
                    "{} ticket(s) added to your wallet",
                    tickets.len()
                )));
                state.tickets.extend(tickets);
                smallvec![Effect::None]
            },

            PurchaseAction::FulfillmentFailed { error } => {
                tracing::error!(%error, "Payment captured but fulfillment failed");
                state.confirming = false;
                let error = ScanMeError::FulfillmentFailed {
                    message: error.to_string(),
                };
                state.notification = Some(Notification::from_error(
                    "Purchase",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Close: reset, never reverses a payment
            // ═══════════════════════════════════════════════════════════════
            PurchaseAction::Close => {
                state.reset();
                state.event = None;
                smallvec![Effect::None]
            },
        }
    }
}
