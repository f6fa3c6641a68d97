//! Live check-in wall of one event.
//!
//! On `Start` the wall fetches every check-in of the event and then polls at
//! a fixed interval, replacing the list wholesale on each successful read.
//! The poll timer is a cancellable effect; `Stop` aborts it and bumps the
//! poll generation so that a tick or response already in flight is ignored.
//!
//! The viewer's own record is found by scanning the list for their user id.
//! Status changes follow a small transition table:
//!
//! ```text
//! none  ──CheckInHere──▶ here      none  ──MarkGoing──▶ going
//! going ──CheckInHere──▶ here      here/going ──CheckOut──▶ none
//! ```
//!
//! Check-out is applied locally before the remote call and is not rolled
//! back if the call fails; the next poll reconciles.

use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{
    CheckIn, CheckInRecord, CheckInRequest, CheckInStatus, EventId, UserId, Visibility,
};
use scanme_core::effect::{Effect, EffectId};
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Longest icebreaker, in characters after trimming.
pub const MAX_ICEBREAKER_CHARS: usize = 140;

/// Most tags on one check-in.
pub const MAX_TAGS: usize = 5;

/// Longest tag, in characters.
pub const MAX_TAG_CHARS: usize = 24;

/// Which records the wall lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallTab {
    /// Only people at the venue
    #[default]
    HereNow,
    /// Everyone who checked in or is going
    Everyone,
}

/// Check the fields of a rich check-in and build the request.
///
/// The icebreaker is trimmed and dropped when blank. Tags are trimmed and
/// blank ones dropped before counting.
///
/// # Errors
///
/// Returns [`ScanMeError::Validation`] when the icebreaker or a tag is too
/// long, or when there are too many tags.
pub fn validate_check_in(
    icebreaker: Option<&str>,
    visibility: Visibility,
    tags: &[String],
) -> Result<CheckInRequest, ScanMeError> {
    let icebreaker = icebreaker.map(str::trim).filter(|text| !text.is_empty());
    if let Some(text) = icebreaker {
        if text.chars().count() > MAX_ICEBREAKER_CHARS {
            return Err(ScanMeError::validation(format!(
                "Icebreaker must be at most {MAX_ICEBREAKER_CHARS} characters"
            )));
        }
    }

    let tags: Vec<String> = tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();

    if tags.len() > MAX_TAGS {
        return Err(ScanMeError::validation(format!(
            "At most {MAX_TAGS} tags are allowed"
        )));
    }
    if let Some(tag) = tags.iter().find(|tag| tag.chars().count() > MAX_TAG_CHARS) {
        return Err(ScanMeError::validation(format!(
            "Tag \"{tag}\" is longer than {MAX_TAG_CHARS} characters"
        )));
    }

    Ok(CheckInRequest {
        status: CheckInStatus::Here,
        icebreaker: icebreaker.map(str::to_string),
        visibility,
        tags,
    })
}

/// Check-in wall state.
#[derive(Debug, Clone, Default)]
pub struct PresenceState {
    event_id: Option<EventId>,
    viewer: Option<UserId>,
    check_ins: Vec<CheckIn>,
    generation: u64,
    polling: bool,
    fetch_seq: u64,
    applied_seq: u64,
    /// Initial fetch in flight
    pub loading: bool,
    /// A status change is in flight
    pub saving: bool,
    /// Active tab
    pub tab: WallTab,
    /// Inline message for a rejected status change
    pub validation_error: Option<String>,
    /// Transient message for the user
    pub notification: Option<Notification>,
}

impl PresenceState {
    /// Event the wall shows.
    #[must_use]
    pub const fn event_id(&self) -> Option<&EventId> {
        self.event_id.as_ref()
    }

    /// Whether the poll timer is running.
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.polling
    }

    /// Every record, newest first, anonymous ones included.
    #[must_use]
    pub fn check_ins(&self) -> &[CheckIn] {
        &self.check_ins
    }

    /// The viewer's own record.
    #[must_use]
    pub fn own_check_in(&self) -> Option<&CheckIn> {
        let viewer = self.viewer.as_ref()?;
        self.check_ins.iter().find(|c| &c.user_id == viewer)
    }

    /// The viewer's own status.
    #[must_use]
    pub fn own_status(&self) -> Option<CheckInStatus> {
        self.own_check_in().map(|c| c.status)
    }

    /// Records listed on the active tab; anonymous ones never are.
    #[must_use]
    pub fn visible_check_ins(&self) -> Vec<&CheckIn> {
        self.check_ins
            .iter()
            .filter(|c| c.visibility != Visibility::Anonymous)
            .filter(|c| match self.tab {
                WallTab::HereNow => c.status == CheckInStatus::Here,
                WallTab::Everyone => true,
            })
            .collect()
    }

    /// Everyone at the venue, anonymous records included.
    #[must_use]
    pub fn here_count(&self) -> usize {
        self.count(CheckInStatus::Here)
    }

    /// Everyone going, anonymous records included.
    #[must_use]
    pub fn going_count(&self) -> usize {
        self.count(CheckInStatus::Going)
    }

    fn count(&self, status: CheckInStatus) -> usize {
        self.check_ins.iter().filter(|c| c.status == status).count()
    }

    /// Response identity check: same event and poll generation.
    fn is_current(&self, event_id: &EventId, generation: u64) -> bool {
        self.event_id.as_ref() == Some(event_id) && self.generation == generation
    }

    /// Supersede every fetch issued so far.
    fn invalidate_fetches(&mut self) {
        self.applied_seq = self.fetch_seq;
    }

    fn sort(&mut self) {
        self.check_ins.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}

/// Check-in wall actions.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceAction {
    /// Open the wall for an event and start polling
    Start {
        /// Event to show
        event_id: EventId,
    },
    /// Close the wall and stop polling
    Stop,
    /// Poll timer fired
    PollTick {
        /// Poll generation the timer belongs to
        generation: u64,
    },
    /// A fetch succeeded
    CheckInsLoaded {
        /// Event fetched
        event_id: EventId,
        /// Poll generation at request time
        generation: u64,
        /// Fetch sequence number
        seq: u64,
        /// Every record of the event
        records: Vec<CheckInRecord>,
    },
    /// A fetch failed
    CheckInsFailed {
        /// Event fetched
        event_id: EventId,
        /// Poll generation at request time
        generation: u64,
        /// Why
        error: ScanMeError,
    },
    /// Check in at the venue with a rich profile
    CheckInHere {
        /// Conversation starter
        icebreaker: Option<String>,
        /// Who may see the record
        visibility: Visibility,
        /// Interest tags
        tags: Vec<String>,
    },
    /// Announce attendance
    MarkGoing,
    /// Remove the viewer's record
    CheckOut,
    /// Upsert succeeded
    CheckInSaved {
        /// Event written to
        event_id: EventId,
        /// Poll generation at request time
        generation: u64,
        /// The stored record
        record: CheckInRecord,
    },
    /// Upsert failed
    CheckInFailed {
        /// Event written to
        event_id: EventId,
        /// Poll generation at request time
        generation: u64,
        /// Why
        error: ScanMeError,
    },
    /// Delete succeeded
    CheckOutConfirmed {
        /// Event written to
        event_id: EventId,
        /// Poll generation at request time
        generation: u64,
    },
    /// Delete failed
    CheckOutFailed {
        /// Event written to
        event_id: EventId,
        /// Poll generation at request time
        generation: u64,
        /// Why
        error: ScanMeError,
    },
    /// Switch tabs
    SelectTab(WallTab),
    /// Hide the notification
    DismissNotification,
}

/// Check-in wall reducer.
#[derive(Debug, Clone)]
pub struct PresenceReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> PresenceReducer<A, I> {
    /// Create a new presence reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for PresenceReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation id of the poll timer of `event_id`.
#[must_use]
pub fn poll_timer_id(event_id: &EventId) -> EffectId {
    EffectId::new(format!("presence-poll:{event_id}"))
}

type Effects = SmallVec<[Effect<PresenceAction>; 4]>;

impl<A, I> PresenceReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    fn fetch(state: &mut PresenceState, env: &ScanMeEnvironment<A, I>) -> Effect<PresenceAction> {
        let Some(event_id) = state.event_id.clone() else {
            return Effect::None;
        };
        state.fetch_seq += 1;
        let seq = state.fetch_seq;
        let generation = state.generation;
        let api = env.api.clone();

        Effect::future(async move {
            Some(match api.list_check_ins(&event_id).await {
                Ok(records) => PresenceAction::CheckInsLoaded {
                    event_id,
                    generation,
                    seq,
                    records,
                },
                Err(error) => PresenceAction::CheckInsFailed {
                    event_id,
                    generation,
                    error,
                },
            })
        })
    }

    fn schedule_poll(
        state: &PresenceState,
        env: &ScanMeEnvironment<A, I>,
    ) -> Effect<PresenceAction> {
        let Some(event_id) = state.event_id.as_ref() else {
            return Effect::None;
        };

        Effect::Delay {
            duration: env.config.poll_interval,
            action: Box::new(PresenceAction::PollTick {
                generation: state.generation,
            }),
        }
        .cancellable(poll_timer_id(event_id))
    }

    fn reject(state: &mut PresenceState, error: &ScanMeError) -> Effects {
        tracing::warn!(%error, "Rejected check-in change");
        state.validation_error = Some(error.to_string());
        smallvec![Effect::None]
    }

    fn upsert(
        state: &mut PresenceState,
        env: &ScanMeEnvironment<A, I>,
        viewer: UserId,
        request: CheckInRequest,
    ) -> Effects {
        let Some(event_id) = state.event_id.clone() else {
            return smallvec![Effect::None];
        };
        state.saving = true;
        state.validation_error = None;
        let generation = state.generation;
        let api = env.api.clone();

        smallvec![Effect::future(async move {
            Some(match api.upsert_check_in(&event_id, &viewer, &request).await {
                Ok(record) => PresenceAction::CheckInSaved {
                    event_id,
                    generation,
                    record,
                },
                Err(error) => PresenceAction::CheckInFailed {
                    event_id,
                    generation,
                    error,
                },
            })
        })]
    }

    fn viewer(state: &PresenceState) -> Result<UserId, ScanMeError> {
        state
            .viewer
            .clone()
            .ok_or_else(|| ScanMeError::Unauthorized("sign in to check in".to_string()))
    }
}

impl<A, I> Reducer for PresenceReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = PresenceState;
    type Action = PresenceAction;
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
            // Lifecycle
            // ═══════════════════════════════════════════════════════════════
            PresenceAction::Start { event_id } => {
                let mut effects: Effects = SmallVec::new();
                if let Some(previous) = state.event_id.as_ref() {
                    effects.push(Effect::Cancel(poll_timer_id(previous)));
                    if previous != &event_id {
                        state.check_ins.clear();
                    }
                }

                state.event_id = Some(event_id);
                state.viewer = env.identity.current().map(|identity| identity.user_id);
                state.generation += 1;
                state.polling = true;
                state.loading = true;
                state.invalidate_fetches();

                effects.push(Self::fetch(state, env));
                effects.push(Self::schedule_poll(state, env));
                effects
            },

            PresenceAction::Stop => {
                state.polling = false;
                state.generation += 1;
                state.loading = false;
                state.saving = false;
                state.invalidate_fetches();

                match state.event_id.as_ref() {
                    Some(event_id) => smallvec![Effect::Cancel(poll_timer_id(event_id))],
                    None => smallvec![Effect::None],
                }
            },

            PresenceAction::PollTick { generation } => {
                if !state.polling || generation != state.generation {
                    tracing::debug!(generation, "Ignored stale poll tick");
                    return smallvec![Effect::None];
                }
                smallvec![Self::fetch(state, env), Self::schedule_poll(state, env)]
            },

            // ═══════════════════════════════════════════════════════════════
            // Poll results
            // ═══════════════════════════════════════════════════════════════
            PresenceAction::CheckInsLoaded {
                event_id,
                generation,
                seq,
                records,
            } => {
                if !state.is_current(&event_id, generation) || seq <= state.applied_seq {
                    tracing::warn!(%event_id, generation, seq, "Dropped stale check-in list");
                    return smallvec![Effect::None];
                }

                let now = env.clock.now();
                state.check_ins = records
                    .into_iter()
                    .map(|record| record.normalize(now))
                    .collect();
                state.sort();
                state.applied_seq = seq;
                state.loading = false;
                smallvec![Effect::None]
            },

            PresenceAction::CheckInsFailed {
                event_id,
                generation,
                error,
            } => {
                if !state.is_current(&event_id, generation) {
                    return smallvec![Effect::None];
                }
                state.loading = false;
                state.notification = Some(Notification::from_error(
                    "Could not refresh check-ins",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Status changes
            // ═══════════════════════════════════════════════════════════════
            PresenceAction::CheckInHere {
                icebreaker,
                visibility,
                tags,
            } => {
                let viewer = match Self::viewer(state) {
                    Ok(viewer) => viewer,
                    Err(error) => return Self::reject(state, &error),
                };
                if state.own_status() == Some(CheckInStatus::Here) {
                    return Self::reject(
                        state,
                        &ScanMeError::validation("You are already checked in; check out first"),
                    );
                }

                match validate_check_in(icebreaker.as_deref(), visibility, &tags) {
                    Ok(request) => Self::upsert(state, env, viewer, request),
                    Err(error) => Self::reject(state, &error),
                }
            },

            PresenceAction::MarkGoing => {
                let viewer = match Self::viewer(state) {
                    Ok(viewer) => viewer,
                    Err(error) => return Self::reject(state, &error),
                };
                if state.own_status().is_some() {
                    return Self::reject(
                        state,
                        &ScanMeError::validation("You already have a check-in for this event"),
                    );
                }
                Self::upsert(state, env, viewer, CheckInRequest::going())
            },

            PresenceAction::CheckOut => {
                let viewer = match Self::viewer(state) {
                    Ok(viewer) => viewer,
                    Err(error) => return Self::reject(state, &error),
                };
                let Some(event_id) = state.event_id.clone() else {
                    return smallvec![Effect::None];
                };
                if state.own_status().is_none() {
                    return Self::reject(state, &ScanMeError::validation("You are not checked in"));
                }

                state.check_ins.retain(|c| c.user_id != viewer);
                state.invalidate_fetches();
                state.saving = true;
                state.validation_error = None;

                let generation = state.generation;
                let api = env.api.clone();
                smallvec![Effect::future(async move {
                    Some(match api.remove_check_in(&event_id, &viewer).await {
                        Ok(()) => PresenceAction::CheckOutConfirmed {
                            event_id,
                            generation,
                        },
                        Err(error) => PresenceAction::CheckOutFailed {
                            event_id,
                            generation,
                            error,
                        },
                    })
                })]
            },

            // ═══════════════════════════════════════════════════════════════
            // Status change results
            // ═══════════════════════════════════════════════════════════════
            PresenceAction::CheckInSaved {
                event_id,
                generation,
                record,
            } => {
                if !state.is_current(&event_id, generation) {
                    tracing::warn!(%event_id, "Dropped late check-in confirmation");
                    return smallvec![Effect::None];
                }
                state.saving = false;

                let own = record.normalize(env.clock.now());
                state.check_ins.retain(|c| c.user_id != own.user_id);
                state.check_ins.push(own);
                state.sort();
                state.invalidate_fetches();

                smallvec![Self::fetch(state, env)]
            },

            PresenceAction::CheckInFailed {
                event_id,
                generation,
                error,
            } => {
                if !state.is_current(&event_id, generation) {
                    return smallvec![Effect::None];
                }
                state.saving = false;
                state.notification = Some(Notification::from_error(
                    "Check-in failed",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            PresenceAction::CheckOutConfirmed {
                event_id,
                generation,
            } => {
                if state.is_current(&event_id, generation) {
                    state.saving = false;
                }
                smallvec![Effect::None]
            },

            PresenceAction::CheckOutFailed {
                event_id,
                generation,
                error,
            } => {
                if !state.is_current(&event_id, generation) {
                    return smallvec![Effect::None];
                }
                // No rollback: the next poll restores the record if it still exists.
                state.saving = false;
                state.notification = Some(Notification::from_error(
                    "Check-out failed",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // View
            // ═══════════════════════════════════════════════════════════════
            PresenceAction::SelectTab(tab) => {
                state.tab = tab;
                smallvec![Effect::None]
            },

            PresenceAction::DismissNotification => {
                state.notification = None;
                state.validation_error = None;
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
    use crate::test_support::{record, test_env, user};
    use scanme_testing::effects::collect_actions;
    use scanme_testing::{ReducerTest, assertions};

    type TestReducer = PresenceReducer<MockScanMeApi, SharedIdentity>;

    fn event() -> EventId {
        EventId::new("launch")
    }

    fn loaded(generation: u64, seq: u64, records: Vec<CheckInRecord>) -> PresenceAction {
        PresenceAction::CheckInsLoaded {
            event_id: event(),
            generation,
            seq,
            records,
        }
    }

    fn start() -> PresenceAction {
        PresenceAction::Start { event_id: event() }
    }

    #[test]
    fn start_fetches_and_schedules_cancellable_poll() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .then_state(|s| {
                assert!(s.is_polling());
                assert!(s.loading);
                assert_eq!(s.event_id(), Some(&event()));
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_future_effect(effects);
                assertions::assert_has_cancellable_delay(effects, "presence-poll:launch");
            })
            .run();
    }

    #[test]
    fn stop_cancels_timer_and_drops_late_results() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(PresenceAction::Stop)
            .then_effects(|effects| assertions::assert_cancels(effects, "presence-poll:launch"))
            .run();

        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(PresenceAction::Stop)
            .when_action(loaded(
                1,
                1,
                vec![record("bo", CheckInStatus::Here, Visibility::Public, 10)],
            ))
            .when_action(PresenceAction::PollTick { generation: 1 })
            .then_state(|s| {
                assert!(!s.is_polling());
                assert!(s.check_ins().is_empty());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn tick_refetches_and_reschedules() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), None))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(PresenceAction::PollTick { generation: 1 })
            .then_state(|s| assert_eq!(s.fetch_seq, 2))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_cancellable_delay(effects, "presence-poll:launch");
            })
            .run();
    }

    #[test]
    fn fetch_replaces_list_sorted_newest_first() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(loaded(
                1,
                1,
                vec![
                    record("bo", CheckInStatus::Here, Visibility::Public, 100),
                    record("ada", CheckInStatus::Going, Visibility::Public, 300),
                    record("cy", CheckInStatus::Here, Visibility::Public, 200),
                ],
            ))
            .then_state(|s| {
                let order: Vec<&str> = s.check_ins().iter().map(|c| c.user_id.as_str()).collect();
                assert_eq!(order, vec!["ada", "cy", "bo"]);
                assert_eq!(s.own_status(), Some(CheckInStatus::Going));
                assert!(!s.loading);
            })
            .run();
    }

    #[test]
    fn here_now_hides_anonymous_but_counts_them() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("viewer"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(loaded(
                1,
                1,
                vec![
                    record("a", CheckInStatus::Here, Visibility::Public, 10),
                    record("b", CheckInStatus::Here, Visibility::Anonymous, 20),
                ],
            ))
            .when_action(PresenceAction::SelectTab(WallTab::HereNow))
            .then_state(|s| {
                let listed: Vec<&str> = s
                    .visible_check_ins()
                    .iter()
                    .map(|c| c.user_id.as_str())
                    .collect();
                assert_eq!(listed, vec!["a"]);
                assert_eq!(s.here_count(), 2);
            })
            .run();
    }

    #[test]
    fn everyone_tab_lists_going_but_not_anonymous() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), None))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(loaded(
                1,
                1,
                vec![
                    record("a", CheckInStatus::Here, Visibility::FriendsOnly, 10),
                    record("b", CheckInStatus::Going, Visibility::Public, 20),
                    record("c", CheckInStatus::Going, Visibility::Anonymous, 30),
                ],
            ))
            .when_action(PresenceAction::SelectTab(WallTab::Everyone))
            .then_state(|s| {
                assert_eq!(s.visible_check_ins().len(), 2);
                assert_eq!(s.going_count(), 2);
            })
            .run();
    }

    #[test]
    fn here_record_only_allows_check_out() {
        let here = vec![record("ada", CheckInStatus::Here, Visibility::Public, 10)];

        for action in [
            PresenceAction::MarkGoing,
            PresenceAction::CheckInHere {
                icebreaker: None,
                visibility: Visibility::Public,
                tags: vec![],
            },
        ] {
            ReducerTest::new(TestReducer::new())
                .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
                .given_state(PresenceState::default())
                .when_action(start())
                .when_action(loaded(1, 1, here.clone()))
                .when_action(action)
                .then_state(|s| {
                    assert!(s.validation_error.is_some());
                    assert!(!s.saving);
                })
                .then_effects(assertions::assert_no_effects)
                .run();
        }
    }

    #[test]
    fn going_record_can_upgrade_to_here() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(loaded(
                1,
                1,
                vec![record("ada", CheckInStatus::Going, Visibility::Public, 10)],
            ))
            .when_action(PresenceAction::CheckInHere {
                icebreaker: Some("Ask me about Rust".into()),
                visibility: Visibility::Public,
                tags: vec!["rust".into()],
            })
            .then_state(|s| assert!(s.saving))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn check_out_without_record_is_rejected() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(PresenceAction::CheckOut)
            .then_state(|s| assert!(s.validation_error.is_some()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn signed_out_viewer_cannot_check_in() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), None))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(PresenceAction::MarkGoing)
            .then_state(|s| assert!(s.validation_error.as_ref().unwrap().contains("sign in")))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn check_out_removes_only_own_record_optimistically() {
        let api = MockScanMeApi::new().with_check_ins(
            &event(),
            vec![
                record("ada", CheckInStatus::Going, Visibility::Public, 10),
                record("bo", CheckInStatus::Going, Visibility::Public, 20),
            ],
        );

        let (state, effects) = ReducerTest::new(TestReducer::new())
            .with_env(test_env(api.clone(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(loaded(1, 1, api.check_ins(&event())))
            .when_action(PresenceAction::CheckOut)
            .then_state(|s| {
                let remaining: Vec<&str> =
                    s.check_ins().iter().map(|c| c.user_id.as_str()).collect();
                assert_eq!(remaining, vec!["bo"]);
                assert!(s.own_status().is_none());
            })
            .run_and_take();

        let actions = collect_actions(effects).await;
        assert_eq!(
            actions,
            vec![PresenceAction::CheckOutConfirmed {
                event_id: event(),
                generation: state.generation,
            }]
        );
        let server: Vec<String> = api
            .check_ins(&event())
            .into_iter()
            .map(|r| r.user_id.to_string())
            .collect();
        assert_eq!(server, vec!["bo"]);
    }

    #[test]
    fn failed_check_out_is_not_rolled_back() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(loaded(
                1,
                1,
                vec![record("ada", CheckInStatus::Here, Visibility::Public, 10)],
            ))
            .when_action(PresenceAction::CheckOut)
            .when_action(PresenceAction::CheckOutFailed {
                event_id: event(),
                generation: 1,
                error: ScanMeError::Remote {
                    operation: "remove_check_in",
                    message: "offline".into(),
                },
            })
            .then_state(|s| {
                assert!(s.own_status().is_none());
                assert!(!s.saving);
                assert!(s.notification.is_some());
            })
            .run();
    }

    #[test]
    fn fetch_issued_before_check_out_is_dropped() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(loaded(
                1,
                1,
                vec![record("ada", CheckInStatus::Here, Visibility::Public, 10)],
            ))
            // Tick issues fetch #2, then the user checks out before it returns.
            .when_action(PresenceAction::PollTick { generation: 1 })
            .when_action(PresenceAction::CheckOut)
            .when_action(loaded(
                1,
                2,
                vec![record("ada", CheckInStatus::Here, Visibility::Public, 10)],
            ))
            .then_state(|s| assert!(s.own_status().is_none()))
            .run();
    }

    #[tokio::test]
    async fn saved_check_in_triggers_refetch() {
        let api = MockScanMeApi::new();
        let (_, effects) = ReducerTest::new(TestReducer::new())
            .with_env(test_env(api.clone(), Some(user("ada"))))
            .given_state(PresenceState::default())
            .when_action(start())
            .when_action(PresenceAction::CheckInSaved {
                event_id: event(),
                generation: 1,
                record: record("ada", CheckInStatus::Here, Visibility::Public, 50),
            })
            .then_state(|s| {
                assert_eq!(s.own_status(), Some(CheckInStatus::Here));
                assert!(!s.saving);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run_and_take();

        collect_actions(effects).await;
        assert_eq!(api.calls(ApiOperation::ListCheckIns), 1);
    }

    #[test]
    fn validation_limits() {
        let long = "x".repeat(MAX_ICEBREAKER_CHARS + 1);
        assert!(validate_check_in(Some(&long), Visibility::Public, &[]).is_err());

        let padded = format!("  {}  ", "x".repeat(MAX_ICEBREAKER_CHARS));
        assert!(validate_check_in(Some(&padded), Visibility::Public, &[]).is_ok());

        let too_many: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        assert!(validate_check_in(None, Visibility::Public, &too_many).is_err());

        let long_tag = vec!["y".repeat(MAX_TAG_CHARS + 1)];
        assert!(validate_check_in(None, Visibility::Public, &long_tag).is_err());

        let with_blanks = vec![" rust ".to_string(), "   ".to_string(), String::new()];
        let request = validate_check_in(Some("   "), Visibility::Anonymous, &with_blanks).unwrap();
        assert_eq!(request.tags, vec!["rust"]);
        assert_eq!(request.icebreaker, None);
        assert_eq!(request.status, CheckInStatus::Here);
    }
}
