//! Icebreaker quest panel.

use super::{FetchTracker, gate};
use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{IcebreakerQuest, NewQuest, QuestId};
use scanme_core::effect::Effect;
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Quest panel state.
#[derive(Debug, Clone, Default)]
pub struct QuestsState {
    quests: Vec<IcebreakerQuest>,
    fetch: FetchTracker,
    /// List fetch in flight
    pub loading: bool,
    /// Create call in flight
    pub creating: bool,
    /// Inline message for rejected input
    pub validation_error: Option<String>,
    /// Transient message for the admin
    pub notification: Option<Notification>,
}

impl QuestsState {
    /// Quests in server order.
    #[must_use]
    pub fn quests(&self) -> &[IcebreakerQuest] {
        &self.quests
    }

    /// Quests currently offered to users.
    pub fn active(&self) -> impl Iterator<Item = &IcebreakerQuest> {
        self.quests.iter().filter(|q| q.active)
    }
}

/// Quest panel actions.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestsAction {
    /// Fetch the list
    Load,
    /// List arrived
    Loaded {
        /// Fetch number
        seq: u64,
        /// All quests
        quests: Vec<IcebreakerQuest>,
    },
    /// List fetch failed
    LoadFailed {
        /// Fetch number
        seq: u64,
        /// Why
        error: ScanMeError,
    },
    /// Create a quest
    Create {
        /// Short title
        title: String,
        /// Question shown to attendees
        prompt: String,
        /// Reward
        points: u32,
    },
    /// Quest created
    Created {
        /// The new quest
        quest: IcebreakerQuest,
    },
    /// Create failed
    CreateFailed {
        /// Why
        error: ScanMeError,
    },
    /// Delete a quest
    Delete {
        /// Quest to delete
        id: QuestId,
    },
    /// Remote delete succeeded
    Deleted {
        /// Deleted quest
        id: QuestId,
    },
    /// Remote delete failed
    DeleteFailed {
        /// Quest that could not be deleted
        id: QuestId,
        /// Why
        error: ScanMeError,
    },
    /// Clear the notification
    DismissNotification,
}

/// Quest panel reducer.
#[derive(Debug, Clone)]
pub struct QuestsReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> QuestsReducer<A, I> {
    /// Create a new quest reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for QuestsReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, I> QuestsReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    fn fetch(state: &mut QuestsState, env: &ScanMeEnvironment<A, I>) -> Effect<QuestsAction> {
        state.loading = true;
        let seq = state.fetch.issue();
        let api = env.api.clone();

        Effect::future(async move {
            Some(match api.list_quests().await {
                Ok(quests) => QuestsAction::Loaded { seq, quests },
                Err(error) => QuestsAction::LoadFailed { seq, error },
            })
        })
    }
}

/// Trim and check a new quest.
///
/// # Errors
///
/// Returns [`ScanMeError::Validation`] when the title or prompt is blank.
pub fn validate_quest(title: &str, prompt: &str, points: u32) -> Result<NewQuest, ScanMeError> {
    let title = title.trim();
    let prompt = prompt.trim();
    if title.is_empty() {
        return Err(ScanMeError::validation("Quest title is required"));
    }
    if prompt.is_empty() {
        return Err(ScanMeError::validation("Quest prompt is required"));
    }
    Ok(NewQuest {
        title: title.to_string(),
        prompt: prompt.to_string(),
        points,
    })
}

impl<A, I> Reducer for QuestsReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = QuestsState;
    type Action = QuestsAction;
    type Environment = ScanMeEnvironment<A, I>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            QuestsAction::Load => {
                if let Err(notification) = gate(env) {
                    state.notification = Some(notification);
                    return smallvec![Effect::None];
                }
                smallvec![Self::fetch(state, env)]
            },

            QuestsAction::Loaded { seq, quests } => {
                if state.fetch.is_latest(seq) {
                    state.loading = false;
                }
                if state.fetch.accept(seq) {
                    state.quests = quests;
                } else {
                    tracing::warn!(seq, "Dropped stale quest list");
                }
                smallvec![Effect::None]
            },

            QuestsAction::LoadFailed { seq, error } => {
                if state.fetch.is_latest(seq) {
                    state.loading = false;
                    state.notification = Some(Notification::from_error(
                        "Could not load quests",
                        &error,
                        &env.config.support_contact,
                    ));
                }
                smallvec![Effect::None]
            },

            QuestsAction::Create {
                title,
                prompt,
                points,
            } => {
                if let Err(notification) = gate(env) {
                    state.notification = Some(notification);
                    return smallvec![Effect::None];
                }
                if state.creating {
                    return smallvec![Effect::None];
                }
                let quest = match validate_quest(&title, &prompt, points) {
                    Ok(quest) => quest,
                    Err(error) => {
                        state.validation_error = Some(error.to_string());
                        return smallvec![Effect::None];
                    },
                };

                state.validation_error = None;
                state.creating = true;
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(match api.create_quest(&quest).await {
                        Ok(quest) => QuestsAction::Created { quest },
                        Err(error) => QuestsAction::CreateFailed { error },
                    })
                })]
            },

            QuestsAction::Created { quest } => {
                tracing::info!(id = %quest.id, "Quest created");
                state.creating = false;
                state.notification =
                    Some(Notification::info(format!("Created \"{}\"", quest.title)));
                smallvec![Self::fetch(state, env)]
            },

            QuestsAction::CreateFailed { error } => {
                state.creating = false;
                state.notification = Some(Notification::from_error(
                    "Could not create quest",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            QuestsAction::Delete { id } => {
                if let Err(notification) = gate(env) {
                    state.notification = Some(notification);
                    return smallvec![Effect::None];
                }

                state.quests.retain(|q| q.id != id);
                state.fetch.invalidate();
                let api = env.api.clone();

                smallvec![Effect::future(async move {
                    Some(match api.delete_quest(&id).await {
                        Ok(()) => QuestsAction::Deleted { id },
                        Err(error) => QuestsAction::DeleteFailed { id, error },
                    })
                })]
            },

            QuestsAction::Deleted { id } => {
                tracing::debug!(%id, "Quest deleted");
                smallvec![Effect::None]
            },

            QuestsAction::DeleteFailed { id, error } => {
                tracing::warn!(%id, %error, "Quest delete failed");
                state.notification = Some(Notification::from_error(
                    "Could not delete quest",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            QuestsAction::DismissNotification => {
                state.notification = None;
                smallvec![Effect::None]
            },
        }
    }
}
