//! Missions.
//!
//! A fixed list of gamification goals evaluated against the user's friend
//! list and scan history. Progress is derived on every read and never
//! stored.

use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{Friend, Scan, UserId};
use scanme_core::effect::Effect;
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Collection a mission counts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionSource {
    /// The friend list
    Friends,
    /// The scan history
    Scans,
}

/// How progress is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionRule {
    /// Every entry counts
    Count(MissionSource),
    /// Entries whose name or tags contain the keyword, ignoring case
    Keyword {
        /// Collection to search
        source: MissionSource,
        /// Text to look for
        keyword: &'static str,
    },
}

/// A mission definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mission {
    /// Stable id
    pub id: &'static str,
    /// Short title
    pub title: &'static str,
    /// What to do
    pub description: &'static str,
    /// Entries needed to complete
    pub target: u32,
    /// Counting rule
    pub rule: MissionRule,
}

/// Missions shipped with the app.
pub const MISSIONS: &[Mission] = &[
    Mission {
        id: "first-friends",
        title: "Making Friends",
        description: "Connect with 5 people",
        target: 5,
        rule: MissionRule::Count(MissionSource::Friends),
    },
    Mission {
        id: "social-butterfly",
        title: "Social Butterfly",
        description: "Connect with 25 people",
        target: 25,
        rule: MissionRule::Count(MissionSource::Friends),
    },
    Mission {
        id: "scanner",
        title: "Scanner",
        description: "Scan 10 codes",
        target: 10,
        rule: MissionRule::Count(MissionSource::Scans),
    },
    Mission {
        id: "music-lover",
        title: "Music Lover",
        description: "Meet 3 people into music",
        target: 3,
        rule: MissionRule::Keyword {
            source: MissionSource::Friends,
            keyword: "music",
        },
    },
    Mission {
        id: "booth-hopper",
        title: "Booth Hopper",
        description: "Scan 5 booths",
        target: 5,
        rule: MissionRule::Keyword {
            source: MissionSource::Scans,
            keyword: "booth",
        },
    },
];

/// Progress of one mission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionProgress {
    /// Mission id
    pub mission_id: &'static str,
    /// Mission title
    pub title: &'static str,
    /// Entries counted, never above `target`
    pub current: u32,
    /// Entries needed
    pub target: u32,
    /// `current >= target`
    pub is_completed: bool,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn friend_matches(friend: &Friend, keyword: &str) -> bool {
    contains_ignore_case(&friend.display_name, keyword)
        || friend.tags.iter().any(|t| contains_ignore_case(t, keyword))
}

fn scan_matches(scan: &Scan, keyword: &str) -> bool {
    contains_ignore_case(&scan.name, keyword)
        || scan
            .tag
            .as_deref()
            .is_some_and(|t| contains_ignore_case(t, keyword))
}

/// Evaluate `missions` against the user's social data.
#[must_use]
pub fn evaluate_missions(
    missions: &[Mission],
    friends: &[Friend],
    scans: &[Scan],
) -> Vec<MissionProgress> {
    missions
        .iter()
        .map(|mission| {
            let matched = match mission.rule {
                MissionRule::Count(MissionSource::Friends) => friends.len(),
                MissionRule::Count(MissionSource::Scans) => scans.len(),
                MissionRule::Keyword { source, keyword } => {
                    let keyword = keyword.to_lowercase();
                    match source {
                        MissionSource::Friends => {
                            friends.iter().filter(|f| friend_matches(f, &keyword)).count()
                        },
                        MissionSource::Scans => {
                            scans.iter().filter(|s| scan_matches(s, &keyword)).count()
                        },
                    }
                },
            };
            let current = u32::try_from(matched)
                .unwrap_or(u32::MAX)
                .min(mission.target);

            MissionProgress {
                mission_id: mission.id,
                title: mission.title,
                current,
                target: mission.target,
                is_completed: current >= mission.target,
            }
        })
        .collect()
}

/// Missions screen state.
#[derive(Debug, Clone, Default)]
pub struct MissionsState {
    friends: Vec<Friend>,
    scans: Vec<Scan>,
    owner: Option<UserId>,
    generation: u64,
    /// Requests of the latest load still in flight
    pub pending: u8,
    /// Transient message for the user
    pub notification: Option<Notification>,
}

impl MissionsState {
    /// Progress of every shipped mission.
    #[must_use]
    pub fn progress(&self) -> Vec<MissionProgress> {
        evaluate_missions(MISSIONS, &self.friends, &self.scans)
    }

    /// Whether any fetch is still running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending > 0
    }

    /// User the loaded friends and scans belong to.
    #[must_use]
    pub const fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }
}

/// Missions screen actions.
#[derive(Debug, Clone, PartialEq)]
pub enum MissionsAction {
    /// Fetch friends and scans of the signed-in user
    Load,
    /// Friend list arrived
    FriendsLoaded {
        /// Load generation the request belonged to
        generation: u64,
        /// User the request was made for
        user_id: UserId,
        /// Friends
        friends: Vec<Friend>,
    },
    /// Scan history arrived
    ScansLoaded {
        /// Load generation the request belonged to
        generation: u64,
        /// User the request was made for
        user_id: UserId,
        /// Scans
        scans: Vec<Scan>,
    },
    /// A fetch failed
    LoadFailed {
        /// Load generation the request belonged to
        generation: u64,
        /// User the request was made for
        user_id: UserId,
        /// Why
        error: ScanMeError,
    },
}

/// Missions screen reducer.
#[derive(Debug, Clone)]
pub struct MissionsReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> MissionsReducer<A, I> {
    /// Create a new missions reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for MissionsReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, I> MissionsReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    /// Settle one response of a load. Returns whether its payload applies:
    /// it must belong to the latest load and to the user still signed in.
    fn settle(
        state: &mut MissionsState,
        env: &ScanMeEnvironment<A, I>,
        generation: u64,
        user_id: &UserId,
    ) -> bool {
        if generation != state.generation {
            tracing::warn!(generation, current = state.generation, "Dropped stale missions data");
            return false;
        }
        state.pending = state.pending.saturating_sub(1);

        let current = env.identity.current().map(|identity| identity.user_id);
        if current.as_ref() != Some(user_id) {
            tracing::warn!(%user_id, "Dropped missions data for a signed-out user");
            return false;
        }
        true
    }
}

impl<A, I> Reducer for MissionsReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = MissionsState;
    type Action = MissionsAction;
    type Environment = ScanMeEnvironment<A, I>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            MissionsAction::Load => {
                let identity = match env.signed_in() {
                    Ok(identity) => identity,
                    Err(error) => {
                        state.notification = Some(Notification::error(error.to_string()));
                        return smallvec![Effect::None];
                    },
                };
                if state.owner.as_ref() != Some(&identity.user_id) {
                    state.friends.clear();
                    state.scans.clear();
                    state.owner = Some(identity.user_id.clone());
                }
                state.generation += 1;
                state.pending = 2;

                let generation = state.generation;
                let friends_api = env.api.clone();
                let friends_user = identity.user_id.clone();
                let scans_api = env.api.clone();
                let scans_user = identity.user_id;

                smallvec![
                    Effect::future(async move {
                        Some(match friends_api.list_friends(&friends_user).await {
                            Ok(friends) => MissionsAction::FriendsLoaded {
                                generation,
                                user_id: friends_user,
                                friends,
                            },
                            Err(error) => MissionsAction::LoadFailed {
                                generation,
                                user_id: friends_user,
                                error,
                            },
                        })
                    }),
                    Effect::future(async move {
                        Some(match scans_api.list_scans(&scans_user).await {
                            Ok(scans) => MissionsAction::ScansLoaded {
                                generation,
                                user_id: scans_user,
                                scans,
                            },
                            Err(error) => MissionsAction::LoadFailed {
                                generation,
                                user_id: scans_user,
                                error,
                            },
                        })
                    }),
                ]
            },

            MissionsAction::FriendsLoaded {
                generation,
                user_id,
                friends,
            } => {
                if Self::settle(state, env, generation, &user_id) {
                    state.friends = friends;
                }
                smallvec![Effect::None]
            },

            MissionsAction::ScansLoaded {
                generation,
                user_id,
                scans,
            } => {
                if Self::settle(state, env, generation, &user_id) {
                    state.scans = scans;
                }
                smallvec![Effect::None]
            },

            MissionsAction::LoadFailed {
                generation,
                user_id,
                error,
            } => {
                if !Self::settle(state, env, generation, &user_id) {
                    return smallvec![Effect::None];
                }
                state.notification = Some(Notification::from_error(
                    "Could not load missions",
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },
        }
    }
}
