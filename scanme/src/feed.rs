//! Home feed: posts and events merged into one timeline.
//!
//! Posts and events are fetched independently. Whenever either collection
//! changes, the two are merged into a single sequence ordered by a derived
//! timestamp, newest first. The merge is cached against the pair of
//! collection revisions, so actions that do not touch either collection
//! never re-derive it.
//!
//! A rendering failure of a single item is recorded as a boundary error for
//! the screen instead of tearing it down; `Reload` clears it and refetches.

use crate::environment::ScanMeEnvironment;
use crate::error::{Notification, ScanMeError};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::types::{Event, Post, RawTimestamp, normalize_timestamp};
use chrono::{DateTime, Utc};
use scanme_core::effect::Effect;
use scanme_core::reducer::Reducer;
use scanme_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// One item of the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    /// A video post
    Post(Post),
    /// An event listing
    Event(Event),
}

impl FeedItem {
    /// Key unique across both kinds, for list rendering and boundary errors.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Post(post) => format!("post:{}", post.id),
            Self::Event(event) => format!("event:{}", event.id),
        }
    }

    /// The raw date this item sorts by.
    #[must_use]
    pub const fn raw_date(&self) -> Option<&RawTimestamp> {
        match self {
            Self::Post(post) => post.created_at.as_ref(),
            Self::Event(event) => event.starts_at.as_ref(),
        }
    }
}

/// A timeline item with its resolved sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// The item
    pub item: FeedItem,
    /// Creation time for posts, start time for events, or merge time if
    /// the date did not parse
    pub sort_timestamp: DateTime<Utc>,
}

/// Merge posts and events into one timeline, newest first.
///
/// Items whose date is missing or does not parse sort as `now`. The sort is
/// stable, so equal timestamps keep concatenation order (posts before
/// events); callers must not rely on that.
#[must_use]
pub fn merge_feed(posts: &[Post], events: &[Event], now: DateTime<Utc>) -> Vec<FeedEntry> {
    let mut entries: Vec<FeedEntry> = posts
        .iter()
        .cloned()
        .map(FeedItem::Post)
        .chain(events.iter().cloned().map(FeedItem::Event))
        .map(|item| {
            let sort_timestamp = normalize_timestamp(item.raw_date(), now);
            FeedEntry {
                item,
                sort_timestamp,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.sort_timestamp.cmp(&a.sort_timestamp));
    entries
}

/// Which collection a load result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// Posts
    Posts,
    /// Events
    Events,
}

/// An item that failed to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryError {
    /// Key of the failing item
    pub key: String,
    /// What went wrong
    pub message: String,
}

/// Feed screen state.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    posts: Vec<Post>,
    events: Vec<Event>,
    posts_revision: u64,
    events_revision: u64,
    merged: Vec<FeedEntry>,
    merged_for: Option<(u64, u64)>,
    merge_count: u64,
    generation: u64,
    /// Posts request in flight
    pub posts_loading: bool,
    /// Events request in flight
    pub events_loading: bool,
    /// Transient message for the user
    pub notification: Option<Notification>,
    /// Set when an item failed to render; the screen offers a reload
    pub boundary_error: Option<BoundaryError>,
}

impl FeedState {
    /// The merged timeline.
    #[must_use]
    pub fn entries(&self) -> &[FeedEntry] {
        &self.merged
    }

    /// Loaded posts.
    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Loaded events.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// How many times the timeline was derived.
    #[must_use]
    pub const fn merge_count(&self) -> u64 {
        self.merge_count
    }

    /// Whether any request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.posts_loading || self.events_loading
    }

    fn refresh_merged(&mut self, now: DateTime<Utc>) {
        let revisions = (self.posts_revision, self.events_revision);
        if self.merged_for == Some(revisions) {
            return;
        }

        self.merged = merge_feed(&self.posts, &self.events, now);
        self.merged_for = Some(revisions);
        self.merge_count += 1;
    }
}

/// Feed screen actions.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedAction {
    /// Fetch posts and events
    Load,
    /// Posts arrived
    PostsLoaded {
        /// Load generation the request belonged to
        generation: u64,
        /// All posts
        posts: Vec<Post>,
    },
    /// Events arrived
    EventsLoaded {
        /// Load generation the request belonged to
        generation: u64,
        /// All events
        events: Vec<Event>,
    },
    /// One of the two fetches failed
    LoadFailed {
        /// Load generation the request belonged to
        generation: u64,
        /// Which fetch
        source: FeedSource,
        /// Why
        error: ScanMeError,
    },
    /// An item could not be rendered
    ItemRenderFailed {
        /// Key of the item
        key: String,
        /// Render error message
        message: String,
    },
    /// Clear the boundary error and fetch everything again
    Reload,
    /// Hide the notification
    DismissNotification,
}

/// Feed screen reducer.
#[derive(Debug, Clone)]
pub struct FeedReducer<A, I> {
    _phantom: PhantomData<(A, I)>,
}

impl<A, I> FeedReducer<A, I> {
    /// Create a new feed reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<A, I> Default for FeedReducer<A, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, I> FeedReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    fn load(
        state: &mut FeedState,
        env: &ScanMeEnvironment<A, I>,
    ) -> SmallVec<[Effect<FeedAction>; 4]> {
        state.generation += 1;
        state.posts_loading = true;
        state.events_loading = true;
        let generation = state.generation;

        let api = env.api.clone();
        let fetch_posts = Effect::future(async move {
            Some(match api.list_posts().await {
                Ok(posts) => FeedAction::PostsLoaded { generation, posts },
                Err(error) => FeedAction::LoadFailed {
                    generation,
                    source: FeedSource::Posts,
                    error,
                },
            })
        });

        let api = env.api.clone();
        let fetch_events = Effect::future(async move {
            Some(match api.list_events().await {
                Ok(events) => FeedAction::EventsLoaded { generation, events },
                Err(error) => FeedAction::LoadFailed {
                    generation,
                    source: FeedSource::Events,
                    error,
                },
            })
        });

        smallvec![fetch_posts, fetch_events]
    }
}

impl<A, I> Reducer for FeedReducer<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    type State = FeedState;
    type Action = FeedAction;
    type Environment = ScanMeEnvironment<A, I>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FeedAction::Load => Self::load(state, env),

            FeedAction::PostsLoaded { generation, posts } => {
                if generation != state.generation {
                    tracing::warn!(generation, current = state.generation, "Dropped stale posts");
                    return smallvec![Effect::None];
                }
                state.posts_loading = false;
                state.posts = posts;
                state.posts_revision += 1;
                state.refresh_merged(env.clock.now());
                smallvec![Effect::None]
            },

            FeedAction::EventsLoaded { generation, events } => {
                if generation != state.generation {
                    tracing::warn!(generation, current = state.generation, "Dropped stale events");
                    return smallvec![Effect::None];
                }
                state.events_loading = false;
                state.events = events;
                state.events_revision += 1;
                state.refresh_merged(env.clock.now());
                smallvec![Effect::None]
            },

            FeedAction::LoadFailed {
                generation,
                source,
                error,
            } => {
                if generation != state.generation {
                    return smallvec![Effect::None];
                }
                let context = match source {
                    FeedSource::Posts => {
                        state.posts_loading = false;
                        "Could not load posts"
                    },
                    FeedSource::Events => {
                        state.events_loading = false;
                        "Could not load events"
                    },
                };
                state.notification = Some(Notification::from_error(
                    context,
                    &error,
                    &env.config.support_contact,
                ));
                smallvec![Effect::None]
            },

            FeedAction::ItemRenderFailed { key, message } => {
                tracing::error!(%key, %message, "Feed item failed to render");
                state.boundary_error = Some(BoundaryError { key, message });
                smallvec![Effect::None]
            },

            FeedAction::Reload => {
                state.boundary_error = None;
                state.notification = None;
                Self::load(state, env)
            },

            FeedAction::DismissNotification => {
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
    use crate::test_support::{event, post, test_env};
    use chrono::TimeZone;
    use scanme_testing::effects::collect_actions;
    use scanme_testing::{ReducerTest, assertions};

    type TestReducer = FeedReducer<MockScanMeApi, SharedIdentity>;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn merge_orders_newest_first() {
        let posts = vec![post("p1", Some("2024-01-01T10:00:00Z")), post("p2", Some("2024-03-01"))];
        let events = vec![event("e1", Some("2024-02-01T00:00:00Z"))];

        let merged = merge_feed(&posts, &events, at(2025, 1, 1));
        let keys: Vec<String> = merged.iter().map(|e| e.item.key()).collect();

        assert_eq!(keys, vec!["post:p2", "event:e1", "post:p1"]);
    }

    #[test]
    fn unparsable_date_sorts_as_merge_time() {
        let now = at(2025, 1, 1);
        let posts = vec![post("bad", Some("not a date")), post("none", None)];
        let events = vec![event("old", Some("2020-01-01"))];

        let merged = merge_feed(&posts, &events, now);

        assert_eq!(merged[0].sort_timestamp, now);
        assert_eq!(merged[1].sort_timestamp, now);
        assert_eq!(merged[2].item.key(), "event:old");
    }

    #[test]
    fn epoch_and_unknown_date_shapes_merge() {
        let now = at(2025, 1, 1);
        let mut epoch = post("epoch", None);
        epoch.created_at = Some(RawTimestamp::PrefixedEpoch {
            seconds: at(2024, 6, 1).timestamp(),
            nanoseconds: 0,
        });
        let mut odd = event("odd", None);
        odd.starts_at = Some(RawTimestamp::Other(serde_json::json!({ "when": "soon" })));
        let posts = vec![epoch, post("text", Some("2024-03-01"))];

        let merged = merge_feed(&posts, &[odd], now);
        let order: Vec<(String, DateTime<Utc>)> = merged
            .iter()
            .map(|e| (e.item.key(), e.sort_timestamp))
            .collect();

        assert_eq!(
            order,
            vec![
                ("event:odd".to_string(), now),
                ("post:epoch".to_string(), at(2024, 6, 1)),
                ("post:text".to_string(), at(2024, 3, 1)),
            ]
        );
    }

    #[tokio::test]
    async fn load_fetches_both_collections_independently() {
        let api = MockScanMeApi::new()
            .with_posts(vec![post("p1", Some("2024-01-01"))])
            .with_events(vec![event("e1", Some("2024-02-01"))]);

        let (state, effects) = ReducerTest::new(TestReducer::new())
            .with_env(test_env(api.clone(), None))
            .given_state(FeedState::default())
            .when_action(FeedAction::Load)
            .then_state(|s| assert!(s.is_loading()))
            .then_effects(|effects| assertions::assert_effects_count(effects, 2))
            .run_and_take();

        let actions = collect_actions(effects).await;
        assert_eq!(
            actions,
            vec![
                FeedAction::PostsLoaded {
                    generation: state.generation,
                    posts: vec![post("p1", Some("2024-01-01"))],
                },
                FeedAction::EventsLoaded {
                    generation: state.generation,
                    events: vec![event("e1", Some("2024-02-01"))],
                },
            ]
        );
        assert_eq!(api.calls(ApiOperation::ListPosts), 1);
        assert_eq!(api.calls(ApiOperation::ListEvents), 1);
    }

    #[test]
    fn loaded_collections_are_merged_once_per_revision() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), None))
            .given_state(FeedState::default())
            .when_action(FeedAction::Load)
            .when_action(FeedAction::PostsLoaded {
                generation: 1,
                posts: vec![post("p1", Some("2024-01-01"))],
            })
            .when_action(FeedAction::EventsLoaded {
                generation: 1,
                events: vec![event("e1", Some("2024-02-01"))],
            })
            .when_action(FeedAction::DismissNotification)
            .when_action(FeedAction::ItemRenderFailed {
                key: "post:p1".into(),
                message: "bad video".into(),
            })
            .then_state(|s| {
                assert_eq!(s.entries().len(), 2);
                assert_eq!(s.entries()[0].item.key(), "event:e1");
                assert_eq!(s.merge_count(), 2);
                assert!(!s.is_loading());
            })
            .run();
    }

    #[test]
    fn stale_generation_is_dropped() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), None))
            .given_state(FeedState::default())
            .when_action(FeedAction::Load)
            .when_action(FeedAction::Load)
            .when_action(FeedAction::PostsLoaded {
                generation: 1,
                posts: vec![post("late", None)],
            })
            .then_state(|s| {
                assert!(s.posts().is_empty());
                assert!(s.posts_loading);
                assert_eq!(s.merge_count(), 0);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn failure_keeps_last_good_data() {
        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), None))
            .given_state(FeedState::default())
            .when_action(FeedAction::Load)
            .when_action(FeedAction::PostsLoaded {
                generation: 1,
                posts: vec![post("p1", None)],
            })
            .when_action(FeedAction::Load)
            .when_action(FeedAction::LoadFailed {
                generation: 2,
                source: FeedSource::Posts,
                error: ScanMeError::Remote {
                    operation: "list_posts",
                    message: "offline".into(),
                },
            })
            .then_state(|s| {
                assert_eq!(s.posts().len(), 1);
                assert!(!s.posts_loading);
                let notification = s.notification.as_ref().unwrap();
                assert!(notification.message.starts_with("Could not load posts"));
            })
            .run();
    }

    #[test]
    fn reload_clears_boundary_error_and_refetches() {
        let mut state = FeedState::default();
        state.boundary_error = Some(BoundaryError {
            key: "post:p1".into(),
            message: "bad".into(),
        });

        ReducerTest::new(TestReducer::new())
            .with_env(test_env(MockScanMeApi::new(), None))
            .given_state(state)
            .when_action(FeedAction::Reload)
            .then_state(|s| {
                assert!(s.boundary_error.is_none());
                assert!(s.is_loading());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }
}
