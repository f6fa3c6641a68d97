//! # ScanMe Testing
//!
//! Testing utilities for the ScanMe state containers.
//!
//! This crate provides:
//! - A pinned [`Clock`] for deterministic timestamps
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - [`effects::collect_actions`], which runs returned effects without a store
//!
//! ## Example
//!
//! ```ignore
//! use scanme_testing::{effects::collect_actions, test_clock, ReducerTest};
//!
//! #[tokio::test]
//! async fn load_requests_both_collections() {
//!     let (_, effects) = ReducerTest::new(FeedReducer::new())
//!         .with_env(test_environment())
//!         .given_state(FeedState::default())
//!         .when_action(FeedAction::Load)
//!         .run_and_take();
//!
//!     let actions = collect_actions(effects).await;
//!     assert_eq!(actions.len(), 2);
//! }
//! ```

use chrono::{DateTime, Utc};
use scanme_core::environment::Clock;


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the pinned time until [`FixedClock::set`] moves it.
    ///
    /// # Example
    ///
    /// ```
    /// use scanme_testing::mocks::FixedClock;
    /// use scanme_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2);
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clone for FixedClock {
        fn clone(&self) -> Self {
            Self::new(self.now())
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Running effects outside a store
pub mod effects {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use scanme_core::effect::Effect;

    /// Execute `effects` and return every action they produce
    ///
    /// Futures are awaited one after another in declaration order. Delays
    /// yield their action immediately. Cancel effects are ignored. Produced
    /// actions are returned, not reduced, so a test decides what to feed
    /// back.
    pub async fn collect_actions<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut actions = Vec::new();
        for effect in effects {
            actions.extend(run(effect).await);
        }
        actions
    }

    fn run<A: Send + 'static>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>> {
        async move {
            match effect {
                Effect::None | Effect::Cancel(_) => Vec::new(),
                Effect::Future(fut) => fut.await.into_iter().collect(),
                Effect::Delay { action, .. } => vec![*action],
                Effect::Cancellable { effect, .. } => run(*effect).await,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    let mut actions = Vec::new();
                    for effect in effects {
                        actions.extend(run(effect).await);
                    }
                    actions
                },
            }
        }
        .boxed()
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock};

#[cfg(test)]
mod tests {
    use super::*;
    use scanme_core::effect::{Effect, EffectId};
    use std::time::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_fixed_clock_advance() {
        let clock = test_clock();
        let before = clock.now();
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now() - before, chrono::Duration::seconds(30));
    }

    #[tokio::test]
    async fn collect_actions_flattens_nested_effects() {
        let effects = vec![
            Effect::future(async { Some(1) }),
            Effect::merge(vec![
                Effect::future(async { None }),
                Effect::Delay {
                    duration: Duration::from_secs(60),
                    action: Box::new(2),
                }
                .cancellable(EffectId::new("timer")),
            ]),
            Effect::Cancel(EffectId::new("timer")),
            Effect::chain(vec![Effect::future(async { Some(3) })]),
        ];

        assert_eq!(effects::collect_actions(effects).await, vec![1, 2, 3]);
    }
}
