//! Composition root.
//!
//! [`ScanMeApp`] owns one [`Store`] per screen, all built from the same
//! environment. Nothing is global: a host creates the app with
//! [`ScanMeApp::init`] and tears it down with [`ScanMeApp::dispose`], and
//! two apps never share state.

use crate::admin::{
    ActivationCodesAction, ActivationCodesReducer, ActivationCodesState, QuestsAction,
    QuestsReducer, QuestsState, ReviewQueueAction, ReviewQueueReducer, ReviewQueueState,
};
use crate::environment::ScanMeEnvironment;
use crate::feed::{FeedAction, FeedReducer, FeedState};
use crate::missions::{MissionsAction, MissionsReducer, MissionsState};
use crate::presence::{PresenceAction, PresenceReducer, PresenceState};
use crate::providers::{IdentityProvider, ScanMeApi};
use crate::purchase::{PurchaseAction, PurchaseReducer, PurchaseState};
use crate::veteran::{VeteranAction, VeteranReducer, VeteranState};
use scanme_runtime::{Store, StoreError};

/// Store of one screen over the shared environment.
pub type ScreenStore<S, Act, R, A, I> = Store<S, Act, ScanMeEnvironment<A, I>, R>;

/// Feed screen store.
pub type FeedStore<A, I> = ScreenStore<FeedState, FeedAction, FeedReducer<A, I>, A, I>;
/// Check-in wall store.
pub type PresenceStore<A, I> =
    ScreenStore<PresenceState, PresenceAction, PresenceReducer<A, I>, A, I>;
/// Purchase dialog store.
pub type PurchaseStore<A, I> =
    ScreenStore<PurchaseState, PurchaseAction, PurchaseReducer<A, I>, A, I>;
/// Activation code panel store.
pub type ActivationCodesStore<A, I> = ScreenStore<
    ActivationCodesState,
    ActivationCodesAction,
    ActivationCodesReducer<A, I>,
    A,
    I,
>;
/// Quest panel store.
pub type QuestsStore<A, I> = ScreenStore<QuestsState, QuestsAction, QuestsReducer<A, I>, A, I>;
/// Review queue store.
pub type ReviewQueueStore<A, I> =
    ScreenStore<ReviewQueueState, ReviewQueueAction, ReviewQueueReducer<A, I>, A, I>;
/// Missions screen store.
pub type MissionsStore<A, I> =
    ScreenStore<MissionsState, MissionsAction, MissionsReducer<A, I>, A, I>;
/// Veteran hub store.
pub type VeteranStore<A, I> = ScreenStore<VeteranState, VeteranAction, VeteranReducer<A, I>, A, I>;

/// Every screen of the client.
pub struct ScanMeApp<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    env: ScanMeEnvironment<A, I>,
    /// Feed
    pub feed: FeedStore<A, I>,
    /// Check-in wall
    pub presence: PresenceStore<A, I>,
    /// Purchase dialog
    pub purchase: PurchaseStore<A, I>,
    /// Activation code panel
    pub activation_codes: ActivationCodesStore<A, I>,
    /// Quest panel
    pub quests: QuestsStore<A, I>,
    /// Veteran review queue
    pub review_queue: ReviewQueueStore<A, I>,
    /// Missions
    pub missions: MissionsStore<A, I>,
    /// Veteran hub
    pub veteran: VeteranStore<A, I>,
}

impl<A, I> ScanMeApp<A, I>
where
    A: ScanMeApi,
    I: IdentityProvider,
{
    /// Build every screen over `env`.
    #[must_use]
    pub fn init(env: ScanMeEnvironment<A, I>) -> Self {
        tracing::debug!(api = %env.config.api_base_url, "Initialising screens");

        Self {
            feed: Store::new(FeedState::default(), FeedReducer::new(), env.clone()),
            presence: Store::new(PresenceState::default(), PresenceReducer::new(), env.clone()),
            purchase: Store::new(PurchaseState::default(), PurchaseReducer::new(), env.clone()),
            activation_codes: Store::new(
                ActivationCodesState::default(),
                ActivationCodesReducer::new(),
                env.clone(),
            ),
            quests: Store::new(QuestsState::default(), QuestsReducer::new(), env.clone()),
            review_queue: Store::new(
                ReviewQueueState::default(),
                ReviewQueueReducer::new(),
                env.clone(),
            ),
            missions: Store::new(MissionsState::default(), MissionsReducer::new(), env.clone()),
            veteran: Store::new(VeteranState::default(), VeteranReducer::new(), env.clone()),
            env,
        }
    }

    /// The shared environment.
    #[must_use]
    pub const fn environment(&self) -> &ScanMeEnvironment<A, I> {
        &self.env
    }

    /// Stop polling and shut every store down.
    ///
    /// All stores are shut down even when one of them fails; the first
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if a store still had effects
    /// running when its timeout expired.
    pub async fn dispose(&self) -> Result<(), StoreError> {
        if !self.presence.is_shutting_down() {
            self.presence.send(PresenceAction::Stop).await?;
        }

        let results = [
            self.presence.dispose().await,
            self.feed.dispose().await,
            self.purchase.dispose().await,
            self.activation_codes.dispose().await,
            self.quests.dispose().await,
            self.review_queue.dispose().await,
            self.missions.dispose().await,
            self.veteran.dispose().await,
        ];

        tracing::info!("Screens disposed");
        results.into_iter().collect()
    }
}
