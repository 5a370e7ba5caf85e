//! Uniform asynchronous facade over a card backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chips_core::{
    BoxId, Card, CardBox, CardId, CardInfo, ChipsError, ChipsResult, CreateCardOptions,
    OpenCardOptions, SaveCardOptions,
};

use crate::backend::{BackendMode, CardBackend};
use crate::live::LiveBackend;
use crate::mock::{MockBackend, MockSeed};

/// Default client name presented to live backends.
pub const DEFAULT_CLIENT_NAME: &str = "chips-editor";

/// Configuration for an [`SdkConnector`].
#[derive(Debug, Clone)]
pub struct SdkConnectorOptions {
    /// Which backend to use.
    pub mode: BackendMode,
    /// Fixture data for mock mode.
    pub seed: MockSeed,
    /// Service URL for live mode.
    pub endpoint: Option<String>,
    /// Client name presented to live backends.
    pub client_name: String,
}

impl Default for SdkConnectorOptions {
    fn default() -> Self {
        Self {
            mode: BackendMode::Mock,
            seed: MockSeed::default(),
            endpoint: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }
}

impl SdkConnectorOptions {
    /// Mock mode with the given seed.
    #[must_use]
    pub fn mock(seed: MockSeed) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Live mode against `endpoint`.
    #[must_use]
    pub fn live(endpoint: impl Into<String>) -> Self {
        Self {
            mode: BackendMode::Live,
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }
}

type SaveLane = Arc<tokio::sync::Mutex<()>>;

/// Connector between the editor and a card backend.
///
/// Owns exactly one backend for its lifetime. Saves to the same card are
/// serialized: at most one is in flight per identifier, later ones queue
/// in issue order and apply on top of the state the previous one produced.
pub struct SdkConnector {
    backend: Box<dyn CardBackend>,
    save_lanes: Mutex<HashMap<CardId, SaveLane>>,
    detached: AtomicBool,
}

impl std::fmt::Debug for SdkConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkConnector")
            .field("mode", &self.backend.mode())
            .field("detached", &self.is_detached())
            .finish_non_exhaustive()
    }
}

impl SdkConnector {
    /// Build a connector, selecting the backend from `options.mode`.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Validation`] for an invalid seed, or for live
    /// mode without a usable endpoint.
    pub fn new(options: SdkConnectorOptions) -> ChipsResult<Self> {
        let backend: Box<dyn CardBackend> = match options.mode {
            BackendMode::Mock => Box::new(MockBackend::new(options.seed)?),
            BackendMode::Live => {
                let endpoint = options.endpoint.ok_or_else(|| {
                    ChipsError::Validation("live mode requires an endpoint".to_string())
                })?;
                Box::new(LiveBackend::new(&endpoint, &options.client_name)?)
            }
        };
        tracing::debug!(mode = %backend.mode(), "SDK connector created");
        Ok(Self::with_backend(backend))
    }

    /// Build a connector around an existing backend.
    #[must_use]
    pub fn with_backend(backend: Box<dyn CardBackend>) -> Self {
        Self {
            backend,
            save_lanes: Mutex::new(HashMap::new()),
            detached: AtomicBool::new(false),
        }
    }

    /// The backend mode.
    #[must_use]
    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    /// Stop serving requests. Every later call fails with `Disposed`.
    pub fn detach(&self) {
        if !self.detached.swap(true, Ordering::SeqCst) {
            tracing::debug!(mode = %self.mode(), "SDK connector detached");
        }
    }

    /// Whether [`SdkConnector::detach`] has been called.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn ensure_attached(&self) -> ChipsResult<()> {
        if self.is_detached() {
            Err(ChipsError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Create a card.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed options, `NotFound` if the target box does
    /// not exist, `BackendUnavailable` on transient failure.
    pub async fn create_card(&self, options: &CreateCardOptions) -> ChipsResult<Card> {
        self.ensure_attached()?;
        options.validate()?;
        tracing::debug!(
            mode = %self.mode(),
            card_type = %options.card_type,
            box_id = ?options.box_id,
            "create_card"
        );
        self.backend.create_card(options).await
    }

    /// Fetch a card. Does not modify backend state.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank id, `NotFound` if the card does not exist,
    /// `BackendUnavailable` on transient failure.
    pub async fn open_card(&self, options: &OpenCardOptions) -> ChipsResult<Card> {
        self.ensure_attached()?;
        options.validate()?;
        tracing::debug!(mode = %self.mode(), card = %options.id, "open_card");
        self.backend.open_card(&options.id).await
    }

    /// Merge a partial update into a card.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed options, `NotFound` if the card does not
    /// exist, `BackendUnavailable` on transient failure.
    pub async fn save_card(&self, options: &SaveCardOptions) -> ChipsResult<Card> {
        self.ensure_attached()?;
        options.validate()?;

        let lane = self.lane_for(&options.id);
        let _turn = lane.lane.lock().await;
        // Detach may have happened while queued
        if self.is_detached() {
            return Err(ChipsError::Disposed);
        }
        tracing::debug!(mode = %self.mode(), card = %options.id, "save_card");
        self.backend.save_card(options).await
    }

    /// Delete a card.
    ///
    /// # Errors
    ///
    /// `NotFound` if the card does not exist, `BackendUnavailable` on
    /// transient failure.
    pub async fn delete_card(&self, id: &CardId) -> ChipsResult<()> {
        self.ensure_attached()?;
        tracing::debug!(mode = %self.mode(), card = %id, "delete_card");
        self.backend.delete_card(id).await
    }

    /// Fetch a box.
    ///
    /// # Errors
    ///
    /// `NotFound` if the box does not exist, `BackendUnavailable` on
    /// transient failure.
    pub async fn get_box(&self, id: &BoxId) -> ChipsResult<CardBox> {
        self.ensure_attached()?;
        self.backend.get_box(id).await
    }

    /// List every box.
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` on transient failure.
    pub async fn list_boxes(&self) -> ChipsResult<Vec<CardBox>> {
        self.ensure_attached()?;
        self.backend.list_boxes().await
    }

    /// List every card.
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` on transient failure.
    pub async fn list_cards(&self) -> ChipsResult<Vec<CardInfo>> {
        self.ensure_attached()?;
        self.backend.list_cards().await
    }

    /// Number of cards with a save lane open (in flight or queued).
    #[must_use]
    pub fn active_save_lanes(&self) -> usize {
        self.save_lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lane_for<'a>(&'a self, id: &'a CardId) -> LaneGuard<'a> {
        let mut lanes = self
            .save_lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lane = Arc::clone(lanes.entry(id.clone()).or_default());
        LaneGuard {
            lanes: &self.save_lanes,
            id,
            lane,
        }
    }
}

/// A caller's hold on a card's save lane, queued or running.
///
/// Dropping it, including when the save future is cancelled, removes the
/// lane from the map once nobody else holds it.
struct LaneGuard<'a> {
    lanes: &'a Mutex<HashMap<CardId, SaveLane>>,
    id: &'a CardId,
    lane: SaveLane,
}

impl Drop for LaneGuard<'_> {
    fn drop(&mut self) {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        // Held by the map and this guard only: nobody is queued behind us
        let idle = lanes
            .get(self.id)
            .is_some_and(|lane| Arc::ptr_eq(lane, &self.lane) && Arc::strong_count(lane) == 2);
        if idle {
            lanes.remove(self.id);
        }
    }
}
