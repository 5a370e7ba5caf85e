//! The editor orchestrator.
//!
//! Sequences connector calls and store mutations, and emits lifecycle
//! events. Store mutations only happen after a connector call has fully
//! succeeded, and always complete before the next await point, so
//! subscribers never observe a half-applied change.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chips_core::{
    BoxId, Card, CardBox, CardChange, CardErrorEvent, CardId, CardInfo, CardStore,
    CardStoreState, ChipsError, ChipsResult, CreateCardOptions, DockPosition, EditorEvent,
    EditorStore, EditorStoreState, EventEmitter, OpenCardOptions, SaveCardOptions, UiStore,
    UiStoreState,
};
use chips_sdk::SdkConnector;
use tracing::{debug, info, warn};

use crate::config::{EditorConfig, RetryConfig};

/// Single public entry point for card editing.
///
/// Owns its connector, emitter and stores; two editors never share state.
#[derive(Debug)]
pub struct ChipsEditor {
    connector: SdkConnector,
    events: EventEmitter<EditorEvent>,
    editor: RwLock<EditorStore>,
    cards: RwLock<CardStore>,
    ui: RwLock<UiStore>,
    retry: RetryConfig,
    /// Bumped on every backend open; lets late completions detect they are stale.
    open_generation: AtomicU64,
    disposed: AtomicBool,
}

impl ChipsEditor {
    /// Create an editor around an existing connector.
    #[must_use]
    pub fn new(connector: SdkConnector, retry: RetryConfig) -> Self {
        Self {
            connector,
            events: EventEmitter::new(),
            editor: RwLock::new(EditorStore::new()),
            cards: RwLock::new(CardStore::new()),
            ui: RwLock::new(UiStore::new()),
            retry,
            open_generation: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Create an editor from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed cannot be loaded or the connector
    /// options are invalid.
    pub fn from_config(config: &EditorConfig) -> ChipsResult<Self> {
        let connector = SdkConnector::new(config.to_connector_options()?)?;
        info!(mode = %connector.mode(), "Editor created");
        Ok(Self::new(connector, config.retry.clone()))
    }

    /// The event emitter, for subscribing to editor events.
    #[must_use]
    pub fn events(&self) -> &EventEmitter<EditorEvent> {
        &self.events
    }

    /// Whether [`ChipsEditor::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Card lifecycle
    // ------------------------------------------------------------------

    /// Create a card and cache it; optionally make it active.
    ///
    /// # Errors
    ///
    /// `Validation`, `NotFound` (missing box), `BackendUnavailable` after
    /// retries, or `Disposed`. Failures are mirrored as `card:error`.
    pub async fn create_card(&self, options: CreateCardOptions) -> ChipsResult<Card> {
        const OP: &str = "create_card";
        self.ensure_live()?;

        let connector = &self.connector;
        let request = &options;
        let card = match self
            .with_retry(OP, move || connector.create_card(request))
            .await
        {
            Ok(card) => card,
            Err(err) => return Err(self.fail(OP, None, err)),
        };
        self.ensure_live()?;

        self.upsert_card(card.clone());
        if options.activate {
            self.activate(&card.id);
        }
        debug!(card = %card.id, "Card created");
        self.emit(EditorEvent::CardCreated(card.clone()));
        Ok(card)
    }

    /// Open a card and make it active.
    ///
    /// Always fetches from the backend unless `options.use_cache` is set and
    /// the card is already cached. If another open was issued while this one
    /// was in flight, the result is cached but the active card is left alone.
    ///
    /// # Errors
    ///
    /// `Validation`, `NotFound`, `BackendUnavailable` after retries, or
    /// `Disposed`. Failures are mirrored as `card:error`.
    pub async fn open_card(&self, options: OpenCardOptions) -> ChipsResult<Card> {
        const OP: &str = "open_card";
        self.ensure_live()?;

        if options.use_cache {
            let cached = self.cards_read().get(&options.id).cloned();
            if let Some(card) = cached {
                debug!(card = %card.id, "Card opened from cache");
                self.activate(&card.id);
                self.emit(EditorEvent::CardOpened(card.clone()));
                return Ok(card);
            }
        }

        let generation = self.open_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let connector = &self.connector;
        let request = &options;
        let card = match self
            .with_retry(OP, move || connector.open_card(request))
            .await
        {
            Ok(card) => card,
            Err(err) => return Err(self.fail(OP, Some(options.id.clone()), err)),
        };
        self.ensure_live()?;

        let merged = self.upsert_card(card);
        if self.open_generation.load(Ordering::SeqCst) == generation {
            self.activate(&merged.id);
        } else {
            debug!(card = %merged.id, "Stale open completion, active card unchanged");
        }
        self.emit(EditorEvent::CardOpened(merged.clone()));
        Ok(merged)
    }

    /// Save a partial update and cache the merged result.
    ///
    /// Clears the dirty flag when the saved card is still the active one
    /// (or no card is active). On failure the dirty flag is left as is and
    /// no store notification is emitted.
    ///
    /// # Errors
    ///
    /// `Validation`, `NotFound`, `BackendUnavailable` after retries, or
    /// `Disposed`. Failures are mirrored as `card:error`.
    pub async fn save_card(&self, options: SaveCardOptions) -> ChipsResult<Card> {
        const OP: &str = "save_card";
        self.ensure_live()?;

        // The in-flight counter is readable through `editor_state()` but only
        // announced once the save has succeeded.
        self.editor_write().begin_save();
        let connector = &self.connector;
        let request = &options;
        let result = self
            .with_retry(OP, move || connector.save_card(request))
            .await;
        let settled = self.editor_write().end_save();

        let card = match result {
            Ok(card) => card,
            Err(err) => return Err(self.fail(OP, Some(options.id.clone()), err)),
        };
        self.ensure_live()?;

        let merged = self.upsert_card(card);
        self.update_editor(|store| {
            let still_current = store.active_card().map_or(true, |id| id == &merged.id);
            let cleared = still_current && store.clear_dirty();
            cleared || settled
        });
        debug!(card = %merged.id, "Card saved");
        self.emit(EditorEvent::CardSaved(merged.clone()));
        Ok(merged)
    }

    /// Delete a card from the backend and drop it locally.
    ///
    /// # Errors
    ///
    /// `NotFound`, `BackendUnavailable` after retries, or `Disposed`.
    /// Failures are mirrored as `card:error`.
    pub async fn delete_card(&self, id: &CardId) -> ChipsResult<()> {
        const OP: &str = "delete_card";
        self.ensure_live()?;

        let connector = &self.connector;
        if let Err(err) = self
            .with_retry(OP, move || connector.delete_card(id))
            .await
        {
            return Err(self.fail(OP, Some(id.clone()), err));
        }
        self.ensure_live()?;

        self.remove_local(id);
        self.emit(EditorEvent::CardDeleted(id.clone()));
        Ok(())
    }

    /// Drop a card from the local cache without touching the backend.
    ///
    /// # Errors
    ///
    /// `NotFound` if the card is not cached, or `Disposed`.
    pub fn close_card(&self, id: &CardId) -> ChipsResult<Card> {
        self.ensure_live()?;
        let card = self
            .remove_local(id)
            .ok_or_else(|| ChipsError::card_not_found(id.as_str()))?;
        self.emit(EditorEvent::CardClosed(id.clone()));
        Ok(card)
    }

    /// Fetch a box.
    ///
    /// # Errors
    ///
    /// `NotFound`, `BackendUnavailable` after retries, or `Disposed`.
    pub async fn get_box(&self, id: &BoxId) -> ChipsResult<CardBox> {
        self.ensure_live()?;
        let connector = &self.connector;
        self.with_retry("get_box", move || connector.get_box(id))
            .await
    }

    /// List every box known to the backend.
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` after retries, or `Disposed`.
    pub async fn list_boxes(&self) -> ChipsResult<Vec<CardBox>> {
        self.ensure_live()?;
        let connector = &self.connector;
        self.with_retry("list_boxes", move || connector.list_boxes())
            .await
    }

    /// List every card known to the backend.
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` after retries, or `Disposed`.
    pub async fn list_cards(&self) -> ChipsResult<Vec<CardInfo>> {
        self.ensure_live()?;
        let connector = &self.connector;
        self.with_retry("list_cards", move || connector.list_cards())
            .await
    }

    // ------------------------------------------------------------------
    // Local actions
    // ------------------------------------------------------------------

    /// Set or clear the active card. A card must be cached to become active.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not cached, or `Disposed`.
    pub fn set_active_card(&self, id: Option<CardId>) -> ChipsResult<()> {
        self.ensure_live()?;
        let snapshot = {
            let cards = self.cards_read();
            if let Some(id) = &id {
                if !cards.contains(id) {
                    return Err(ChipsError::card_not_found(id.as_str()));
                }
            }
            let mut editor = self.editor_write();
            editor.set_active_card(id).then(|| editor.snapshot())
        };
        if let Some(snapshot) = snapshot {
            self.emit(EditorEvent::EditorStoreChanged(snapshot));
        }
        Ok(())
    }

    /// Switch edit mode on or off.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn set_edit_mode(&self, enabled: bool) -> ChipsResult<()> {
        self.ensure_live()?;
        self.update_editor(|store| store.set_edit_mode(enabled));
        Ok(())
    }

    /// Flag unsaved local changes.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn mark_dirty(&self) -> ChipsResult<()> {
        self.ensure_live()?;
        self.update_editor(EditorStore::mark_dirty);
        Ok(())
    }

    /// Move the dock.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn set_dock_position(&self, position: DockPosition) -> ChipsResult<()> {
        self.ensure_live()?;
        self.update_ui(|store| store.set_dock_position(position));
        Ok(())
    }

    /// Flip a panel's visibility and return the new value.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn toggle_panel(&self, name: &str) -> ChipsResult<bool> {
        self.ensure_live()?;
        let (visible, snapshot) = {
            let mut ui = self.ui_write();
            let visible = ui.toggle_panel(name);
            (visible, ui.snapshot())
        };
        self.emit(EditorEvent::UiStoreChanged(snapshot));
        Ok(visible)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Snapshot of the editor store.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn editor_state(&self) -> ChipsResult<EditorStoreState> {
        self.ensure_live()?;
        Ok(self.editor_read().snapshot())
    }

    /// Snapshot of the card store.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn card_state(&self) -> ChipsResult<CardStoreState> {
        self.ensure_live()?;
        Ok(self.cards_read().snapshot())
    }

    /// Snapshot of the UI store.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn ui_state(&self) -> ChipsResult<UiStoreState> {
        self.ensure_live()?;
        Ok(self.ui_read().snapshot())
    }

    /// A cached card.
    ///
    /// # Errors
    ///
    /// `Disposed`.
    pub fn card(&self, id: &CardId) -> ChipsResult<Option<Card>> {
        self.ensure_live()?;
        Ok(self.cards_read().get(id).cloned())
    }

    /// Release subscriptions, detach from the connector and drop cached
    /// state. Every later call fails with `Disposed`.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.events.remove_all_listeners();
        self.connector.detach();
        *self.cards_write() = CardStore::new();
        *self.editor_write() = EditorStore::new();
        *self.ui_write() = UiStore::new();
        info!("Editor disposed");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_live(&self) -> ChipsResult<()> {
        if self.is_disposed() {
            Err(ChipsError::Disposed)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: EditorEvent) {
        self.events.emit(&event);
    }

    /// Mirror a failure as `card:error` and hand it back for the caller.
    fn fail(&self, operation: &'static str, card_id: Option<CardId>, err: ChipsError) -> ChipsError {
        warn!(operation, card = ?card_id, kind = ?err.kind(), "Operation failed: {err}");
        if self.is_disposed() {
            return err;
        }
        self.emit(EditorEvent::CardError(CardErrorEvent::from_error(
            operation, card_id, &err,
        )));
        err
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> ChipsResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ChipsResult<T>>,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        operation,
                        attempt + 1,
                        attempts,
                        delay,
                        err
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn upsert_card(&self, card: Card) -> Card {
        let merged = self.cards_write().upsert(card).clone();
        self.emit(EditorEvent::CardStoreChanged(CardChange::Upserted(
            merged.id.clone(),
        )));
        merged
    }

    fn activate(&self, id: &CardId) {
        self.update_editor(|store| store.set_active_card(Some(id.clone())));
    }

    /// Remove a cached card and, in the same step, clear the active card
    /// if it pointed at it.
    fn remove_local(&self, id: &CardId) -> Option<Card> {
        let (removed, editor_snapshot) = {
            let mut cards = self.cards_write();
            let removed = cards.remove(id);
            let mut editor = self.editor_write();
            let cleared = removed.is_some() && editor.is_active(id) && editor.set_active_card(None);
            (removed, cleared.then(|| editor.snapshot()))
        };
        if removed.is_some() {
            self.emit(EditorEvent::CardStoreChanged(CardChange::Removed(id.clone())));
        }
        if let Some(snapshot) = editor_snapshot {
            self.emit(EditorEvent::EditorStoreChanged(snapshot));
        }
        removed
    }

    fn update_editor(&self, action: impl FnOnce(&mut EditorStore) -> bool) {
        let snapshot = {
            let mut editor = self.editor_write();
            action(&mut *editor).then(|| editor.snapshot())
        };
        if let Some(snapshot) = snapshot {
            self.emit(EditorEvent::EditorStoreChanged(snapshot));
        }
    }

    fn update_ui(&self, action: impl FnOnce(&mut UiStore) -> bool) {
        let snapshot = {
            let mut ui = self.ui_write();
            action(&mut *ui).then(|| ui.snapshot())
        };
        if let Some(snapshot) = snapshot {
            self.emit(EditorEvent::UiStoreChanged(snapshot));
        }
    }

    fn editor_read(&self) -> RwLockReadGuard<'_, EditorStore> {
        self.editor.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn editor_write(&self) -> RwLockWriteGuard<'_, EditorStore> {
        self.editor.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn cards_read(&self) -> RwLockReadGuard<'_, CardStore> {
        self.cards.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cards_write(&self) -> RwLockWriteGuard<'_, CardStore> {
        self.cards.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ui_read(&self) -> RwLockReadGuard<'_, UiStore> {
        self.ui.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn ui_write(&self) -> RwLockWriteGuard<'_, UiStore> {
        self.ui.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChipsEditor {
    fn drop(&mut self) {
        if !self.is_disposed() {
            self.events.remove_all_listeners();
            self.connector.detach();
        }
    }
}
