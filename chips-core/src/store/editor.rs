//! Editor-wide state: active card, settings, dirty and save flags.

use serde::{Deserialize, Serialize};

use crate::card::CardId;

/// Global editor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditorSettings {
    /// Whether the editor is in edit mode (vs. read-only preview).
    pub edit_mode: bool,
}

/// Snapshot of the editor store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditorStoreState {
    /// The card currently being edited.
    pub active_card: Option<CardId>,
    /// Global settings.
    pub settings: EditorSettings,
    /// Whether there are unsaved local changes.
    pub dirty: bool,
    /// Number of saves currently in flight.
    pub pending_saves: u32,
}

impl EditorStoreState {
    /// Whether any save is in flight.
    #[must_use]
    pub const fn is_save_pending(&self) -> bool {
        self.pending_saves > 0
    }
}

/// Editor store.
///
/// Every action returns whether the state actually changed, so the owner
/// only notifies subscribers on real changes.
#[derive(Debug, Clone, Default)]
pub struct EditorStore {
    state: EditorStoreState,
}

impl EditorStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the state.
    #[must_use]
    pub fn state(&self) -> &EditorStoreState {
        &self.state
    }

    /// Owned copy of the state.
    #[must_use]
    pub fn snapshot(&self) -> EditorStoreState {
        self.state.clone()
    }

    /// The active card.
    #[must_use]
    pub fn active_card(&self) -> Option<&CardId> {
        self.state.active_card.as_ref()
    }

    /// Check whether `id` is the active card.
    #[must_use]
    pub fn is_active(&self, id: &CardId) -> bool {
        self.state.active_card.as_ref() == Some(id)
    }

    /// Set or clear the active card.
    pub fn set_active_card(&mut self, id: Option<CardId>) -> bool {
        if self.state.active_card == id {
            return false;
        }
        tracing::debug!(active = ?id, "Active card changed");
        self.state.active_card = id;
        true
    }

    /// Toggle edit mode.
    pub fn set_edit_mode(&mut self, enabled: bool) -> bool {
        let changed = self.state.settings.edit_mode != enabled;
        self.state.settings.edit_mode = enabled;
        changed
    }

    /// Flag unsaved local changes.
    pub fn mark_dirty(&mut self) -> bool {
        !std::mem::replace(&mut self.state.dirty, true)
    }

    /// Clear the unsaved-changes flag.
    pub fn clear_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.state.dirty, false)
    }

    /// Record that a save started.
    pub fn begin_save(&mut self) -> bool {
        self.state.pending_saves = self.state.pending_saves.saturating_add(1);
        self.state.pending_saves == 1
    }

    /// Record that a save finished (successfully or not).
    pub fn end_save(&mut self) -> bool {
        self.state.pending_saves = self.state.pending_saves.saturating_sub(1);
        self.state.pending_saves == 0
    }

    /// Whether any save is in flight.
    #[must_use]
    pub fn is_save_pending(&self) -> bool {
        self.state.is_save_pending()
    }
}
