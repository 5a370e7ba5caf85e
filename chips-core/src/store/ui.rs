//! UI layout state: dock placement and panel visibility.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChipsError;

/// Placement of the editor dock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockPosition {
    /// Docked to the left edge.
    Left,
    /// Docked to the right edge.
    #[default]
    Right,
    /// Docked to the top edge.
    Top,
    /// Docked to the bottom edge.
    Bottom,
    /// Free-floating window.
    Floating,
}

impl DockPosition {
    /// All positions, in display order.
    pub const ALL: [Self; 5] = [
        Self::Left,
        Self::Right,
        Self::Top,
        Self::Bottom,
        Self::Floating,
    ];

    /// Lowercase name of the position.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Floating => "floating",
        }
    }
}

impl fmt::Display for DockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DockPosition {
    type Err = ChipsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChipsError::Validation(format!("unknown dock position: {s}")))
    }
}

/// Snapshot of the UI store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UiStoreState {
    /// Where the dock is placed.
    pub dock_position: DockPosition,
    /// Panel visibility by panel name.
    pub panels: BTreeMap<String, bool>,
}

/// UI store.
#[derive(Debug, Clone, Default)]
pub struct UiStore {
    state: UiStoreState,
}

impl UiStore {
    /// Create a store with the default layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the state.
    #[must_use]
    pub fn state(&self) -> &UiStoreState {
        &self.state
    }

    /// Owned copy of the state.
    #[must_use]
    pub fn snapshot(&self) -> UiStoreState {
        self.state.clone()
    }

    /// Move the dock. Returns whether the position changed.
    pub fn set_dock_position(&mut self, position: DockPosition) -> bool {
        std::mem::replace(&mut self.state.dock_position, position) != position
    }

    /// Flip a panel's visibility and return the new value.
    ///
    /// Panels that were never shown start hidden, so the first toggle shows them.
    pub fn toggle_panel(&mut self, name: &str) -> bool {
        let visible = self.state.panels.entry(name.to_string()).or_insert(false);
        *visible = !*visible;
        *visible
    }

    /// Force a panel's visibility. Returns whether it changed.
    pub fn set_panel_visible(&mut self, name: &str, visible: bool) -> bool {
        self.state.panels.insert(name.to_string(), visible) != Some(visible)
    }

    /// Whether a panel is visible.
    #[must_use]
    pub fn is_panel_visible(&self, name: &str) -> bool {
        self.state.panels.get(name).copied().unwrap_or(false)
    }
}
