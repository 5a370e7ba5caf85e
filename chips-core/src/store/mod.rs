//! State stores: plain data with named mutation actions.
//!
//! Stores never call each other. Cross-store consistency (for example
//! clearing the active card when that card is removed) is the owner's job,
//! done in the same synchronous step as the triggering mutation.

mod cards;
mod editor;
mod ui;

pub use cards::{CardStore, CardStoreState};
pub use editor::{EditorSettings, EditorStore, EditorStoreState};
pub use ui::{DockPosition, UiStore, UiStoreState};
