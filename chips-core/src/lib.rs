//! # Chips Core
//!
//! Data model and state containers for the Chips card/box editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 chips-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Data Model      │  Event Emitter           │
//! │  - Cards, boxes  │  - on / once / off       │
//! │  - Options       │  - Ordered dispatch      │
//! │  - Merge rules   │  - Error sink            │
//! ├─────────────────────────────────────────────┤
//! │  Stores                                     │
//! │  - EditorStore (active card, dirty flag)    │
//! │  - CardStore   (one entry per card id)      │
//! │  - UiStore     (dock, panels)               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Nothing here performs I/O; the connector and editor crates build on it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod card;
pub mod error;
pub mod event;
pub mod options;
pub mod store;

pub use card::{
    now_ms, BaseCardInfo, BoxId, Card, CardBox, CardId, CardInfo, CardMetadata, Position, Size,
};
pub use error::{ChipsError, ChipsResult, EntityKind, ErrorKind};
pub use event::{
    names, CardChange, CardErrorEvent, EditorEvent, Event, EventEmitter, HandlerError,
    HandlerFailure, ListenerId, Subscription,
};
pub use options::{CreateCardOptions, FieldUpdate, OpenCardOptions, SaveCardOptions};
pub use store::{
    CardStore, CardStoreState, DockPosition, EditorSettings, EditorStore, EditorStoreState,
    UiStore, UiStoreState,
};

/// Chips core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
