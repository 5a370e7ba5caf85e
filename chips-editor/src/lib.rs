//! # Chips Editor
//!
//! Runtime for the Chips card editor. [`ChipsEditor`] is the single entry
//! point: it sequences connector calls, keeps the three stores consistent
//! and emits lifecycle events.
//!
//! ```text
//!   caller ──► ChipsEditor ──► SdkConnector ──► mock | live backend
//!                  │
//!        ┌─────────┼──────────┐
//!   EditorStore CardStore  UiStore
//!                  │
//!                  ▼
//!       EventEmitter<EditorEvent> ──► subscribers
//! ```
//!
//! ## Usage
//!
//! ```bash
//! chips-editor --seed cards.json open c1
//! chips-editor --backend live --endpoint http://localhost:7000 cards
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod editor;
pub mod logging;

pub use cli::{run_command, CliArgs, Command};
pub use config::{EditorConfig, RetryConfig};
pub use editor::ChipsEditor;
pub use logging::init_tracing;
