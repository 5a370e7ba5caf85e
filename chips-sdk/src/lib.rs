//! # Chips SDK Connector
//!
//! Bridges the editor to a card/box service through one asynchronous API.
//!
//! ```text
//!            ┌──────────────┐
//!            │ SdkConnector │  validation, per-card save lanes
//!            └──────┬───────┘
//!                   │ dyn CardBackend
//!         ┌─────────┴─────────┐
//!   ┌─────▼──────┐     ┌──────▼──────┐
//!   │ MockBackend│     │ LiveBackend │  JSON-RPC 2.0 over HTTP
//!   └────────────┘     └─────────────┘
//! ```
//!
//! The backend is chosen once, at construction. The connector never retries
//! and never swallows errors.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod connector;
pub mod live;
pub mod mock;

pub use backend::{BackendMode, CardBackend};
pub use connector::{SdkConnector, SdkConnectorOptions, DEFAULT_CLIENT_NAME};
pub use live::LiveBackend;
pub use mock::{FaultInjector, MockBackend, MockBox, MockCard, MockSeed};
