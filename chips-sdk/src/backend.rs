//! The backend seam: one trait, a mock and a live implementation.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chips_core::{
    BoxId, Card, CardBox, CardId, CardInfo, ChipsError, ChipsResult, CreateCardOptions,
    SaveCardOptions,
};
use serde::{Deserialize, Serialize};

/// Which backend a connector talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// In-memory mock seeded with fixture data.
    #[default]
    Mock,
    /// Remote card service.
    Live,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => f.write_str("mock"),
            Self::Live => f.write_str("live"),
        }
    }
}

impl FromStr for BackendMode {
    type Err = ChipsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "live" => Ok(Self::Live),
            other => Err(ChipsError::Validation(format!(
                "unknown backend mode: {other}"
            ))),
        }
    }
}

/// A card/box service the connector can drive.
///
/// Implementations receive already-validated options. They must reject
/// missing identifiers with [`ChipsError::NotFound`] and transient failures
/// with [`ChipsError::BackendUnavailable`], and must not retry.
#[async_trait]
pub trait CardBackend: Send + Sync {
    /// The mode this backend represents.
    fn mode(&self) -> BackendMode;

    /// Create a card with a freshly allocated identifier.
    async fn create_card(&self, options: &CreateCardOptions) -> ChipsResult<Card>;

    /// Fetch a snapshot of a card without modifying it.
    async fn open_card(&self, id: &CardId) -> ChipsResult<Card>;

    /// Merge `patch` into the stored card and return the result.
    async fn save_card(&self, patch: &SaveCardOptions) -> ChipsResult<Card>;

    /// Delete a card, detaching it from its box.
    async fn delete_card(&self, id: &CardId) -> ChipsResult<()>;

    /// Fetch a box.
    async fn get_box(&self, id: &BoxId) -> ChipsResult<CardBox>;

    /// List every box.
    async fn list_boxes(&self) -> ChipsResult<Vec<CardBox>>;

    /// List display info for every card.
    async fn list_cards(&self) -> ChipsResult<Vec<CardInfo>>;
}
