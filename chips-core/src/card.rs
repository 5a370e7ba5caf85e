//! Cards and boxes - the content units the editor manages.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::options::{FieldUpdate, SaveCardOptions};

/// Unique identifier for a card.
///
/// Identifiers are assigned by the backend and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("card-{}", Uuid::new_v4()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unique identifier for a box.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxId(String);

impl BoxId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoxId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BoxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Position of a card on its surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X position (pixels from left).
    pub x: f32,
    /// Y position (pixels from top).
    pub y: f32,
}

/// Size of a card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

/// Identity-independent description of a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseCardInfo {
    /// Card type tag (e.g. `note`).
    #[serde(rename = "type")]
    pub card_type: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Position, if the card is placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Size, if the card has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

/// Bookkeeping data attached to a card.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardMetadata {
    /// Creation time (ms since epoch).
    pub created_at: u64,
    /// Last modification time (ms since epoch).
    pub modified_at: u64,
    /// Box the card belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_id: Option<BoxId>,
    /// Owner of the card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Arbitrary extension fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A card: the atomic content unit managed by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier.
    pub id: CardId,
    /// Type, title and geometry.
    pub base: BaseCardInfo,
    /// Timestamps, box association and extension fields.
    pub metadata: CardMetadata,
}

/// Flattened display view of a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInfo {
    /// Card identifier.
    pub id: CardId,
    /// Card type tag.
    #[serde(rename = "type")]
    pub card_type: String,
    /// Display title.
    pub title: String,
    /// Containing box.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_id: Option<BoxId>,
    /// Owner of the card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Creation time (ms since epoch).
    pub created_at: u64,
    /// Last modification time (ms since epoch).
    pub modified_at: u64,
}

impl Card {
    /// Create a card with the given identity and base info, stamped `now`.
    #[must_use]
    pub fn new(id: CardId, base: BaseCardInfo, now: u64) -> Self {
        Self {
            id,
            base,
            metadata: CardMetadata {
                created_at: now,
                modified_at: now,
                ..CardMetadata::default()
            },
        }
    }

    /// Place the card in a box.
    #[must_use]
    pub fn with_box(mut self, box_id: BoxId) -> Self {
        self.metadata.box_id = Some(box_id);
        self
    }

    /// Build the display view.
    #[must_use]
    pub fn info(&self) -> CardInfo {
        CardInfo {
            id: self.id.clone(),
            card_type: self.base.card_type.clone(),
            title: self.base.title.clone(),
            box_id: self.metadata.box_id.clone(),
            owner: self.metadata.owner.clone(),
            created_at: self.metadata.created_at,
            modified_at: self.metadata.modified_at,
        }
    }

    /// Apply a partial update on top of this card.
    ///
    /// Fields the patch does not mention are left untouched; `Clear`
    /// removes the field; `extra` is merged key by key.
    pub fn apply(&mut self, patch: &SaveCardOptions, now: u64) {
        if let Some(title) = &patch.title {
            self.base.title.clone_from(title);
        }
        patch.position.apply_to(&mut self.base.position);
        patch.size.apply_to(&mut self.base.size);
        patch.owner.apply_to(&mut self.metadata.owner);
        for (key, value) in &patch.extra {
            match value {
                Some(value) => {
                    self.metadata.extra.insert(key.clone(), value.clone());
                }
                None => {
                    self.metadata.extra.remove(key);
                }
            }
        }
        self.metadata.modified_at = now.max(self.metadata.modified_at);
    }

    /// Replace this card with a newer snapshot of the same card.
    ///
    /// `newer` is the authoritative record: base info and metadata, `extra`
    /// included, are taken from it wholesale. Only the original creation
    /// time is kept, and `modified_at` never moves backwards.
    pub fn merge_from(&mut self, newer: Card) {
        debug_assert_eq!(self.id, newer.id);
        let Card { base, metadata, .. } = newer;
        let created_at = if self.metadata.created_at == 0 {
            metadata.created_at
        } else {
            self.metadata.created_at
        };
        let modified_at = metadata.modified_at.max(self.metadata.modified_at);
        self.base = base;
        self.metadata = CardMetadata {
            created_at,
            modified_at,
            ..metadata
        };
    }
}

impl<T> FieldUpdate<T>
where
    T: Clone,
{
    /// Apply this update to an optional field.
    pub fn apply_to(&self, field: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(value) => *field = Some(value.clone()),
            Self::Clear => *field = None,
        }
    }
}

/// A box: an ordered container of card identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardBox {
    /// Unique identifier.
    pub id: BoxId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Child cards, in display order.
    #[serde(default)]
    pub cards: Vec<CardId>,
}

impl CardBox {
    /// Create an empty box.
    #[must_use]
    pub fn new(id: impl Into<BoxId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            cards: Vec::new(),
        }
    }

    /// Check whether the box lists the given card.
    #[must_use]
    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.contains(id)
    }
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Timestamps won't exceed u64 for billions of years
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
