//! Request options for card operations, and their validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::card::{BaseCardInfo, BoxId, CardId, Position, Size};
use crate::error::{ChipsError, ChipsResult};

/// Maximum length of a card type tag.
pub const MAX_TYPE_LEN: usize = 64;

/// Maximum length of a card title, in characters.
pub const MAX_TITLE_LEN: usize = 256;

/// Tri-state update for an optional field.
///
/// `Keep` leaves the field alone, `Set` overwrites it, `Clear` removes it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum FieldUpdate<T> {
    /// Leave the field unchanged.
    #[default]
    Keep,
    /// Overwrite the field.
    Set(T),
    /// Remove the field.
    Clear,
}

impl<T> FieldUpdate<T> {
    /// Whether this update leaves the field unchanged.
    #[must_use]
    pub const fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Options for creating a card.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateCardOptions {
    /// Card type tag (required).
    #[serde(rename = "type")]
    pub card_type: String,
    /// Initial title.
    #[serde(default)]
    pub title: String,
    /// Box to create the card in; must exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_id: Option<BoxId>,
    /// Initial position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Initial size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Owner of the new card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Initial extension fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Make the new card the active card. Editor-side only.
    #[serde(skip)]
    pub activate: bool,
}

impl CreateCardOptions {
    /// Options for a card of the given type.
    #[must_use]
    pub fn new(card_type: impl Into<String>) -> Self {
        Self {
            card_type: card_type.into(),
            ..Self::default()
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Create the card inside a box.
    #[must_use]
    pub fn in_box(mut self, box_id: impl Into<BoxId>) -> Self {
        self.box_id = Some(box_id.into());
        self
    }

    /// Set the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set an extension field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Make the card active once created.
    #[must_use]
    pub fn activate(mut self) -> Self {
        self.activate = true;
        self
    }

    /// Base info for a card built from these options.
    #[must_use]
    pub fn base_info(&self) -> BaseCardInfo {
        BaseCardInfo {
            card_type: self.card_type.clone(),
            title: self.title.clone(),
            position: self.position,
            size: self.size,
        }
    }

    /// Check the options for malformed input.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Validation`] describing the first problem found.
    pub fn validate(&self) -> ChipsResult<()> {
        validate_card_type(&self.card_type)?;
        validate_title(&self.title)?;
        if let Some(box_id) = &self.box_id {
            validate_id("box id", box_id.as_str())?;
        }
        if let Some(position) = &self.position {
            validate_position(position)?;
        }
        if let Some(size) = &self.size {
            validate_size(size)?;
        }
        Ok(())
    }
}

/// Options for opening a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCardOptions {
    /// Card to open.
    pub id: CardId,
    /// Answer from the local cache when the card is already loaded.
    #[serde(default)]
    pub use_cache: bool,
}

impl OpenCardOptions {
    /// Open the given card, always fetching from the backend.
    #[must_use]
    pub fn new(id: impl Into<CardId>) -> Self {
        Self {
            id: id.into(),
            use_cache: false,
        }
    }

    /// Allow a cached copy to satisfy the request.
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.use_cache = true;
        self
    }

    /// Check the options for malformed input.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Validation`] if the identifier is blank.
    pub fn validate(&self) -> ChipsResult<()> {
        validate_id("card id", self.id.as_str())
    }
}

/// Partial update for a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveCardOptions {
    /// Card to update.
    pub id: CardId,
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Position update.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub position: FieldUpdate<Position>,
    /// Size update.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub size: FieldUpdate<Size>,
    /// Owner update.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub owner: FieldUpdate<String>,
    /// Extension field updates; `None` removes the key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Option<serde_json::Value>>,
}

impl SaveCardOptions {
    /// An empty update for the given card.
    #[must_use]
    pub fn new(id: impl Into<CardId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            position: FieldUpdate::Keep,
            size: FieldUpdate::Keep,
            owner: FieldUpdate::Keep,
            extra: BTreeMap::new(),
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = FieldUpdate::Set(position);
        self
    }

    /// Set an extension field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), Some(value));
        self
    }

    /// Remove an extension field.
    #[must_use]
    pub fn without_extra(mut self, key: impl Into<String>) -> Self {
        self.extra.insert(key.into(), None);
        self
    }

    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.position.is_keep()
            && self.size.is_keep()
            && self.owner.is_keep()
            && self.extra.is_empty()
    }

    /// Check the options for malformed input.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Validation`] describing the first problem found.
    pub fn validate(&self) -> ChipsResult<()> {
        validate_id("card id", self.id.as_str())?;
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let FieldUpdate::Set(position) = &self.position {
            validate_position(position)?;
        }
        if let FieldUpdate::Set(size) = &self.size {
            validate_size(size)?;
        }
        if self.extra.keys().any(|key| key.trim().is_empty()) {
            return Err(ChipsError::Validation(
                "extension field names must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_id(what: &str, id: &str) -> ChipsResult<()> {
    if id.trim().is_empty() {
        return Err(ChipsError::Validation(format!("{what} must not be blank")));
    }
    Ok(())
}

fn validate_card_type(card_type: &str) -> ChipsResult<()> {
    if card_type.is_empty() {
        return Err(ChipsError::Validation("card type is required".to_string()));
    }
    if card_type.len() > MAX_TYPE_LEN {
        return Err(ChipsError::Validation(format!(
            "card type exceeds {MAX_TYPE_LEN} characters"
        )));
    }
    if !card_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ChipsError::Validation(format!(
            "card type {card_type:?} contains invalid characters"
        )));
    }
    Ok(())
}

fn validate_title(title: &str) -> ChipsResult<()> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ChipsError::Validation(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_position(position: &Position) -> ChipsResult<()> {
    if !position.x.is_finite() || !position.y.is_finite() {
        return Err(ChipsError::Validation("position must be finite".to_string()));
    }
    Ok(())
}

fn validate_size(size: &Size) -> ChipsResult<()> {
    let ok = |v: f32| v.is_finite() && v >= 0.0;
    if !ok(size.width) || !ok(size.height) {
        return Err(ChipsError::Validation(
            "size must be finite and non-negative".to_string(),
        ));
    }
    Ok(())
}
