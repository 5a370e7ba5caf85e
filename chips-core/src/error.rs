//! Error types for editor and connector operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Chips operations.
pub type ChipsResult<T> = Result<T, ChipsError>;

/// The kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A card.
    Card,
    /// A box.
    Box,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card => f.write_str("card"),
            Self::Box => f.write_str("box"),
        }
    }
}

/// Errors that can occur in editor and connector operations.
#[derive(Debug, Error)]
pub enum ChipsError {
    /// Malformed caller input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced card or box does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up.
        entity: EntityKind,
        /// The identifier that did not resolve.
        id: String,
    },

    /// The backend could not be reached or failed transiently.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The editor or connector has been disposed.
    #[error("Editor has been disposed")]
    Disposed,

    /// Seed or configuration JSON could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`ChipsError`], carried by `card:error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ChipsError::Validation`].
    Validation,
    /// See [`ChipsError::NotFound`].
    NotFound,
    /// See [`ChipsError::BackendUnavailable`].
    BackendUnavailable,
    /// See [`ChipsError::Disposed`].
    Disposed,
    /// See [`ChipsError::Serialization`].
    Serialization,
}

impl ChipsError {
    /// Shorthand for a missing card.
    #[must_use]
    pub fn card_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: EntityKind::Card,
            id: id.into(),
        }
    }

    /// Shorthand for a missing box.
    #[must_use]
    pub fn box_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: EntityKind::Box,
            id: id.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Disposed => ErrorKind::Disposed,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Returns true if this error is transient and the operation may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_backend_unavailable_is_retryable() {
        assert!(ChipsError::BackendUnavailable("down".into()).is_retryable());
        assert!(!ChipsError::Validation("bad".into()).is_retryable());
        assert!(!ChipsError::card_not_found("c1").is_retryable());
        assert!(!ChipsError::Disposed.is_retryable());
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = ChipsError::box_not_found("B2");
        assert_eq!(err.to_string(), "box not found: B2");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::BackendUnavailable).expect("serialize");
        assert_eq!(json, "\"backend_unavailable\"");
    }
}
