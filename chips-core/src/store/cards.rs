//! Card cache keyed by identifier.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::card::{Card, CardId};

/// Snapshot of the card store, in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardStoreState {
    /// Cached cards, oldest first.
    pub cards: Vec<Card>,
}

impl CardStoreState {
    /// Look up a card in the snapshot.
    #[must_use]
    pub fn get(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|c| &c.id == id)
    }

    /// Number of cards in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Card store: exactly one entry per identifier.
#[derive(Debug, Clone, Default)]
pub struct CardStore {
    cards: HashMap<CardId, Card>,
    /// Identifiers in insertion order, for list views.
    order: Vec<CardId>,
}

impl CardStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a card, or replace the existing entry with the same id.
    ///
    /// The incoming card wins field by field; the entry keeps its original
    /// creation time and its position in the order. Returns the stored card.
    pub fn upsert(&mut self, card: Card) -> &Card {
        match self.cards.entry(card.id.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.merge_from(card);
                existing
            }
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(card)
            }
        }
    }

    /// Remove a card.
    pub fn remove(&mut self, id: &CardId) -> Option<Card> {
        let card = self.cards.remove(id)?;
        self.order.retain(|eid| eid != id);
        Some(card)
    }

    /// Get a card by identifier.
    #[must_use]
    pub fn get(&self, id: &CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    /// Whether a card is cached.
    #[must_use]
    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.contains_key(id)
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &CardId> {
        self.order.iter()
    }

    /// Cards in insertion order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.order.iter().filter_map(|id| self.cards.get(id))
    }

    /// Number of cached cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Owned copy of the state.
    #[must_use]
    pub fn snapshot(&self) -> CardStoreState {
        CardStoreState {
            cards: self.cards().cloned().collect(),
        }
    }
}
