//! In-memory backend seeded with fixture cards and boxes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chips_core::{
    now_ms, BaseCardInfo, BoxId, Card, CardBox, CardId, CardInfo, ChipsError, ChipsResult,
    CreateCardOptions, SaveCardOptions,
};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendMode, CardBackend};

/// Mock representation of a box.
pub type MockBox = CardBox;

/// Seed record for a card in the mock backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockCard {
    /// Card identifier.
    pub id: CardId,
    /// Card type tag.
    #[serde(rename = "type")]
    pub card_type: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Containing box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_id: Option<BoxId>,
    /// Owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Extension fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Creation time; defaults to seeding time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}

impl MockCard {
    /// A seed card of the given type.
    #[must_use]
    pub fn new(id: impl Into<CardId>, card_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            card_type: card_type.into(),
            title: String::new(),
            box_id: None,
            owner: None,
            extra: BTreeMap::new(),
            created_at: None,
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Place the card in a box.
    #[must_use]
    pub fn in_box(mut self, box_id: impl Into<BoxId>) -> Self {
        self.box_id = Some(box_id.into());
        self
    }

    fn into_card(self, now: u64) -> Card {
        let created = self.created_at.unwrap_or(now);
        let mut card = Card::new(
            self.id,
            BaseCardInfo {
                card_type: self.card_type,
                title: self.title,
                position: None,
                size: None,
            },
            created,
        );
        card.metadata.box_id = self.box_id;
        card.metadata.owner = self.owner;
        card.metadata.extra = self.extra;
        card
    }
}

/// Fixture data for a [`MockBackend`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockSeed {
    /// Seed cards.
    #[serde(default)]
    pub cards: Vec<MockCard>,
    /// Seed boxes.
    #[serde(default)]
    pub boxes: Vec<MockBox>,
}

impl MockSeed {
    /// An empty seed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a seed card.
    #[must_use]
    pub fn with_card(mut self, card: MockCard) -> Self {
        self.cards.push(card);
        self
    }

    /// Add a seed box.
    #[must_use]
    pub fn with_box(mut self, card_box: MockBox) -> Self {
        self.boxes.push(card_box);
        self
    }

    /// Parse a seed from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Serialization`] if the JSON is malformed.
    pub fn from_json(json: &str) -> ChipsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a seed from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Validation`] if the file cannot be read and
    /// [`ChipsError::Serialization`] if it is not a valid seed.
    pub fn from_file(path: impl AsRef<Path>) -> ChipsResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChipsError::Validation(format!("cannot read seed {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// Handle that makes upcoming mock calls fail as if the backend were down.
///
/// Shares only the failure counter with its backend.
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    remaining: Arc<AtomicU32>,
}

impl FaultInjector {
    /// Fail the next `count` backend calls with `BackendUnavailable`.
    pub fn fail_next(&self, count: u32) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    /// Number of failures still armed.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    fn trip(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Debug, Default)]
struct MockState {
    cards: HashMap<CardId, Card>,
    /// Card ids in creation order.
    order: Vec<CardId>,
    boxes: Vec<MockBox>,
}

impl MockState {
    fn box_mut(&mut self, id: &BoxId) -> Option<&mut MockBox> {
        self.boxes.iter_mut().find(|b| &b.id == id)
    }
}

/// In-memory [`CardBackend`].
#[derive(Debug)]
pub struct MockBackend {
    state: RwLock<MockState>,
    latency: Option<Duration>,
    faults: FaultInjector,
}

impl MockBackend {
    /// Build a backend from seed data.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Validation`] if the seed has duplicate
    /// identifiers or references that do not resolve.
    pub fn new(seed: MockSeed) -> ChipsResult<Self> {
        let now = now_ms();
        let mut state = MockState::default();

        for card_box in seed.boxes {
            if state.boxes.iter().any(|b| b.id == card_box.id) {
                return Err(ChipsError::Validation(format!(
                    "duplicate seed box: {}",
                    card_box.id
                )));
            }
            state.boxes.push(card_box);
        }

        for mock in seed.cards {
            if state.cards.contains_key(&mock.id) {
                return Err(ChipsError::Validation(format!(
                    "duplicate seed card: {}",
                    mock.id
                )));
            }
            let card = mock.into_card(now);
            if let Some(box_id) = &card.metadata.box_id {
                let card_box = state.box_mut(box_id).ok_or_else(|| {
                    ChipsError::Validation(format!(
                        "seed card {} references unknown box {box_id}",
                        card.id
                    ))
                })?;
                if !card_box.contains(&card.id) {
                    card_box.cards.push(card.id.clone());
                }
            }
            state.order.push(card.id.clone());
            state.cards.insert(card.id.clone(), card);
        }

        for card_box in &state.boxes {
            for card_id in &card_box.cards {
                let card = state.cards.get(card_id).ok_or_else(|| {
                    ChipsError::Validation(format!(
                        "seed box {} lists unknown card {card_id}",
                        card_box.id
                    ))
                })?;
                if card.metadata.box_id.as_ref() != Some(&card_box.id) {
                    return Err(ChipsError::Validation(format!(
                        "seed box {} lists card {card_id} that belongs elsewhere",
                        card_box.id
                    )));
                }
            }
        }

        Ok(Self {
            state: RwLock::new(state),
            latency: None,
            faults: FaultInjector::default(),
        })
    }

    /// An empty backend.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            state: RwLock::new(MockState::default()),
            latency: None,
            faults: FaultInjector::default(),
        }
    }

    /// Delay every call by `latency` to simulate I/O.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Handle for injecting transient failures.
    #[must_use]
    pub fn fault_injector(&self) -> FaultInjector {
        self.faults.clone()
    }

    async fn enter(&self, operation: &str) -> ChipsResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.faults.trip() {
            tracing::debug!(operation, "Mock backend injected failure");
            return Err(ChipsError::BackendUnavailable(format!(
                "mock backend unavailable during {operation}"
            )));
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CardBackend for MockBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Mock
    }

    async fn create_card(&self, options: &CreateCardOptions) -> ChipsResult<Card> {
        self.enter("create_card").await?;
        let mut state = self.write();

        if let Some(box_id) = &options.box_id {
            if state.box_mut(box_id).is_none() {
                return Err(ChipsError::box_not_found(box_id.as_str()));
            }
        }

        let mut id = CardId::generate();
        while state.cards.contains_key(&id) {
            id = CardId::generate();
        }

        let mut card = Card::new(id.clone(), options.base_info(), now_ms());
        card.metadata.box_id.clone_from(&options.box_id);
        card.metadata.owner.clone_from(&options.owner);
        card.metadata.extra.clone_from(&options.extra);

        if let Some(card_box) = options.box_id.as_ref().and_then(|b| state.box_mut(b)) {
            card_box.cards.push(id.clone());
        }
        state.order.push(id.clone());
        state.cards.insert(id, card.clone());
        Ok(card)
    }

    async fn open_card(&self, id: &CardId) -> ChipsResult<Card> {
        self.enter("open_card").await?;
        self.read()
            .cards
            .get(id)
            .cloned()
            .ok_or_else(|| ChipsError::card_not_found(id.as_str()))
    }

    async fn save_card(&self, patch: &SaveCardOptions) -> ChipsResult<Card> {
        self.enter("save_card").await?;
        let mut state = self.write();
        let card = state
            .cards
            .get_mut(&patch.id)
            .ok_or_else(|| ChipsError::card_not_found(patch.id.as_str()))?;
        card.apply(patch, now_ms());
        Ok(card.clone())
    }

    async fn delete_card(&self, id: &CardId) -> ChipsResult<()> {
        self.enter("delete_card").await?;
        let mut state = self.write();
        if state.cards.remove(id).is_none() {
            return Err(ChipsError::card_not_found(id.as_str()));
        }
        state.order.retain(|cid| cid != id);
        for card_box in &mut state.boxes {
            card_box.cards.retain(|cid| cid != id);
        }
        Ok(())
    }

    async fn get_box(&self, id: &BoxId) -> ChipsResult<CardBox> {
        self.enter("get_box").await?;
        self.read()
            .boxes
            .iter()
            .find(|b| &b.id == id)
            .cloned()
            .ok_or_else(|| ChipsError::box_not_found(id.as_str()))
    }

    async fn list_boxes(&self) -> ChipsResult<Vec<CardBox>> {
        self.enter("list_boxes").await?;
        Ok(self.read().boxes.clone())
    }

    async fn list_cards(&self) -> ChipsResult<Vec<CardInfo>> {
        self.enter("list_cards").await?;
        let state = self.read();
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.cards.get(id))
            .map(Card::info)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chips_core::ErrorKind;

    fn seeded() -> MockBackend {
        let seed = MockSeed::new()
            .with_box(MockBox::new("B1", "Inbox"))
            .with_card(MockCard::new("c1", "note").with_title("First").in_box("B1"));
        MockBackend::new(seed).expect("valid seed")
    }

    #[tokio::test]
    async fn test_seed_links_cards_into_boxes() {
        let backend = seeded();
        let card_box = backend.get_box(&BoxId::new("B1")).await.unwrap();
        assert_eq!(card_box.cards, vec![CardId::new("c1")]);
    }

    #[test]
    fn test_seed_rejects_unknown_box() {
        let seed = MockSeed::new().with_card(MockCard::new("c1", "note").in_box("nope"));
        let err = MockBackend::new(seed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_seed_rejects_dangling_box_entry() {
        let mut card_box = MockBox::new("B1", "Inbox");
        card_box.cards.push(CardId::new("ghost"));
        let err = MockBackend::new(MockSeed::new().with_box(card_box)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_seed_rejects_duplicates() {
        let seed = MockSeed::new()
            .with_card(MockCard::new("c1", "note"))
            .with_card(MockCard::new("c1", "note"));
        assert!(MockBackend::new(seed).is_err());
    }

    #[test]
    fn test_seed_from_json() {
        let seed = MockSeed::from_json(
            r#"{"boxes":[{"id":"B1","title":"Inbox"}],"cards":[{"id":"c1","type":"note","box_id":"B1"}]}"#,
        )
        .expect("parse");
        assert_eq!(seed.cards.len(), 1);
        assert!(MockBackend::new(seed).is_ok());
    }

    #[tokio::test]
    async fn test_create_appends_to_box() {
        let backend = seeded();
        let card = backend
            .create_card(&CreateCardOptions::new("note").in_box("B1"))
            .await
            .unwrap();
        let card_box = backend.get_box(&BoxId::new("B1")).await.unwrap();
        assert_eq!(card_box.cards.last(), Some(&card.id));
    }

    #[tokio::test]
    async fn test_delete_detaches_from_box() {
        let backend = seeded();
        backend.delete_card(&CardId::new("c1")).await.unwrap();
        let card_box = backend.get_box(&BoxId::new("B1")).await.unwrap();
        assert!(card_box.cards.is_empty());
        let err = backend.open_card(&CardId::new("c1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_fault_injector_fails_next_calls() {
        let backend = seeded();
        let faults = backend.fault_injector();
        faults.fail_next(2);

        for _ in 0..2 {
            let err = backend.open_card(&CardId::new("c1")).await.unwrap_err();
            assert!(err.is_retryable());
        }
        assert_eq!(faults.remaining(), 0);
        assert!(backend.open_card(&CardId::new("c1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_cards_in_creation_order() {
        let backend = seeded();
        let second = backend
            .create_card(&CreateCardOptions::new("todo"))
            .await
            .unwrap();
        let ids: Vec<_> = backend
            .list_cards()
            .await
            .unwrap()
            .into_iter()
            .map(|info| info.id)
            .collect();
        assert_eq!(ids, vec![CardId::new("c1"), second.id]);
    }
}
