//! Connector integration tests.
//!
//! Exercises the connector against the mock backend and against a
//! deliberately racy backend to verify per-card save serialization.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chips_core::{
    BaseCardInfo, BoxId, Card, CardBox, CardId, CardInfo, ChipsError, ChipsResult,
    CreateCardOptions, ErrorKind, OpenCardOptions, SaveCardOptions,
};
use chips_sdk::{
    BackendMode, CardBackend, MockBackend, MockBox, MockCard, MockSeed, SdkConnector,
    SdkConnectorOptions,
};
use serde_json::json;

fn seed_with_box() -> MockSeed {
    MockSeed::new().with_box(MockBox::new("B1", "Inbox"))
}

// ============================================================================
// Mock scenarios
// ============================================================================

#[tokio::test]
async fn test_create_in_existing_box_and_missing_box() {
    let connector = SdkConnector::new(SdkConnectorOptions::mock(seed_with_box())).unwrap();

    let card = connector
        .create_card(&CreateCardOptions::new("note").in_box("B1"))
        .await
        .expect("create in B1");
    assert_eq!(card.metadata.box_id, Some(BoxId::new("B1")));

    let err = connector
        .create_card(&CreateCardOptions::new("note").in_box("B2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The failed create did not add anything
    assert_eq!(connector.list_cards().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_created_ids_are_unique() {
    let connector = SdkConnector::new(SdkConnectorOptions::mock(MockSeed::new())).unwrap();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..50 {
        let card = connector
            .create_card(&CreateCardOptions::new("note"))
            .await
            .unwrap();
        assert!(seen.insert(card.id));
    }
}

#[tokio::test]
async fn test_open_is_idempotent() {
    let seed = seed_with_box().with_card(MockCard::new("c1", "note").with_title("Hi").in_box("B1"));
    let connector = SdkConnector::new(SdkConnectorOptions::mock(seed)).unwrap();

    let first = connector.open_card(&OpenCardOptions::new("c1")).await.unwrap();
    let second = connector.open_card(&OpenCardOptions::new("c1")).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_ids_are_not_found() {
    let connector = SdkConnector::new(SdkConnectorOptions::mock(MockSeed::new())).unwrap();

    let err = connector
        .open_card(&OpenCardOptions::new("ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = connector
        .save_card(&SaveCardOptions::new("ghost").with_title("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = connector.get_box(&BoxId::new("nope")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_save_merges_partial_updates() {
    let seed = MockSeed::new().with_card(MockCard::new("c1", "note").with_title("Draft"));
    let connector = SdkConnector::new(SdkConnectorOptions::mock(seed)).unwrap();

    connector
        .save_card(&SaveCardOptions::new("c1").with_extra("color", json!("red")))
        .await
        .unwrap();
    let saved = connector
        .save_card(&SaveCardOptions::new("c1").with_extra("size", json!(3)))
        .await
        .unwrap();

    assert_eq!(saved.base.title, "Draft");
    assert_eq!(saved.metadata.extra.get("color"), Some(&json!("red")));
    assert_eq!(saved.metadata.extra.get("size"), Some(&json!(3)));
}

#[tokio::test]
async fn test_seed_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"boxes":[{{"id":"B1","title":"Inbox","cards":["c1"]}}],"cards":[{{"id":"c1","type":"note","box_id":"B1"}}]}}"#
    )
    .unwrap();

    let seed = MockSeed::from_file(file.path()).unwrap();
    let connector = SdkConnector::new(SdkConnectorOptions::mock(seed)).unwrap();
    assert_eq!(connector.mode(), BackendMode::Mock);
    let card_box = connector.get_box(&BoxId::new("B1")).await.unwrap();
    assert_eq!(card_box.cards, vec![CardId::new("c1")]);
}

#[test]
fn test_missing_seed_file_is_validation_error() {
    let err = MockSeed::from_file("/definitely/not/here.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ============================================================================
// Save serialization
// ============================================================================

/// Backend whose save is a non-atomic read / sleep / write.
///
/// Without the connector's save lanes, concurrent saves to one card lose
/// updates against this backend.
struct RacyBackend {
    cards: Mutex<HashMap<CardId, Card>>,
    log: Mutex<Vec<String>>,
}

impl RacyBackend {
    fn with_card(id: &str) -> Self {
        let card = Card::new(
            CardId::new(id),
            BaseCardInfo {
                card_type: "note".into(),
                title: "t".into(),
                position: None,
                size: None,
            },
            1,
        );
        Self {
            cards: Mutex::new(HashMap::from([(card.id.clone(), card)])),
            log: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CardBackend for RacyBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn create_card(&self, _options: &CreateCardOptions) -> ChipsResult<Card> {
        Err(ChipsError::BackendUnavailable("unsupported".into()))
    }

    async fn open_card(&self, id: &CardId) -> ChipsResult<Card> {
        self.cards
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ChipsError::card_not_found(id.as_str()))
    }

    async fn save_card(&self, patch: &SaveCardOptions) -> ChipsResult<Card> {
        let mut card = self.open_card(&patch.id).await?;
        self.log.lock().unwrap().push(format!("start {:?}", patch.title));
        tokio::time::sleep(Duration::from_millis(20)).await;
        card.apply(patch, 2);
        self.cards
            .lock()
            .unwrap()
            .insert(card.id.clone(), card.clone());
        self.log.lock().unwrap().push(format!("end {:?}", patch.title));
        Ok(card)
    }

    async fn delete_card(&self, id: &CardId) -> ChipsResult<()> {
        Err(ChipsError::card_not_found(id.as_str()))
    }

    async fn get_box(&self, id: &BoxId) -> ChipsResult<CardBox> {
        Err(ChipsError::box_not_found(id.as_str()))
    }

    async fn list_boxes(&self) -> ChipsResult<Vec<CardBox>> {
        Ok(Vec::new())
    }

    async fn list_cards(&self) -> ChipsResult<Vec<CardInfo>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_concurrent_disjoint_saves_are_not_lost() {
    let backend = Arc::new(RacyBackend::with_card("c1"));
    let connector = SdkConnector::with_backend(Box::new(SharedRacy(Arc::clone(&backend))));

    let a = SaveCardOptions::new("c1").with_extra("a", json!(1));
    let b = SaveCardOptions::new("c1").with_extra("b", json!(2));
    let (ra, rb) = tokio::join!(connector.save_card(&a), connector.save_card(&b));
    ra.unwrap();
    let last = rb.unwrap();

    assert_eq!(last.metadata.extra.get("a"), Some(&json!(1)));
    assert_eq!(last.metadata.extra.get("b"), Some(&json!(2)));
    assert_eq!(connector.active_save_lanes(), 0);
}

#[tokio::test]
async fn test_saves_to_one_card_run_in_issue_order() {
    let backend = Arc::new(RacyBackend::with_card("c1"));
    let connector = SdkConnector::with_backend(Box::new(SharedRacy(Arc::clone(&backend))));

    let saves: Vec<_> = (0..3)
        .map(|i| SaveCardOptions::new("c1").with_title(format!("v{i}")))
        .collect();
    let results = futures::future::join_all(saves.iter().map(|s| connector.save_card(s))).await;
    assert!(results.iter().all(Result::is_ok));

    let log = backend.log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![
            "start Some(\"v0\")",
            "end Some(\"v0\")",
            "start Some(\"v1\")",
            "end Some(\"v1\")",
            "start Some(\"v2\")",
            "end Some(\"v2\")",
        ]
    );
    let final_card = backend.cards.lock().unwrap()[&CardId::new("c1")].clone();
    assert_eq!(final_card.base.title, "v2");
}

#[tokio::test]
async fn test_mock_latency_still_serializes() {
    let backend = MockBackend::new(MockSeed::new().with_card(MockCard::new("c1", "note")))
        .unwrap()
        .with_latency(Duration::from_millis(50));
    let connector = SdkConnector::with_backend(Box::new(backend));

    let a = SaveCardOptions::new("c1").with_extra("x", json!(true));
    let b = SaveCardOptions::new("c1").with_title("Both");
    let (ra, rb) = tokio::join!(connector.save_card(&a), connector.save_card(&b));
    ra.unwrap();
    let merged = rb.unwrap();
    assert_eq!(merged.base.title, "Both");
    assert_eq!(merged.metadata.extra.get("x"), Some(&json!(true)));
}

/// Lets the test keep a handle on the racy backend the connector owns.
struct SharedRacy(Arc<RacyBackend>);

#[async_trait]
impl CardBackend for SharedRacy {
    fn mode(&self) -> BackendMode {
        self.0.mode()
    }
    async fn create_card(&self, options: &CreateCardOptions) -> ChipsResult<Card> {
        self.0.create_card(options).await
    }
    async fn open_card(&self, id: &CardId) -> ChipsResult<Card> {
        self.0.open_card(id).await
    }
    async fn save_card(&self, patch: &SaveCardOptions) -> ChipsResult<Card> {
        self.0.save_card(patch).await
    }
    async fn delete_card(&self, id: &CardId) -> ChipsResult<()> {
        self.0.delete_card(id).await
    }
    async fn get_box(&self, id: &BoxId) -> ChipsResult<CardBox> {
        self.0.get_box(id).await
    }
    async fn list_boxes(&self) -> ChipsResult<Vec<CardBox>> {
        self.0.list_boxes().await
    }
    async fn list_cards(&self) -> ChipsResult<Vec<CardInfo>> {
        self.0.list_cards().await
    }
}
