//! Typed publish/subscribe for cross-component notification.
//!
//! ## Usage
//!
//! ```text
//! 1. Consumers register handlers per event name with `on` / `once`
//! 2. Producers call `emit` after a state change completes
//! 3. Handlers run synchronously, in registration order
//! ```
//!
//! A failing or panicking handler never stops the remaining handlers; the
//! failure goes to the emitter's error sink instead of the caller of `emit`.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde::Serialize;

use crate::card::{Card, CardId};
use crate::error::{ChipsError, ErrorKind};
use crate::store::{EditorStoreState, UiStoreState};

/// Event names emitted by the editor.
pub mod names {
    /// A card was created.
    pub const CARD_CREATED: &str = "card:created";
    /// A card was opened.
    pub const CARD_OPENED: &str = "card:opened";
    /// A card was saved.
    pub const CARD_SAVED: &str = "card:saved";
    /// A card was deleted from the backend.
    pub const CARD_DELETED: &str = "card:deleted";
    /// A card was closed (dropped from the local cache).
    pub const CARD_CLOSED: &str = "card:closed";
    /// An operation failed.
    pub const CARD_ERROR: &str = "card:error";
    /// The editor store changed.
    pub const STORE_EDITOR: &str = "store:editor";
    /// The card store changed.
    pub const STORE_CARDS: &str = "store:cards";
    /// The UI store changed.
    pub const STORE_UI: &str = "store:ui";
}

/// An event that can be dispatched by an [`EventEmitter`].
pub trait Event {
    /// The name handlers subscribe to.
    fn name(&self) -> &'static str;
}

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler<E> = Arc<dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync>;
type ErrorSink = Arc<dyn Fn(&HandlerFailure) + Send + Sync>;

/// Identifier of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A handler failure reported to the error sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Name of the event being dispatched.
    pub event: &'static str,
    /// The failing handler.
    pub listener: ListenerId,
    /// Error message or panic payload.
    pub message: String,
    /// Whether the handler panicked rather than returning an error.
    pub panicked: bool,
}

struct Listener<E> {
    id: ListenerId,
    handler: Handler<E>,
    once: bool,
}

struct Inner<E> {
    listeners: RwLock<HashMap<String, Vec<Listener<E>>>>,
    next_id: AtomicU64,
    sink: RwLock<ErrorSink>,
}

/// Typed event emitter.
///
/// Cloning yields another handle to the same registrations.
pub struct EventEmitter<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventEmitter")
            .field("events", &listeners.len())
            .finish_non_exhaustive()
    }
}

impl<E: Event + 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event + 'static> EventEmitter<E> {
    /// Create an emitter whose error sink logs through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        let sink: ErrorSink = Arc::new(|failure: &HandlerFailure| {
            tracing::warn!(
                event = failure.event,
                listener = %failure.listener,
                panicked = failure.panicked,
                "Event handler failed: {}",
                failure.message
            );
        });
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                sink: RwLock::new(sink),
            }),
        }
    }

    /// Replace the sink that receives handler failures.
    pub fn set_error_sink<F>(&self, sink: F)
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        *self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(sink);
    }

    /// Register a handler for `name`.
    pub fn on<F>(&self, name: &str, handler: F) -> Subscription<E>
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(handler), false)
    }

    /// Register a handler that is removed before its first invocation.
    pub fn once<F>(&self, name: &str, handler: F) -> Subscription<E>
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(handler), true)
    }

    fn register(&self, name: &str, handler: Handler<E>, once: bool) -> Subscription<E> {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .push(Listener { id, handler, once });
        Subscription {
            name: name.to_string(),
            id,
            emitter: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        remove_listener(&self.inner, name, id)
    }

    /// Dispatch `event` to every handler currently registered for its name.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &E) -> usize {
        let name = event.name();
        let handlers: Vec<(ListenerId, Handler<E>)> = {
            let mut listeners = self
                .inner
                .listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(list) = listeners.get_mut(name) else {
                return 0;
            };
            let snapshot = list
                .iter()
                .map(|l| (l.id, Arc::clone(&l.handler)))
                .collect();
            list.retain(|l| !l.once);
            if list.is_empty() {
                listeners.remove(name);
            }
            snapshot
        };

        for (id, handler) in &handlers {
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => HandlerFailure {
                    event: name,
                    listener: *id,
                    message: err.to_string(),
                    panicked: false,
                },
                Err(payload) => HandlerFailure {
                    event: name,
                    listener: *id,
                    message: panic_message(payload.as_ref()),
                    panicked: true,
                },
            };
            let sink = Arc::clone(
                &self
                    .inner
                    .sink
                    .read()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            sink(&failure);
        }

        handlers.len()
    }

    /// Number of handlers registered for `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Drop every registration.
    pub fn remove_all_listeners(&self) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn remove_listener<E>(inner: &Inner<E>, name: &str, id: ListenerId) -> bool {
    let mut listeners = inner
        .listeners
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let Some(list) = listeners.get_mut(name) else {
        return false;
    };
    let before = list.len();
    list.retain(|l| l.id != id);
    let removed = list.len() != before;
    if list.is_empty() {
        listeners.remove(name);
    }
    removed
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Handle returned by [`EventEmitter::on`] and [`EventEmitter::once`].
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::dispose`] to remove it.
#[derive(Debug)]
pub struct Subscription<E> {
    name: String,
    id: ListenerId,
    emitter: Weak<Inner<E>>,
}

impl<E> Subscription<E> {
    /// The registered handler's id.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// The event name the handler is registered for.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.name
    }

    /// Unregister the handler. Returns false if it was already gone.
    pub fn dispose(self) -> bool {
        self.emitter
            .upgrade()
            .is_some_and(|inner| remove_listener(&inner, &self.name, self.id))
    }
}

impl<E> fmt::Debug for Inner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner").finish_non_exhaustive()
    }
}

/// Payload of a `card:error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardErrorEvent {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human readable message.
    pub message: String,
    /// The editor operation that failed (e.g. `save_card`).
    pub operation: &'static str,
    /// Card the operation targeted, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
}

impl CardErrorEvent {
    /// Build the payload for a failed operation.
    #[must_use]
    pub fn from_error(operation: &'static str, card_id: Option<CardId>, error: &ChipsError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            operation,
            card_id,
        }
    }
}

/// What happened to the card store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "id", rename_all = "lowercase")]
pub enum CardChange {
    /// A card was inserted or updated.
    Upserted(CardId),
    /// A card was removed.
    Removed(CardId),
}

/// Events emitted by the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum EditorEvent {
    /// A card was created.
    #[serde(rename = "card:created")]
    CardCreated(Card),
    /// A card was opened.
    #[serde(rename = "card:opened")]
    CardOpened(Card),
    /// A card was saved; carries the merged post-save card.
    #[serde(rename = "card:saved")]
    CardSaved(Card),
    /// A card was deleted from the backend.
    #[serde(rename = "card:deleted")]
    CardDeleted(CardId),
    /// A card was dropped from the local cache.
    #[serde(rename = "card:closed")]
    CardClosed(CardId),
    /// An operation failed.
    #[serde(rename = "card:error")]
    CardError(CardErrorEvent),
    /// The editor store changed; carries the new snapshot.
    #[serde(rename = "store:editor")]
    EditorStoreChanged(EditorStoreState),
    /// The card store changed.
    #[serde(rename = "store:cards")]
    CardStoreChanged(CardChange),
    /// The UI store changed; carries the new snapshot.
    #[serde(rename = "store:ui")]
    UiStoreChanged(UiStoreState),
}

impl Event for EditorEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::CardCreated(_) => names::CARD_CREATED,
            Self::CardOpened(_) => names::CARD_OPENED,
            Self::CardSaved(_) => names::CARD_SAVED,
            Self::CardDeleted(_) => names::CARD_DELETED,
            Self::CardClosed(_) => names::CARD_CLOSED,
            Self::CardError(_) => names::CARD_ERROR,
            Self::EditorStoreChanged(_) => names::STORE_EDITOR,
            Self::CardStoreChanged(_) => names::STORE_CARDS,
            Self::UiStoreChanged(_) => names::STORE_UI,
        }
    }
}
