//! Shared Store
//!
//! Abstraction over the process-external key-value store the two sessions
//! coordinate through. Change notifications fire in every context *except*
//! the writer's own, mirroring same-device storage-event semantics: a
//! session never observes its own writes through the notification feed.
//!
//! Keys are last-write-wins. Each logical channel holds at most one pending
//! message, not a queue; consumers must tolerate skipped history.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Handle returned by [`SharedStore::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

/// A key change as observed by a non-writing context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The key that was written or removed.
    pub key: String,
    /// The new value, or `None` for a removal.
    pub new_value: Option<String>,
}

/// The store surface the core consumes. All values are strings; every
/// message type JSON-encodes into one slot.
///
/// Reads never fail: a missing key is `None`, indistinguishable from
/// "no new information".
pub trait SharedStore {
    /// Read a key.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a key. Fire-and-forget; notifies other contexts unless the
    /// value is unchanged.
    fn set(&self, key: &str, value: &str);

    /// Remove a key. Notifies other contexts if it existed.
    fn remove(&self, key: &str);

    /// Every key currently present, in sorted order.
    fn keys(&self) -> Vec<String>;

    /// Register a change handler for this context.
    fn subscribe(&self, handler: Rc<dyn Fn(&ChangeEvent)>) -> SubscriptionId;

    /// Drop a previously registered handler.
    fn unsubscribe(&self, id: SubscriptionId);
}

struct Subscriber {
    id: SubscriptionId,
    context: u64,
    handler: Rc<dyn Fn(&ChangeEvent)>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, String>,
    subscribers: Vec<Subscriber>,
    next_context: u64,
    next_subscription: u64,
}

impl Inner {
    fn handlers_except(&self, writer: u64) -> Vec<Rc<dyn Fn(&ChangeEvent)>> {
        self.subscribers
            .iter()
            .filter(|s| s.context != writer)
            .map(|s| Rc::clone(&s.handler))
            .collect()
    }
}

/// In-memory reference store for same-process sessions.
///
/// Each participating context takes its own [`StoreHandle`]; handles share
/// the underlying map but are told apart for notification routing.
#[derive(Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle representing one execution context.
    pub fn handle(&self) -> StoreHandle {
        let mut inner = self.inner.borrow_mut();
        let context = inner.next_context;
        inner.next_context += 1;
        StoreHandle {
            context,
            inner: Rc::clone(&self.inner),
        }
    }
}

/// One context's view of a [`MemoryStore`].
#[derive(Clone)]
pub struct StoreHandle {
    context: u64,
    inner: Rc<RefCell<Inner>>,
}

impl StoreHandle {
    /// Deliver an event to every other context's handlers.
    ///
    /// The inner borrow is released before any handler runs, so handlers
    /// may freely read (or even write) the store.
    fn notify_others(&self, event: ChangeEvent) {
        let handlers = self.inner.borrow().handlers_except(self.context);
        for handler in handlers {
            handler(&event);
        }
    }
}

impl SharedStore for StoreHandle {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.borrow().entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let previous = self
            .inner
            .borrow_mut()
            .entries
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() == Some(value) {
            return;
        }
        self.notify_others(ChangeEvent {
            key: key.to_string(),
            new_value: Some(value.to_string()),
        });
    }

    fn remove(&self, key: &str) {
        let existed = self.inner.borrow_mut().entries.remove(key).is_some();
        if !existed {
            return;
        }
        self.notify_others(ChangeEvent {
            key: key.to_string(),
            new_value: None,
        });
    }

    fn keys(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }

    fn subscribe(&self, handler: Rc<dyn Fn(&ChangeEvent)>) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner.subscribers.push(Subscriber {
            id,
            context: self.context,
            handler,
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.borrow_mut().subscribers.retain(|s| s.id != id);
    }
}
