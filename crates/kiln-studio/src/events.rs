use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::thread::{self, ThreadId};

use kiln_catalog::TypeDescriptor;

use crate::creation::CreatedAsset;
use crate::settings::Setting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    FavoriteAdded,
    FavoriteRemoved,
    CartAdd,
    CartRemove,
    AssetCreated,
    SettingChanged,
    HistoryCleared,
    FavoritesCleared,
}

#[derive(Debug, Clone)]
pub enum StudioEvent {
    FavoriteAdded(TypeDescriptor),
    FavoriteRemoved(TypeDescriptor),
    CartAdd(TypeDescriptor),
    CartRemove(TypeDescriptor),
    AssetCreated(CreatedAsset),
    SettingChanged(Setting),
    HistoryCleared,
    FavoritesCleared,
}

impl StudioEvent {
    pub fn topic(&self) -> Topic {
        match self {
            StudioEvent::FavoriteAdded(_) => Topic::FavoriteAdded,
            StudioEvent::FavoriteRemoved(_) => Topic::FavoriteRemoved,
            StudioEvent::CartAdd(_) => Topic::CartAdd,
            StudioEvent::CartRemove(_) => Topic::CartRemove,
            StudioEvent::AssetCreated(_) => Topic::AssetCreated,
            StudioEvent::SettingChanged(_) => Topic::SettingChanged,
            StudioEvent::HistoryCleared => Topic::HistoryCleared,
            StudioEvent::FavoritesCleared => Topic::FavoritesCleared,
        }
    }
}

type Handler = Rc<dyn Fn(&StudioEvent)>;

struct Subscriber {
    id: u64,
    topic: Topic,
    handler: Handler,
}

struct EventBusInner {
    ui_thread: ThreadId,
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<Subscriber>>,
}

/// Synchronous publish/subscribe bus shared by the studio stores.
///
/// Handlers run on the publishing call stack in subscription order. A handler
/// may publish again; the nested event is fully delivered before the outer
/// delivery resumes.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<EventBusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(EventBusInner {
                ui_thread: thread::current().id(),
                next_id: Cell::new(1),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    fn assert_ui_thread(&self) {
        let current = thread::current().id();
        assert_eq!(
            current, self.inner.ui_thread,
            "studio event bus accessed from a foreign thread"
        );
    }

    /// Registers `handler` for `topic`. Delivery stops when the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&StudioEvent) + 'static,
    {
        self.assert_ui_thread();
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            topic,
            handler: Rc::new(handler),
        });
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, event: StudioEvent) {
        self.assert_ui_thread();
        let topic = event.topic();
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter(|subscriber| subscriber.topic == topic)
            .map(|subscriber| Rc::clone(&subscriber.handler))
            .collect();
        tracing::trace!(?topic, receivers = handlers.len(), "publish");
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|subscriber| subscriber.topic == topic)
            .count()
    }
}

/// Keeps a handler registered on an [`EventBus`] for as long as it lives.
pub struct Subscription {
    id: u64,
    bus: Weak<EventBusInner>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .subscribers
                .borrow_mut()
                .retain(|subscriber| subscriber.id != self.id);
        }
    }
}
