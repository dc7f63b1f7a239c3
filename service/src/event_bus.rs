//! Named, payload-less notifications. A query's name is its topic; every
//! widget showing that query subscribes and re-reads the query on notify.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    topics: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.inner.topics.lock();
        f.debug_struct("EventBus")
            .field("topics", &topics.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` on `topic`. It stays registered until the returned
    /// handle is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, topic: impl Into<String>, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .lock()
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Calls every listener currently on `topic`, in subscription order, and
    /// returns how many were called. Listeners run after the lock is
    /// released, so they may subscribe or publish themselves.
    pub fn publish(&self, topic: &str) -> usize {
        let listeners = match self.inner.topics.lock().get(topic) {
            Some(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect::<Vec<_>>(),
            None => return 0,
        };
        for listener in listeners.iter() {
            listener();
        }
        listeners.len()
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner.topics.lock().get(topic).map_or(0, |l| l.len())
    }
}

/// Handle returned by [`EventBus::subscribe`]; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut topics = bus.topics.lock();
        if let Some(listeners) = topics.get_mut(&self.topic) {
            listeners.retain(|(id, _)| *id != self.id);
            if listeners.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}
