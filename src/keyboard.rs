//! Keyboard visibility events and scoped listener subscriptions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::lock;

/// Keyboard visibility change reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardEvent {
    DidShow,
    DidHide,
}

pub type KeyboardListener = Arc<dyn Fn(KeyboardEvent) + Send + Sync>;

/// Source of keyboard visibility events.
pub trait KeyboardEvents: Send + Sync {
    /// Registers `listener` until the returned subscription is dropped.
    fn subscribe(&self, listener: KeyboardListener) -> KeyboardSubscription;
}

/// Registration guard; the listener is removed when this is dropped.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct KeyboardSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl KeyboardSubscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregisters now instead of at drop.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for KeyboardSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for KeyboardSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardSubscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

type Listeners = Arc<Mutex<BTreeMap<u64, KeyboardListener>>>;

/// In-process keyboard event bus for hosts that forward platform
/// keyboard notifications.
///
/// Each subscription only ever removes its own listener.
#[derive(Default)]
pub struct KeyboardBus {
    listeners: Listeners,
    next_id: AtomicU64,
}

impl KeyboardBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every current listener.
    pub fn emit(&self, event: KeyboardEvent) {
        // Snapshot so listeners can (un)subscribe while being notified.
        let listeners: Vec<KeyboardListener> = lock(&self.listeners).values().cloned().collect();
        trace!("Keyboard {:?} -> {} listener(s)", event, listeners.len());
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl KeyboardEvents for KeyboardBus {
    fn subscribe(&self, listener: KeyboardListener) -> KeyboardSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, listener);

        let listeners = Arc::downgrade(&self.listeners);
        KeyboardSubscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                lock(&listeners).remove(&id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(bus: &KeyboardBus) -> (Arc<Mutex<Vec<KeyboardEvent>>>, KeyboardSubscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(Arc::new(move |event: KeyboardEvent| sink.lock().unwrap().push(event)));
        (seen, sub)
    }

    #[test]
    fn delivers_to_all_listeners() {
        let bus = KeyboardBus::new();
        let (first, _a) = recording(&bus);
        let (second, _b) = recording(&bus);

        bus.emit(KeyboardEvent::DidShow);
        bus.emit(KeyboardEvent::DidHide);

        let expected = vec![KeyboardEvent::DidShow, KeyboardEvent::DidHide];
        assert_eq!(*first.lock().unwrap(), expected);
        assert_eq!(*second.lock().unwrap(), expected);
    }

    #[test]
    fn dropping_a_subscription_only_removes_its_listener() {
        let bus = KeyboardBus::new();
        let (first, a) = recording(&bus);
        let (second, _b) = recording(&bus);
        assert_eq!(bus.listener_count(), 2);

        drop(a);
        assert_eq!(bus.listener_count(), 1);

        bus.emit(KeyboardEvent::DidShow);
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec![KeyboardEvent::DidShow]);
    }

    #[test]
    fn explicit_release_and_outliving_the_bus() {
        let bus = KeyboardBus::new();
        let (_, a) = recording(&bus);
        a.release();
        assert_eq!(bus.listener_count(), 0);

        let (_, b) = recording(&bus);
        drop(bus);
        drop(b);
    }
}
