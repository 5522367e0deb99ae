//! An in-memory push transport.
//!
//! Useful for tests, and for hosts where the real reactive query client lives outside Rust (e.g. in JS)
//! and forwards each result it receives with [`LocalHub::publish`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use slotmap::SlotMap;

use crate::server_view::{Subscription, SubscriptionKey, SubscriptionTransport};

slotmap::new_key_type! {
    struct HubListenerKey;
}

struct HubListener<V> {
    key: SubscriptionKey,
    on_push: Rc<dyn Fn(V)>,
}

struct HubInner<V> {
    listeners: SlotMap<HubListenerKey, HubListener<V>>,
    latest: HashMap<SubscriptionKey, V>,
}

/// Clones share the same listeners and values.
pub struct LocalHub<V> {
    inner: Rc<RefCell<HubInner<V>>>,
}

impl<V> Clone for LocalHub<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: Clone + 'static> Default for LocalHub<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + 'static> LocalHub<V> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HubInner {
                listeners: SlotMap::with_key(),
                latest: HashMap::new(),
            })),
        }
    }

    /// Record a new value for `key` and deliver it to everyone subscribed to it.
    pub fn publish(&self, key: &SubscriptionKey, value: V) {
        // never call out while borrowed: a listener may subscribe or unsubscribe
        let targets: Vec<Rc<dyn Fn(V)>> = {
            let mut inner = self.inner.borrow_mut();
            inner.latest.insert(key.clone(), value.clone());
            inner
                .listeners
                .values()
                .filter(|listener| &listener.key == key)
                .map(|listener| Rc::clone(&listener.on_push))
                .collect()
        };
        log::trace!("Publishing {key} to {} listener(s)", targets.len());
        for on_push in targets {
            on_push(value.clone());
        }
    }

    pub fn latest(&self, key: &SubscriptionKey) -> Option<V> {
        self.inner.borrow().latest.get(key).cloned()
    }

    pub fn num_subscribers(&self, key: &SubscriptionKey) -> usize {
        self.inner
            .borrow()
            .listeners
            .values()
            .filter(|listener| &listener.key == key)
            .count()
    }
}

impl<V: Clone + 'static> SubscriptionTransport<V> for LocalHub<V> {
    fn subscribe(&self, key: &SubscriptionKey, on_push: Rc<dyn Fn(V)>) -> Subscription {
        let (listener_key, current) = {
            let mut inner = self.inner.borrow_mut();
            let listener_key = inner.listeners.insert(HubListener {
                key: key.clone(),
                on_push: Rc::clone(&on_push),
            });
            (listener_key, inner.latest.get(key).cloned())
        };

        // a reactive query delivers its current result straight away
        if let Some(current) = current {
            on_push(current);
        }

        let inner: Weak<RefCell<HubInner<V>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.borrow_mut().listeners.remove(listener_key);
            }
        })
    }
}
