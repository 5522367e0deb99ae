//! # Binding
//! One displayed quantity: a reconciler shared between the UI, the subscription transport,
//! and any write or timer that finishes later.
//!
//! Everything is single threaded. Clones share state; we never hold a borrow while calling out
//! (listeners, transports), so re-entrant calls from a listener are fine.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use slotmap::SlotMap;

use crate::clock::Clock;
use crate::lifecycle::{LifecycleGuard, MountScope};
use crate::overlay::{Confirmation, Exact};
use crate::reconcile::{Reconciler, Reconciliation, Verdict};
use crate::server_view::{ServerView, Subscription, SubscriptionKey, SubscriptionTransport};

slotmap::new_key_type! {
    pub struct ListenerKey;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BindingConfig {
    /// How long an unconfirmed prediction is trusted.
    pub stale_after_ms: u64,
}

impl BindingConfig {
    pub const fn stale_after_ms(stale_after_ms: u64) -> Self {
        Self { stale_after_ms }
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: 3_000,
        }
    }
}

/// Render callbacks. Also usable by views built on top of bindings.
pub struct Listeners<V> {
    map: RefCell<SlotMap<ListenerKey, Rc<dyn Fn(&V)>>>,
}

impl<V> Default for Listeners<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Listeners<V> {
    pub fn new() -> Self {
        Self {
            map: RefCell::new(SlotMap::with_key()),
        }
    }

    pub fn insert(&self, listener: impl Fn(&V) + 'static) -> ListenerKey {
        self.map.borrow_mut().insert(Rc::new(listener))
    }

    pub fn remove(&self, key: ListenerKey) {
        self.map.borrow_mut().remove(key);
    }

    pub fn clear(&self) {
        self.map.borrow_mut().clear();
    }

    pub fn notify(&self, value: &V) {
        let targets: Vec<Rc<dyn Fn(&V)>> = self.map.borrow().values().cloned().collect();
        for listener in targets {
            listener(value);
        }
    }
}

struct Shared<V, C> {
    reconciler: RefCell<Reconciler<V>>,
    confirmation: C,
    config: BindingConfig,
    clock: Rc<dyn Clock>,
    guard: LifecycleGuard,
    listeners: Listeners<V>,
    subscription: RefCell<Option<Subscription>>,
}

pub struct Binding<V, C = Exact> {
    shared: Rc<Shared<V, C>>,
}

impl<V, C> Clone for Binding<V, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<V, C> Binding<V, C>
where
    V: Clone + PartialEq + fmt::Debug + 'static,
    C: Confirmation<V> + 'static,
{
    pub fn new(seed: V, confirmation: C, config: BindingConfig, clock: Rc<dyn Clock>) -> Self {
        Self {
            shared: Rc::new(Shared {
                reconciler: RefCell::new(Reconciler::new(seed)),
                confirmation,
                config,
                clock,
                guard: LifecycleGuard::new(),
                listeners: Listeners::new(),
                subscription: RefCell::new(None),
            }),
        }
    }

    pub fn guard(&self) -> &LifecycleGuard {
        &self.shared.guard
    }

    pub fn is_live(&self) -> bool {
        self.shared.guard.is_live()
    }

    pub fn stale_after(&self) -> Duration {
        self.shared.config.stale_after()
    }

    /// The value to render right now. Retires the overlay if it has been confirmed or gone stale.
    pub fn displayed(&self) -> V {
        if !self.is_live() {
            return self.shared.reconciler.borrow().peek().clone();
        }
        self.reconcile().value
    }

    pub fn server(&self) -> ServerView<V> {
        self.shared.reconciler.borrow().server().clone()
    }

    pub fn has_overlay(&self) -> bool {
        self.shared.reconciler.borrow().overlay().is_some()
    }

    fn reconcile(&self) -> Reconciliation<V> {
        let shared = &self.shared;
        let now = shared.clock.now();
        let result = shared.reconciler.borrow_mut().reconcile(
            now,
            shared.config.stale_after(),
            &shared.confirmation,
        );
        match result.verdict {
            Verdict::Confirmed => log::trace!("Prediction confirmed: {:?}", result.value),
            Verdict::StaleOverlayAbandoned => {
                log::debug!("Stale prediction abandoned, now showing {:?}", result.value)
            }
            Verdict::Settled | Verdict::Pending => {}
        }
        result
    }

    /// Reconcile, and tell listeners if the displayed value moved.
    fn reconcile_and_notify(&self, before: V) {
        let after = self.reconcile().value;
        if after != before {
            self.shared.listeners.notify(&after);
        }
    }

    /// A value from the subscription transport.
    pub fn push(&self, value: V) {
        if !self.is_live() {
            return;
        }
        let before = {
            let mut reconciler = self.shared.reconciler.borrow_mut();
            let before = reconciler.peek().clone();
            reconciler.set_server(value);
            before
        };
        self.reconcile_and_notify(before);
    }

    /// Show `predict(displayed)` until the server catches up. Returns the prediction, or `None` if torn down.
    pub fn predict(&self, predict: impl FnOnce(&V) -> V) -> Option<V> {
        if !self.is_live() {
            return None;
        }
        let now = self.shared.clock.now();
        // retire anything stale first so the prediction is built on what the user actually sees
        self.reconcile();
        let predicted = self.shared.reconciler.borrow_mut().apply(predict, now);
        self.shared.listeners.notify(&predicted);
        Some(predicted)
    }

    /// Throw the prediction away and go back to the last server value. Returns whether anything was cleared.
    pub fn roll_back(&self) -> bool {
        if !self.is_live() {
            return false;
        }
        let cleared = self.shared.reconciler.borrow_mut().clear();
        if cleared {
            let value = self.shared.reconciler.borrow().peek().clone();
            self.shared.listeners.notify(&value);
        }
        cleared
    }

    /// Timer entry point: re-run reconciliation and re-render if the answer changed.
    pub fn refresh(&self) {
        if !self.is_live() {
            return;
        }
        let before = self.shared.reconciler.borrow().peek().clone();
        self.reconcile_and_notify(before);
    }

    pub fn subscribe(&self, listener: impl Fn(&V) + 'static) -> ListenerKey {
        self.shared.listeners.insert(listener)
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        self.shared.listeners.remove(key)
    }

    /// Feed this binding from `transport`. Replaces (and so cancels) any previous subscription.
    pub fn subscribe_to<T>(&self, transport: &T, key: &SubscriptionKey)
    where
        T: SubscriptionTransport<V> + ?Sized,
    {
        if !self.is_live() {
            return;
        }
        let weak = Rc::downgrade(&self.shared);
        let on_push: Rc<dyn Fn(V)> = Rc::new(move |value| {
            if let Some(shared) = weak.upgrade() {
                Binding { shared }.push(value);
            }
        });
        let subscription = transport.subscribe(key, on_push);
        let previous = self.shared.subscription.replace(Some(subscription));
        drop(previous);
    }

    /// Tear down: no more state changes, pushes, or renders.
    pub fn teardown(&self) {
        if self.shared.guard.teardown() {
            log::debug!("Binding torn down");
        }
        let subscription = self.shared.subscription.take();
        drop(subscription);
        self.shared.listeners.clear();
    }

    /// Tear the binding's guard down when the returned scope is dropped.
    pub fn scope(&self) -> MountScope {
        self.shared.guard.scope()
    }
}

impl<V: fmt::Debug + Clone, C> fmt::Debug for Binding<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reconciler = self.shared.reconciler.borrow();
        f.debug_struct("Binding")
            .field("displayed", reconciler.peek())
            .field("server", reconciler.server())
            .field("overlay", &reconciler.overlay())
            .field("live", &self.shared.guard.is_live())
            .finish()
    }
}
