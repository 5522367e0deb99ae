//! # ServerView
//! The latest value the subscription transport pushed for an (entity, metric) pair.
//! Before the first push there is nothing to show, which is a normal state and not an error.

use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ServerView<V> {
    Unresolved,
    Resolved(V),
}

impl<V> ServerView<V> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ServerView::Resolved(_))
    }

    pub fn as_option(&self) -> Option<&V> {
        match self {
            ServerView::Unresolved => None,
            ServerView::Resolved(value) => Some(value),
        }
    }
}

impl<V> Default for ServerView<V> {
    fn default() -> Self {
        ServerView::Unresolved
    }
}

impl<V> From<Option<V>> for ServerView<V> {
    fn from(value: Option<V>) -> Self {
        value.map_or(ServerView::Unresolved, ServerView::Resolved)
    }
}

/// Must stay stable for the life of a subscription. Subscribe again if it changes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct SubscriptionKey {
    pub entity_id: String,
    pub metric: String,
}

impl SubscriptionKey {
    pub fn new(entity_id: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            metric: metric.into(),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_id, self.metric)
    }
}

/// A push-based reactive query service. Failures in the transport are its own business:
/// from our side they just look like a value that never resolves.
pub trait SubscriptionTransport<V> {
    fn subscribe(&self, key: &SubscriptionKey, on_push: Rc<dyn Fn(V)>) -> Subscription;
}

/// Unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
