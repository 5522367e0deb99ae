//! This is a library for showing the result of a user action before the server has confirmed it.
//! It was created for an RSS reading front end, so it doesn't include much that was not needed there.
//!
//! Strategy:
//! 1. Every displayed quantity (a like count, a "retweeted" flag, a comment list) is a [`Binding`].
//!    A binding holds the last value the server pushed to us, if any, plus a seed from the server-rendered markup.
//! 2. When the user acts, instead of waiting for the server, we compute a prediction from whatever is
//!    currently displayed and lay it over the server value ("overlay").
//! 3. The write is sent to the backing store. Eventually the subscription pushes the new server value.
//! 4. Each time the binding is read, the overlay is retired once the server agrees with it, or once it is
//!    too old to be trusted. If the write fails, the overlay is dropped right away and the user is told.
//!
//! Sounds simple, but there are a few tricky parts that this library handles:
//! the write result and the push can arrive in either order, other users can change counts concurrently,
//! users can click twice before anything resolves, and the component can go away while a write is in flight.

pub mod binding;
pub mod clock;
#[cfg(feature = "convex")]
pub mod convex;
pub mod gateway;
pub mod hub;
pub mod lifecycle;
pub mod list;
pub mod outcome;
pub mod overlay;
pub mod reconcile;
pub mod server_view;

pub use binding::{Binding, BindingConfig, ListenerKey, Listeners};
pub use clock::{Clock, ManualClock, Timestamp};
pub use gateway::{
    Authenticator, Copywriter, DefaultCopy, MutationEndpoint, MutationGateway, Notice, Notifier,
    Scheduler, Settled, Severity, Staging, Submission,
};
pub use hub::LocalHub;
pub use lifecycle::{LifecycleGuard, MountScope};
pub use list::{ListBinding, ListItem, ListWindow, PlaceholderState, Row, TempId};
pub use outcome::{Mutation, MutationError, MutationOutcome, RateLimitScope};
pub use overlay::{Confirmation, Exact, Matches, OptimisticOverlay, Tally};
pub use reconcile::{Reconciliation, Reconciler, Verdict};
pub use server_view::{ServerView, Subscription, SubscriptionKey, SubscriptionTransport};

#[cfg(not(target_arch = "wasm32"))]
pub use clock::InstantClock;
