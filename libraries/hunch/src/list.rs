//! # ListBinding
//! The list-shaped version of the same idea: a window of server-confirmed items, plus items the user just
//! created that are shown immediately under a temporary id.
//!
//! A placeholder's id never matches the real one, so placeholders are matched to canonical items by
//! content (see [`ListItem::matches_placeholder`]). Lifecycle of a placeholder:
//! `Pending -> Confirmed` (write succeeded, waiting for the push that carries the real item) or
//! `Pending -> Failed` (removed). Nothing moves after that.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::binding::{ListenerKey, Listeners};
use crate::gateway::Staging;
use crate::lifecycle::{LifecycleGuard, MountScope};
use crate::server_view::{Subscription, SubscriptionKey, SubscriptionTransport};

pub trait ListItem: Clone + fmt::Debug {
    /// Whether `self`, fresh from the server, is the canonical copy of a locally created `placeholder`.
    fn matches_placeholder(&self, placeholder: &Self, tolerance: Duration) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TempId(String);

impl TempId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PlaceholderState {
    Pending,
    Confirmed,
    Failed,
}

/// What the server pushes: the current window of items, and whether there is more beyond it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ListWindow<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Row<T> {
    Placeholder { temp_id: TempId, item: T },
    Confirmed(T),
}

impl<T> Row<T> {
    pub fn item(&self) -> &T {
        match self {
            Row::Placeholder { item, .. } | Row::Confirmed(item) => item,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Row::Placeholder { .. })
    }
}

#[derive(Clone, Debug)]
struct Placeholder<T> {
    temp_id: TempId,
    item: T,
    state: PlaceholderState,
}

struct ListState<T> {
    confirmed: im::Vector<T>,
    has_more: bool,
    /// Newest first.
    placeholders: Vec<Placeholder<T>>,
    /// Placeholders that left the screen since the last window, and how they ended.
    retired: HashMap<TempId, PlaceholderState>,
}

impl<T: ListItem> ListState<T> {
    fn rows(&self) -> im::Vector<Row<T>> {
        let mut rows: im::Vector<Row<T>> = self
            .placeholders
            .iter()
            .map(|p| Row::Placeholder {
                temp_id: p.temp_id.clone(),
                item: p.item.clone(),
            })
            .collect();
        rows.extend(self.confirmed.iter().cloned().map(Row::Confirmed));
        rows
    }

    /// Drop placeholders whose canonical item has arrived. Each server item stands in for at most one placeholder.
    fn absorb_confirmed(&mut self, tolerance: Duration) -> usize {
        let mut consumed = vec![false; self.confirmed.len()];
        let mut absorbed = 0;
        let confirmed = &self.confirmed;
        let retired = &mut self.retired;
        self.placeholders.retain(|placeholder| {
            let found = confirmed.iter().enumerate().find(|(i, item)| {
                !consumed[*i] && item.matches_placeholder(&placeholder.item, tolerance)
            });
            match found {
                Some((i, _)) => {
                    consumed[i] = true;
                    absorbed += 1;
                    retired.insert(placeholder.temp_id.clone(), PlaceholderState::Confirmed);
                    false
                }
                None => true,
            }
        });
        absorbed
    }
}

struct ListShared<T> {
    state: RefCell<ListState<T>>,
    tolerance: Duration,
    next_temp_id: Cell<u64>,
    guard: LifecycleGuard,
    listeners: Listeners<im::Vector<Row<T>>>,
    subscription: RefCell<Option<Subscription>>,
}

pub struct ListBinding<T> {
    shared: Rc<ListShared<T>>,
}

impl<T> Clone for ListBinding<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: ListItem + 'static> ListBinding<T> {
    /// `seed` is the server-rendered first window. `tolerance` is how far apart the placeholder's and the
    /// canonical item's timestamps may be and still match.
    pub fn new(seed: ListWindow<T>, tolerance: Duration) -> Self {
        Self {
            shared: Rc::new(ListShared {
                state: RefCell::new(ListState {
                    confirmed: seed.items.into_iter().collect(),
                    has_more: seed.has_more,
                    placeholders: Vec::new(),
                    retired: HashMap::new(),
                }),
                tolerance,
                next_temp_id: Cell::new(1),
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

    pub fn displayed(&self) -> im::Vector<Row<T>> {
        self.shared.state.borrow().rows()
    }

    pub fn has_more(&self) -> bool {
        self.shared.state.borrow().has_more
    }

    pub fn num_pending(&self) -> usize {
        self.shared
            .state
            .borrow()
            .placeholders
            .iter()
            .filter(|p| p.state == PlaceholderState::Pending)
            .count()
    }

    pub fn placeholder_state(&self, temp_id: &TempId) -> Option<PlaceholderState> {
        let state = self.shared.state.borrow();
        state
            .placeholders
            .iter()
            .find(|p| &p.temp_id == temp_id)
            .map(|p| p.state)
            .or_else(|| state.retired.get(temp_id).copied())
    }

    fn render(&self) {
        let rows = self.displayed();
        self.shared.listeners.notify(&rows);
    }

    /// A new window from the subscription transport.
    ///
    /// Outcomes of placeholders retired before this window are forgotten.
    pub fn push_window(&self, window: ListWindow<T>) {
        if !self.is_live() {
            return;
        }
        let absorbed = {
            let mut state = self.shared.state.borrow_mut();
            state.retired.clear();
            state.confirmed = window.items.into_iter().collect();
            state.has_more = window.has_more;
            state.absorb_confirmed(self.shared.tolerance)
        };
        if absorbed > 0 {
            log::debug!("{absorbed} placeholder(s) replaced by their canonical items");
        }
        self.render();
    }

    /// Show `item` at the top right away. Returns its temporary id, or `None` if torn down.
    pub fn insert_placeholder(&self, item: T) -> Option<TempId> {
        if !self.is_live() {
            return None;
        }
        let n = self.shared.next_temp_id.get();
        self.shared.next_temp_id.set(n + 1);
        let temp_id = TempId(format!("temp-{n}"));
        self.shared.state.borrow_mut().placeholders.insert(
            0,
            Placeholder {
                temp_id: temp_id.clone(),
                item,
                state: PlaceholderState::Pending,
            },
        );
        self.render();
        Some(temp_id)
    }

    /// The write behind `temp_id` succeeded. It stays on screen until the push that carries it.
    pub fn confirm_placeholder(&self, temp_id: &TempId) {
        if !self.is_live() {
            return;
        }
        let mut state = self.shared.state.borrow_mut();
        if let Some(placeholder) = state
            .placeholders
            .iter_mut()
            .find(|p| &p.temp_id == temp_id && p.state == PlaceholderState::Pending)
        {
            placeholder.state = PlaceholderState::Confirmed;
        }
    }

    /// The write behind `temp_id` failed: take it off the screen. Returns whether it was still pending.
    pub fn fail_placeholder(&self, temp_id: &TempId) -> bool {
        if !self.is_live() {
            return false;
        }
        let removed = {
            let mut state = self.shared.state.borrow_mut();
            let position = state
                .placeholders
                .iter()
                .position(|p| &p.temp_id == temp_id && p.state == PlaceholderState::Pending);
            match position {
                Some(position) => {
                    let placeholder = state.placeholders.remove(position);
                    state
                        .retired
                        .insert(placeholder.temp_id, PlaceholderState::Failed);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.render();
        }
        removed
    }

    pub fn subscribe(&self, listener: impl Fn(&im::Vector<Row<T>>) + 'static) -> ListenerKey {
        self.shared.listeners.insert(listener)
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        self.shared.listeners.remove(key)
    }

    pub fn subscribe_to<Tr>(&self, transport: &Tr, key: &SubscriptionKey)
    where
        Tr: SubscriptionTransport<ListWindow<T>> + ?Sized,
    {
        if !self.is_live() {
            return;
        }
        let weak: Weak<ListShared<T>> = Rc::downgrade(&self.shared);
        let on_push: Rc<dyn Fn(ListWindow<T>)> = Rc::new(move |window| {
            if let Some(shared) = weak.upgrade() {
                ListBinding { shared }.push_window(window);
            }
        });
        let subscription = transport.subscribe(key, on_push);
        let previous = self.shared.subscription.replace(Some(subscription));
        drop(previous);
    }

    pub fn teardown(&self) {
        self.shared.guard.teardown();
        let subscription = self.shared.subscription.take();
        drop(subscription);
        self.shared.listeners.clear();
    }

    pub fn scope(&self) -> MountScope {
        self.shared.guard.scope()
    }
}

impl Staging {
    /// Show `item` in `list` until the write resolves; remove it if the write fails.
    pub fn placeholder<T: ListItem + 'static>(
        &mut self,
        list: &ListBinding<T>,
        item: T,
    ) -> Option<TempId> {
        let temp_id = list.insert_placeholder(item)?;
        self.watch(list.guard());

        let (failed_list, failed_id) = (list.clone(), temp_id.clone());
        self.on_rollback(move || {
            failed_list.fail_placeholder(&failed_id);
        });

        let (confirmed_list, confirmed_id) = (list.clone(), temp_id.clone());
        self.on_confirm(move || confirmed_list.confirm_placeholder(&confirmed_id));

        Some(temp_id)
    }
}
