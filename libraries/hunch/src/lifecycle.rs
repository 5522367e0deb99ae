//! # LifecycleGuard
//! Write-completion handlers and timers outlive the component that started them.
//! Anything that runs later checks [`LifecycleGuard::is_live`] before touching binding state.
//! Once torn down, a guard stays down forever.

use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct LifecycleGuard {
    live: Rc<Cell<bool>>,
}

impl LifecycleGuard {
    pub fn new() -> Self {
        Self {
            live: Rc::new(Cell::new(true)),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// Returns true the first time it is called, false afterwards.
    pub fn teardown(&self) -> bool {
        self.live.replace(false)
    }

    /// Tear the guard down when the returned scope is dropped.
    pub fn scope(&self) -> MountScope {
        MountScope {
            guard: self.clone(),
        }
    }
}

impl Default for LifecycleGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Tears its guard down when dropped. This is useful if you want the binding to die with whatever owns it,
/// regardless of the code path that drops it.
#[derive(Debug)]
pub struct MountScope {
    guard: LifecycleGuard,
}

impl MountScope {
    pub fn guard(&self) -> &LifecycleGuard {
        &self.guard
    }
}

impl Drop for MountScope {
    fn drop(&mut self) {
        if self.guard.teardown() {
            log::debug!("Binding unmounted");
        }
    }
}
