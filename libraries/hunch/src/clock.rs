//! Monotonic time for staleness checks.
//!
//! Staleness is a local heuristic for UI responsiveness only, so all we need is a clock that never runs
//! backwards on this device. Wall-clock time is never compared against the server.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Milliseconds since some device-local origin.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Time from `earlier` to `self`, or zero if `earlier` is actually later.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

pub trait Clock {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// `std::time::Instant` does not work on `wasm32-unknown-unknown`; browser builds use `performance.now()` instead.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Copy, Debug)]
pub struct InstantClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for InstantClock {
    fn now(&self) -> Timestamp {
        let millis = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp(millis)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(millis: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at(100);
        let other = clock.clone();

        clock.advance(Duration::from_millis(250));

        assert_eq!(other.now(), Timestamp::from_millis(350));
    }

    #[test]
    fn test_saturating_since_never_goes_negative() {
        let earlier = Timestamp::from_millis(500);
        let later = Timestamp::from_millis(200);

        assert_eq!(later.saturating_since(earlier), Duration::ZERO);
        assert_eq!(earlier.saturating_since(later), Duration::from_millis(300));
    }
}
