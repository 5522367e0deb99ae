//! # Reconciler
//! Decides what to display at a given instant, and retires predictions that are no longer useful.
//!
//! This type is plain data: no sharing, no callbacks. [`crate::Binding`] wraps it for use from UI code.

use std::time::Duration;

use crate::clock::Timestamp;
use crate::overlay::{Confirmation, OptimisticOverlay};
use crate::server_view::ServerView;

/// What a reconcile pass did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// There was no overlay to begin with.
    Settled,
    /// The server agreed with the overlay, which was cleared.
    Confirmed,
    /// The overlay timed out and was cleared. Server truth is trusted from here on, match or not.
    StaleOverlayAbandoned,
    /// The overlay is still being shown.
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation<V> {
    pub value: V,
    pub verdict: Verdict,
}

#[derive(Clone, Debug)]
pub struct Reconciler<V> {
    server: ServerView<V>,
    overlay: Option<OptimisticOverlay<V>>,
    /// Shown while the server view is unresolved, to avoid flashing an empty state.
    seed: V,
    /// A timed-out overlay whose prediction became the seed. Its write may still fail.
    promoted: Option<OptimisticOverlay<V>>,
}

impl<V: Clone> Reconciler<V> {
    pub fn new(seed: V) -> Self {
        Self {
            server: ServerView::Unresolved,
            overlay: None,
            seed,
            promoted: None,
        }
    }

    pub fn server(&self) -> &ServerView<V> {
        &self.server
    }

    pub fn overlay(&self) -> Option<&OptimisticOverlay<V>> {
        self.overlay.as_ref()
    }

    pub fn seed(&self) -> &V {
        &self.seed
    }

    pub fn set_server(&mut self, value: V) {
        self.server = ServerView::Resolved(value);
        self.promoted = None;
    }

    /// What would be displayed right now, without retiring anything.
    pub fn peek(&self) -> &V {
        if let Some(overlay) = &self.overlay {
            return &overlay.predicted;
        }
        self.server.as_option().unwrap_or(&self.seed)
    }

    /// Replace any existing overlay with a prediction computed from the currently displayed value.
    /// The caller is expected to have reconciled first, so that the basis is fresh.
    pub fn apply(&mut self, predict: impl FnOnce(&V) -> V, now: Timestamp) -> V {
        let basis = self.peek().clone();
        let predicted = predict(&basis);
        self.promoted = None;
        self.overlay = Some(OptimisticOverlay {
            predicted: predicted.clone(),
            basis,
            applied_at: now,
        });
        predicted
    }

    /// Drop the overlay, falling back to whatever the server last said. Returns whether anything changed.
    ///
    /// A prediction that already timed out into the seed is undone too, as long as neither a server value
    /// nor a newer prediction has replaced it since.
    pub fn clear(&mut self) -> bool {
        if self.overlay.take().is_some() {
            return true;
        }
        match self.promoted.take() {
            Some(promoted) if self.server.as_option().is_none() => {
                self.seed = promoted.basis;
                true
            }
            _ => false,
        }
    }

    pub fn reconcile<C>(
        &mut self,
        now: Timestamp,
        stale_after: Duration,
        confirmation: &C,
    ) -> Reconciliation<V>
    where
        C: Confirmation<V> + ?Sized,
    {
        let Some(overlay) = self.overlay.take() else {
            return Reconciliation {
                value: self.peek().clone(),
                verdict: Verdict::Settled,
            };
        };

        if let ServerView::Resolved(server) = &self.server
            && confirmation.confirms(server, &overlay)
        {
            return Reconciliation {
                value: server.clone(),
                verdict: Verdict::Confirmed,
            };
        }

        if now.saturating_since(overlay.applied_at) > stale_after {
            let value = match &self.server {
                ServerView::Resolved(server) => server.clone(),
                ServerView::Unresolved => {
                    // Nothing better to show. Keep the stale prediction instead of regressing to the seed.
                    self.seed = overlay.predicted.clone();
                    let value = overlay.predicted.clone();
                    self.promoted = Some(overlay);
                    value
                }
            };
            return Reconciliation {
                value,
                verdict: Verdict::StaleOverlayAbandoned,
            };
        }

        let value = overlay.predicted.clone();
        self.overlay = Some(overlay);
        Reconciliation {
            value,
            verdict: Verdict::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{Exact, Tally};

    const STALE: Duration = Duration::from_secs(3);

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_seed_until_first_push() {
        let mut reconciler = Reconciler::new(5u64);
        assert_eq!(reconciler.reconcile(at(0), STALE, &Tally).value, 5);

        reconciler.set_server(7);
        let result = reconciler.reconcile(at(0), STALE, &Tally);
        assert_eq!(result.value, 7);
        assert_eq!(result.verdict, Verdict::Settled);
    }

    #[test]
    fn test_prediction_is_built_on_current_display() {
        let mut reconciler = Reconciler::new(5u64);
        reconciler.apply(|n| n + 1, at(0));
        let second = reconciler.apply(|n| n + 1, at(10));

        assert_eq!(second, 7);
        assert_eq!(reconciler.overlay().map(|o| o.basis), Some(6));
    }

    #[test]
    fn test_pending_until_confirmed() {
        let mut reconciler = Reconciler::new(false);
        reconciler.set_server(false);
        reconciler.apply(|liked| !liked, at(0));

        let pending = reconciler.reconcile(at(100), STALE, &Exact);
        assert_eq!(pending.value, true);
        assert_eq!(pending.verdict, Verdict::Pending);

        reconciler.set_server(true);
        let confirmed = reconciler.reconcile(at(200), STALE, &Exact);
        assert_eq!(confirmed.verdict, Verdict::Confirmed);
        assert!(reconciler.overlay().is_none());
    }

    #[test]
    fn test_stale_overlay_falls_back_to_server() {
        let mut reconciler = Reconciler::new(5u64);
        reconciler.set_server(5);
        reconciler.apply(|n| n + 1, at(0));

        // exactly at the threshold the prediction is still trusted
        assert_eq!(reconciler.reconcile(at(3_000), STALE, &Tally).verdict, Verdict::Pending);

        let abandoned = reconciler.reconcile(at(3_001), STALE, &Tally);
        assert_eq!(abandoned.verdict, Verdict::StaleOverlayAbandoned);
        assert_eq!(abandoned.value, 5);
    }

    #[test]
    fn test_stale_overlay_without_server_keeps_prediction() {
        let mut reconciler = Reconciler::new(5u64);
        reconciler.apply(|n| n + 1, at(0));

        let abandoned = reconciler.reconcile(at(10_000), STALE, &Tally);
        assert_eq!(abandoned.value, 6);

        let after = reconciler.reconcile(at(20_000), STALE, &Tally);
        assert_eq!(after.value, 6);
        assert_eq!(after.verdict, Verdict::Settled);
    }

    #[test]
    fn test_clear_undoes_prediction_promoted_to_seed() {
        let mut reconciler = Reconciler::new(5u64);
        reconciler.apply(|n| n + 1, at(0));
        assert_eq!(reconciler.reconcile(at(3_500), STALE, &Tally).value, 6);

        assert!(reconciler.clear());
        assert_eq!(*reconciler.peek(), 5);
        assert!(!reconciler.clear());
    }

    #[test]
    fn test_promoted_prediction_kept_once_server_speaks() {
        let mut reconciler = Reconciler::new(5u64);
        reconciler.apply(|n| n + 1, at(0));
        reconciler.reconcile(at(3_500), STALE, &Tally);
        reconciler.set_server(8);

        assert!(!reconciler.clear());
        assert_eq!(*reconciler.peek(), 8);
    }
}
