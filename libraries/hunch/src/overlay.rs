//! # OptimisticOverlay
//! A locally predicted value, laid over the server value until the server catches up.

use crate::clock::Timestamp;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OptimisticOverlay<V> {
    pub predicted: V,
    /// The displayed value the prediction was computed from.
    pub basis: V,
    pub applied_at: Timestamp,
}

/// Decides whether a server value confirms a pending prediction.
pub trait Confirmation<V> {
    fn confirms(&self, server: &V, overlay: &OptimisticOverlay<V>) -> bool;
}

/// Server value must equal the prediction. For booleans and composite values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Exact;

impl<V: PartialEq> Confirmation<V> for Exact {
    fn confirms(&self, server: &V, overlay: &OptimisticOverlay<V>) -> bool {
        *server == overlay.predicted
    }
}

/// For counters that other users can move at the same time.
///
/// A bump is confirmed by any server count at least as large as the prediction, so we never "undo" a
/// legitimately larger count. A decrement is confirmed by any count at most as large.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tally;

impl<V: PartialOrd> Confirmation<V> for Tally {
    fn confirms(&self, server: &V, overlay: &OptimisticOverlay<V>) -> bool {
        if overlay.predicted >= overlay.basis {
            *server >= overlay.predicted
        } else {
            *server <= overlay.predicted
        }
    }
}

/// Caller-supplied predicate `(server, predicted) -> confirmed`.
#[derive(Clone, Copy)]
pub struct Matches<F>(pub F);

impl<V, F> Confirmation<V> for Matches<F>
where
    F: Fn(&V, &V) -> bool,
{
    fn confirms(&self, server: &V, overlay: &OptimisticOverlay<V>) -> bool {
        (self.0)(server, &overlay.predicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(basis: u64, predicted: u64) -> OptimisticOverlay<u64> {
        OptimisticOverlay {
            predicted,
            basis,
            applied_at: Timestamp::default(),
        }
    }

    #[test]
    fn test_tally_bump_accepts_larger_counts() {
        let bump = overlay(5, 6);
        assert!(!Tally.confirms(&5, &bump));
        assert!(Tally.confirms(&6, &bump));
        assert!(Tally.confirms(&9, &bump));
    }

    #[test]
    fn test_tally_decrement_ignores_stale_higher_count() {
        let unlike = overlay(6, 5);
        assert!(!Tally.confirms(&6, &unlike));
        assert!(Tally.confirms(&5, &unlike));
        assert!(Tally.confirms(&3, &unlike));
    }

    #[test]
    fn test_exact_and_matches() {
        let toggled = OptimisticOverlay {
            predicted: true,
            basis: false,
            applied_at: Timestamp::default(),
        };
        assert!(Exact.confirms(&true, &toggled));
        assert!(!Exact.confirms(&false, &toggled));

        let always = Matches(|_: &bool, _: &bool| true);
        assert!(always.confirms(&false, &toggled));
    }
}
