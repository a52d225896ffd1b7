use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds since boot, as seen by the control loop.
pub type Ticks = u64;

/// When an object next needs servicing.
///
/// Ordering: every `At` deadline sorts before `Never`, and deadlines compare
/// by time. Taking the minimum over a set of `UpdateTime`s therefore always
/// yields the earliest concrete deadline, or `Never` if there is none.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpdateTime {
    /// Service at (or after) this tick.
    At(Ticks),
    /// Do not service again unless something external forces it.
    Never,
}

impl UpdateTime {
    /// A deadline `delay` milliseconds after `now`.
    pub fn after(now: Ticks, delay: Ticks) -> Self {
        Self::At(now.saturating_add(delay))
    }

    /// Returns `true` if the deadline has been reached at `now`.
    pub fn is_due(self, now: Ticks) -> bool {
        matches!(self, Self::At(t) if t <= now)
    }

    pub fn deadline(self) -> Option<Ticks> {
        match self {
            Self::At(t) => Some(t),
            Self::Never => None,
        }
    }

    /// Milliseconds from `now` until the deadline (zero when overdue).
    pub fn remaining(self, now: Ticks) -> Option<Ticks> {
        self.deadline().map(|t| t.saturating_sub(now))
    }
}

impl fmt::Debug for UpdateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(t) => write!(f, "At({t}ms)"),
            Self::Never => write!(f, "Never"),
        }
    }
}

impl fmt::Display for UpdateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(t) => write!(f, "{t}"),
            Self::Never => write!(f, "never"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn never_sorts_last() {
        assert!(UpdateTime::At(u64::MAX) < UpdateTime::Never);
        assert!(UpdateTime::At(1) < UpdateTime::At(2));
        assert_eq!(UpdateTime::Never.min(UpdateTime::At(5)), UpdateTime::At(5));
    }

    #[test]
    fn due_only_when_reached() {
        assert!(UpdateTime::At(100).is_due(100));
        assert!(UpdateTime::At(100).is_due(150));
        assert!(!UpdateTime::At(100).is_due(99));
        assert!(!UpdateTime::Never.is_due(u64::MAX));
    }

    #[test]
    fn after_saturates() {
        assert_eq!(UpdateTime::after(10, 5), UpdateTime::At(15));
        assert_eq!(UpdateTime::after(u64::MAX, 5), UpdateTime::At(u64::MAX));
    }

    #[test]
    fn remaining_clamps_at_zero() {
        assert_eq!(UpdateTime::At(100).remaining(40), Some(60));
        assert_eq!(UpdateTime::At(100).remaining(400), Some(0));
        assert_eq!(UpdateTime::Never.remaining(0), None);
    }

    proptest! {
        #[test]
        fn min_is_earliest_deadline(times in proptest::collection::vec(proptest::option::of(any::<u64>()), 0..16)) {
            let updates: Vec<UpdateTime> = times
                .iter()
                .map(|t| t.map(UpdateTime::At).unwrap_or(UpdateTime::Never))
                .collect();
            let min = updates.iter().copied().fold(UpdateTime::Never, UpdateTime::min);
            match times.iter().flatten().min() {
                Some(t) => prop_assert_eq!(min, UpdateTime::At(*t)),
                None => prop_assert_eq!(min, UpdateTime::Never),
            }
        }
    }
}
