//! Logical clock.
//!
//! Every record's identity is the tick at which it was created. Ticks are
//! strictly increasing for the lifetime of a clock, so "created later" and
//! "has a greater tick" are the same statement.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// An opaque, totally ordered point on the logical clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tick(pub u64);

impl Tick {
    /// The clock's initial reading. No record is ever stamped with it.
    pub const ZERO: Tick = Tick(0);

    pub fn get(self) -> u64 {
        self.0
    }

    /// The tick immediately after this one.
    pub fn succ(self) -> Tick {
        Tick(self.0 + 1)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl From<u64> for Tick {
    fn from(value: u64) -> Self {
        Tick(value)
    }
}

/// Shared handle to a monotonic tick counter.
///
/// Cloning the handle shares the counter: a `Forest` owns one clock and hands
/// clones to each of its collections so that ticks are unique across all of
/// them.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    current: Rc<Cell<u64>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock and return the new tick.
    pub fn next(&self) -> Tick {
        let next = self.current.get() + 1;
        self.current.set(next);
        Tick(next)
    }

    /// Current tick, without advancing.
    pub fn now(&self) -> Tick {
        Tick(self.current.get())
    }

    /// Reset to [`Tick::ZERO`].
    ///
    /// Only meant for test harnesses; a clock in use by a collection must
    /// never move backwards.
    pub fn clear(&self) {
        self.current.set(0);
    }

    /// Descending comparator: most recent first.
    pub fn by_tick(a: &Tick, b: &Tick) -> Ordering {
        b.cmp(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_strictly_increasing() {
        let clock = Clock::new();
        let a = clock.next();
        let b = clock.next();
        assert!(b > a);
        assert_eq!(clock.now(), b);
    }

    #[test]
    fn now_does_not_advance() {
        let clock = Clock::new();
        clock.next();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), Tick(1));
    }

    #[test]
    fn clones_share_the_counter() {
        let clock = Clock::new();
        let other = clock.clone();
        clock.next();
        assert_eq!(other.next(), Tick(2));
    }

    #[test]
    fn clear_resets_to_zero() {
        let clock = Clock::new();
        clock.next();
        clock.next();
        clock.clear();
        assert_eq!(clock.now(), Tick::ZERO);
        assert_eq!(clock.next(), Tick(1));
    }

    #[test]
    fn by_tick_sorts_most_recent_first() {
        let mut ticks = vec![Tick(2), Tick(9), Tick(4)];
        ticks.sort_by(Clock::by_tick);
        assert_eq!(ticks, vec![Tick(9), Tick(4), Tick(2)]);
    }
}
