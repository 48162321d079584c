//! Generation-based memoization.
//!
//! A [`Memo`] caches the output of a generator together with the tick at
//! which it was produced. It is invalidated by two signals:
//!
//! - the clock moving past the fill tick (with [`Expiry::EveryTick`]);
//! - a watched collection announcing an event its [`Watch`] predicate
//!   accepts.
//!
//! Watches are plain collection listeners holding a weak reference to the
//! memo's flags, so dropping or freezing a memo retires its listeners on the
//! next event.
//!
//! Generators receive a context (`&C`) rather than capturing it, since the
//! data they read usually owns the memo.

use crate::clock::{Clock, Tick};
use crate::collection::{ChangeEvent, Collection, ListenerStatus};
use crate::record::Record;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// When a filled memo stops being valid on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Valid only at the tick it was filled (and until a watched event).
    EveryTick,
    /// Valid until a watched event, regardless of the clock.
    OnWatchedChange,
}

/// Invalidation predicate for one watched collection.
pub enum Watch<R> {
    /// Any event invalidates.
    Always,
    /// Only events the predicate accepts invalidate.
    When(Box<dyn Fn(&ChangeEvent<'_, R>) -> bool>),
}

impl<R> Watch<R> {
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&ChangeEvent<'_, R>) -> bool + 'static,
    {
        Watch::When(Box::new(predicate))
    }

    fn matches(&self, event: &ChangeEvent<'_, R>) -> bool {
        match self {
            Watch::Always => true,
            Watch::When(predicate) => predicate(event),
        }
    }
}

type Generator<C, T> = Box<dyn Fn(&C) -> T>;
type Probe<C> = Box<dyn Fn(&C) -> bool>;

enum Slot<T> {
    Empty,
    Filled { at: Tick, value: T },
    Frozen(T),
}

/// State shared between a memo and its watch listeners.
#[derive(Default)]
struct Flags {
    stale: Cell<bool>,
    frozen: Cell<bool>,
}

struct Target<C, T> {
    is_active: Probe<C>,
    after_inactive: Generator<C, T>,
}

pub struct Memo<C, T> {
    clock: Clock,
    expiry: Expiry,
    generator: Generator<C, T>,
    target: Option<Target<C, T>>,
    flags: Rc<Flags>,
    slot: RefCell<Slot<T>>,
    recomputed: Cell<u64>,
}

impl<C, T> fmt::Debug for Memo<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match &*self.slot.borrow() {
            Slot::Empty => "empty".to_string(),
            Slot::Filled { at, .. } => format!("filled@{at}"),
            Slot::Frozen(_) => "frozen".to_string(),
        };
        f.debug_struct("Memo")
            .field("expiry", &self.expiry)
            .field("slot", &slot)
            .field("stale", &self.flags.stale.get())
            .field("recomputed", &self.recomputed.get())
            .finish()
    }
}

impl<C, T: Clone> Memo<C, T> {
    pub fn builder<F>(clock: &Clock, generator: F) -> MemoBuilder<C, T>
    where
        F: Fn(&C) -> T + 'static,
    {
        MemoBuilder::new(clock, generator)
    }

    /// Current value, recomputed only if the memo is invalid.
    pub fn get(&self, ctx: &C) -> T {
        if let Some(target) = &self.target {
            if !(target.is_active)(ctx) {
                return self.frozen(ctx, target);
            }
        }

        let now = self.clock.now();
        if let Some(value) = self.fresh_value(now) {
            return value;
        }

        self.flags.stale.set(false);
        let value = (self.generator)(ctx);
        self.recomputed.set(self.recomputed.get() + 1);
        trace!(at = %now, recomputed = self.recomputed.get(), "memo refilled");
        *self.slot.borrow_mut() = Slot::Filled {
            at: now,
            value: value.clone(),
        };
        value
    }

    /// Whether the next [`Memo::get`] would be served from the cache.
    pub fn is_fresh(&self) -> bool {
        self.fresh_value(self.clock.now()).is_some()
    }

    /// Drop the cached value; the next read recomputes.
    pub fn invalidate(&self) {
        self.flags.stale.set(true);
    }

    /// Whether an inactive target froze the memo.
    pub fn is_frozen(&self) -> bool {
        self.flags.frozen.get()
    }

    /// How many times the generator has run.
    pub fn recompute_count(&self) -> u64 {
        self.recomputed.get()
    }

    fn fresh_value(&self, now: Tick) -> Option<T> {
        if self.flags.stale.get() {
            return None;
        }
        match &*self.slot.borrow() {
            Slot::Filled { at, value } if self.expiry == Expiry::OnWatchedChange || *at == now => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    fn frozen(&self, ctx: &C, target: &Target<C, T>) -> T {
        if let Slot::Frozen(value) = &*self.slot.borrow() {
            return value.clone();
        }
        let value = (target.after_inactive)(ctx);
        *self.slot.borrow_mut() = Slot::Frozen(value.clone());
        self.flags.frozen.set(true);
        value
    }
}

pub struct MemoBuilder<C, T> {
    clock: Clock,
    expiry: Option<Expiry>,
    generator: Generator<C, T>,
    target: Option<Target<C, T>>,
    flags: Rc<Flags>,
    watched: usize,
}

impl<C, T: Clone> MemoBuilder<C, T> {
    pub fn new<F>(clock: &Clock, generator: F) -> Self
    where
        F: Fn(&C) -> T + 'static,
    {
        Self {
            clock: clock.clone(),
            expiry: None,
            generator: Box::new(generator),
            target: None,
            flags: Rc::new(Flags::default()),
            watched: 0,
        }
    }

    /// Freeze the memo once the target reported by `is_active` goes
    /// inactive; the frozen value is computed once by `after_inactive`.
    pub fn target<P, A>(mut self, is_active: P, after_inactive: A) -> Self
    where
        P: Fn(&C) -> bool + 'static,
        A: Fn(&C) -> T + 'static,
    {
        self.target = Some(Target {
            is_active: Box::new(is_active),
            after_inactive: Box::new(after_inactive),
        });
        self
    }

    /// Invalidate on events from `collection` accepted by `watch`.
    ///
    /// The listener retires itself once the memo is dropped or frozen.
    pub fn watch<R: Record + 'static>(mut self, collection: &Collection<R>, watch: Watch<R>) -> Self {
        let flags = Rc::downgrade(&self.flags);
        collection.subscribe(move |event| {
            let Some(flags) = flags.upgrade() else {
                return ListenerStatus::Drop;
            };
            if flags.frozen.get() {
                return ListenerStatus::Drop;
            }
            if watch.matches(event) {
                flags.stale.set(true);
            }
            ListenerStatus::Keep
        });
        self.watched += 1;
        self
    }

    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Without an explicit expiry, a memo with watches expires on watched
    /// change and one without expires every tick.
    pub fn build(self) -> Memo<C, T> {
        let expiry = self.expiry.unwrap_or(if self.watched == 0 {
            Expiry::EveryTick
        } else {
            Expiry::OnWatchedChange
        });
        Memo {
            clock: self.clock,
            expiry,
            generator: self.generator,
            target: self.target,
            flags: self.flags,
            slot: RefCell::new(Slot::Empty),
            recomputed: Cell::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tick_expires_when_clock_advances() {
        let clock = Clock::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let memo: Memo<(), u32> = Memo::builder(&clock, move |_| {
            counter.set(counter.get() + 1);
            counter.get()
        })
        .build();

        assert_eq!(memo.get(&()), 1);
        assert_eq!(memo.get(&()), 1);
        clock.next();
        assert_eq!(memo.get(&()), 2);
        assert_eq!(memo.recompute_count(), 2);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let clock = Clock::new();
        let memo: Memo<(), Tick> = Memo::builder(&clock, |_| Tick(5))
            .expiry(Expiry::OnWatchedChange)
            .build();
        memo.get(&());
        assert!(memo.is_fresh());
        memo.invalidate();
        assert!(!memo.is_fresh());
        memo.get(&());
        assert_eq!(memo.recompute_count(), 2);
    }

    #[test]
    fn inactive_target_freezes_once() {
        let clock = Clock::new();
        let memo: Memo<Cell<bool>, &'static str> = Memo::builder(&clock, |_| "live")
            .target(|active: &Cell<bool>| active.get(), |_| "frozen")
            .build();

        let active = Cell::new(true);
        assert_eq!(memo.get(&active), "live");
        active.set(false);
        assert_eq!(memo.get(&active), "frozen");
        clock.next();
        assert_eq!(memo.get(&active), "frozen");
        assert_eq!(memo.recompute_count(), 1);
    }
}
