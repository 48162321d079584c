//! Integration tests: collections, indexes and memos through the public API.

use grove_kernel::{
    ChangeKind, Clock, Collection, CollectionError, IndexKey, IndexMode, Lifecycle,
    LifecycleState, Memo, Record, Tick, Transition, Watch,
};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
struct Tag {
    tick: Tick,
    lifecycle: Lifecycle,
    label: String,
    weight: i64,
}

impl Record for Tag {
    type Init = (String, i64);
    type Error = CollectionError;

    fn build(clock: &Clock, (label, weight): (String, i64)) -> Result<Self, Self::Error> {
        Ok(Self {
            tick: clock.next(),
            lifecycle: Lifecycle::new(),
            label,
            weight,
        })
    }

    fn tick(&self) -> Tick {
        self.tick
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }
}

fn tags() -> Collection<Tag> {
    Collection::new("tags", Clock::new())
}

fn tag(label: &str, weight: i64) -> (String, i64) {
    (label.to_string(), weight)
}

#[test]
fn unique_index_keeps_the_latest_write() {
    let mut c = tags();
    c.index("label", |t: &Tag| t.label.as_str().into(), IndexMode::Unique);
    let first = c.add(tag("a", 1)).expect("first");
    let second = c.add(tag("a", 2)).expect("second");

    assert_eq!(c.index_ticks("label", &"a".into()), vec![second]);

    c.delete(second);
    assert!(c.index_ticks("label", &"a".into()).is_empty());
    assert!(c.has(first));
}

#[test]
fn late_indexes_are_back_filled() {
    let mut c = tags();
    let a = c.add(tag("a", 1)).expect("a");
    let b = c.add(tag("b", 1)).expect("b");
    c.add(tag("c", 2)).expect("c");

    c.index("weight", |t: &Tag| t.weight.into(), IndexMode::Multi);
    assert_eq!(c.index_ticks("weight", &IndexKey::Int(1)), vec![a, b]);
    assert_eq!(
        c.find_index("weight").map(|index| index.key_count()),
        Some(2)
    );
}

#[test]
fn listeners_see_indexes_already_updated() {
    let mut c = tags();
    c.index("label", |t: &Tag| t.label.as_str().into(), IndexMode::Multi);
    let seen: Rc<RefCell<Vec<usize>>> = Rc::default();

    // The listener cannot borrow the collection, so it records what the
    // event carries and the test checks the index afterwards.
    let log = Rc::clone(&seen);
    c.subscribe(move |event| {
        if event.kind == ChangeKind::Added {
            log.borrow_mut().push(event.record.label.len());
        }
        grove_kernel::ListenerStatus::Keep
    });

    c.add(tag("abc", 0)).expect("add");
    assert_eq!(*seen.borrow(), vec![3]);
    assert_eq!(c.index_records("label", &"abc".into()).len(), 1);
}

#[test]
fn terminal_states_are_final() {
    let mut c = tags();
    let t = c.add(tag("a", 1)).expect("add");
    c.do_state(t, Transition::Fail("bad".to_string()));
    c.do_state(t, Transition::Accept);
    let record = c.get(t).expect("record");
    assert_eq!(record.lifecycle().state(), LifecycleState::Error);
    assert_eq!(record.lifecycle().error(), Some("bad"));
    assert_eq!(c.active().count(), 0);
}

#[test]
fn memo_watching_a_collection() {
    let clock = Clock::new();
    let mut c: Collection<Tag> = Collection::new("tags", clock.clone());
    let memo: Memo<Collection<Tag>, i64> =
        Memo::builder(&clock, |c: &Collection<Tag>| c.active().map(|t| t.weight).sum())
            .watch(&c, Watch::Always)
            .build();

    assert_eq!(memo.get(&c), 0);
    c.add(tag("a", 3)).expect("a");
    c.add(tag("b", 4)).expect("b");
    assert_eq!(memo.get(&c), 7);
    assert_eq!(memo.recompute_count(), 2);

    clock.next();
    assert_eq!(memo.get(&c), 7);
    assert_eq!(memo.recompute_count(), 2);
}

#[test]
fn frozen_memo_retires_its_watch() {
    let clock = Clock::new();
    let mut c: Collection<Tag> = Collection::new("tags", clock.clone());
    let memo: Memo<Collection<Tag>, i64> =
        Memo::builder(&clock, |c: &Collection<Tag>| c.active().map(|t| t.weight).sum())
            .target(|c: &Collection<Tag>| c.active().count() < 2, |_| -1)
            .watch(&c, Watch::Always)
            .build();
    assert_eq!(c.listener_count(), 1);

    c.add(tag("a", 3)).expect("a");
    assert_eq!(memo.get(&c), 3);
    assert!(!memo.is_frozen());

    c.add(tag("b", 4)).expect("b");
    assert_eq!(memo.get(&c), -1);
    assert!(memo.is_frozen());
    assert_eq!(c.listener_count(), 1);

    // The next event finds the memo frozen and drops the listener.
    c.add(tag("c", 5)).expect("c");
    assert_eq!(c.listener_count(), 0);
    assert_eq!(memo.get(&c), -1);
}

proptest! {
    /// A multi index partitions the records by key.
    #[test]
    fn multi_index_partitions_records(weights in prop::collection::vec(0i64..4, 0..40)) {
        let mut c = tags();
        c.index("weight", |t: &Tag| t.weight.into(), IndexMode::Multi);
        for w in &weights {
            c.add(tag("x", *w)).expect("add");
        }
        let mut total = 0;
        for w in 0i64..4 {
            let ticks = c.index_ticks("weight", &IndexKey::Int(w));
            prop_assert!(ticks.windows(2).all(|pair| pair[0] < pair[1]));
            for t in &ticks {
                prop_assert_eq!(c.get(*t).map(|r| r.weight), Some(w));
            }
            total += ticks.len();
        }
        prop_assert_eq!(total, weights.len());
    }

    /// Ticks handed out by one clock are strictly increasing across
    /// collections sharing it.
    #[test]
    fn shared_clock_orders_collections(sides in prop::collection::vec(any::<bool>(), 1..30)) {
        let clock = Clock::new();
        let mut left: Collection<Tag> = Collection::new("left", clock.clone());
        let mut right: Collection<Tag> = Collection::new("right", clock.clone());
        let mut last = Tick::ZERO;
        for side in sides {
            let target = if side { &mut left } else { &mut right };
            let tick = target.add(tag("x", 0)).expect("add");
            prop_assert!(tick > last);
            last = tick;
        }
        prop_assert_eq!(clock.now(), last);
    }
}
