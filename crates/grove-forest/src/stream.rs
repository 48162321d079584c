//! Pull-based streams of a node's net value.

use crate::forest::Forest;
use crate::value::Value;
use grove_kernel::{Collection, ListenerStatus, Record, Tick};
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Emits a node's net value when it changes.
///
/// The stream is cold: the first poll yields the current value. Later polls
/// re-derive the value only after an event in a collection the value
/// depends on, and yield it only if it differs from the last one emitted.
/// While a transaction is pending every poll yields `None`; the change is
/// picked up by the first poll after the transaction finishes.
#[derive(Debug)]
pub struct ValueStream {
    node: Tick,
    dirty: Rc<Cell<bool>>,
    started: bool,
    last: Option<Value>,
}

impl ValueStream {
    pub fn node(&self) -> Tick {
        self.node
    }

    pub fn poll(&mut self, forest: &Forest) -> Option<Value> {
        if forest.has_pending_transaction() {
            return None;
        }
        if self.started && !self.dirty.get() {
            return None;
        }
        self.dirty.set(false);
        let current = forest.value(self.node);
        if self.started && current == self.last {
            return None;
        }
        self.started = true;
        self.last.clone_from(&current);
        current
    }
}

fn flag_on_change<R: Record + 'static>(collection: &Collection<R>, flag: Weak<Cell<bool>>) {
    collection.subscribe(move |_| match flag.upgrade() {
        Some(flag) => {
            flag.set(true);
            ListenerStatus::Keep
        }
        None => ListenerStatus::Drop,
    });
}

impl Forest {
    /// Subscribe to the net value of `node`.
    pub fn watch(&self, node: Tick) -> ValueStream {
        let dirty = Rc::new(Cell::new(false));
        flag_on_change(&self.nodes, Rc::downgrade(&dirty));
        flag_on_change(&self.value_changes, Rc::downgrade(&dirty));
        flag_on_change(&self.branches, Rc::downgrade(&dirty));
        ValueStream {
            node,
            dirty,
            started: false,
            last: None,
        }
    }
}
