//! Tick-indexed record collections.
//!
//! A collection is the only writer of its records: creation, lifecycle
//! changes and eviction all go through it, and each one is announced to the
//! collection's indexes and then to its listeners, in that order:
//!
//! ```text
//! add      → indexes.record_added   → Added
//! delete   → indexes.record_deleted → Deleted
//! do_state → lifecycle mutated      → StateChange { previous }
//! ```

use crate::clock::{Clock, Tick};
use crate::error::CollectionError;
use crate::index::{CollectionIndex, IndexKey, IndexMode};
use crate::lifecycle::{LifecycleState, Transition};
use crate::record::Record;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use tracing::trace;

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Deleted,
    StateChange { previous: LifecycleState },
}

/// Event delivered to collection listeners.
#[derive(Debug)]
pub struct ChangeEvent<'a, R> {
    pub collection: &'a str,
    pub kind: ChangeKind,
    pub record: &'a R,
}

/// Returned by a listener to stay subscribed or retire itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Keep,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

type Listener<R> = Box<dyn FnMut(&ChangeEvent<'_, R>) -> ListenerStatus>;

pub struct Collection<R: Record> {
    name: String,
    clock: Clock,
    records: BTreeMap<Tick, R>,
    indexes: BTreeMap<String, CollectionIndex<R>>,
    listeners: RefCell<Vec<(ListenerId, Listener<R>)>>,
    next_listener: Cell<u64>,
}

impl<R: Record> fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("records", &self.records.len())
            .field("indexes", &self.indexes.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl<R: Record> Collection<R> {
    pub fn new(name: impl Into<String>, clock: Clock) -> Self {
        Self {
            name: name.into(),
            clock,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ── records ──

    /// Build a record from `init` and store it at its tick.
    pub fn add(&mut self, init: R::Init) -> Result<Tick, R::Error> {
        let record = R::build(&self.clock, init)?;
        let tick = record.tick();
        if self.records.contains_key(&tick) {
            return Err(CollectionError::TickCollision {
                collection: self.name.clone(),
                tick,
            }
            .into());
        }

        for index in self.indexes.values_mut() {
            index.record_added(&record);
        }
        self.records.insert(tick, record);
        if let Some(record) = self.records.get(&tick) {
            self.emit(ChangeKind::Added, record);
        }
        Ok(tick)
    }

    pub fn get(&self, tick: Tick) -> Option<&R> {
        self.records.get(&tick)
    }

    pub fn has(&self, tick: Tick) -> bool {
        self.records.contains_key(&tick)
    }

    /// Evict a record. Active records are completed first.
    pub fn delete(&mut self, tick: Tick) -> Option<R> {
        let now = self.clock.now();
        let mut record = self.records.remove(&tick)?;
        if record.is_active() {
            record.lifecycle_mut().complete(now);
        }
        for index in self.indexes.values_mut() {
            index.record_deleted(tick);
        }
        self.emit(ChangeKind::Deleted, &record);
        Some(record)
    }

    /// Drive a lifecycle transition on the record at `tick`.
    ///
    /// Returns `None` for an unknown tick. Listeners hear `StateChange` only
    /// when the state actually moved.
    pub fn do_state(&mut self, tick: Tick, transition: Transition) -> Option<&R> {
        let now = self.clock.now();
        let record = self.records.get_mut(&tick)?;
        let previous = record.lifecycle().state();
        let changed = record.lifecycle_mut().apply(transition, Some(now));
        let record = self.records.get(&tick)?;
        if changed {
            self.emit(ChangeKind::StateChange { previous }, record);
        }
        Some(record)
    }

    /// Set the state of the record at `tick` directly.
    ///
    /// Returns the record only when its state changed.
    pub fn set_state(&mut self, tick: Tick, state: LifecycleState) -> Option<&R> {
        let now = self.clock.now();
        let record = self.records.get_mut(&tick)?;
        let previous = record.lifecycle().state();
        if !record.lifecycle_mut().force(state, Some(now)) {
            return None;
        }
        let record = self.records.get(&tick)?;
        self.emit(ChangeKind::StateChange { previous }, record);
        Some(record)
    }

    /// All records, ascending tick.
    pub fn all(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    /// Active records, ascending tick.
    pub fn active(&self) -> impl Iterator<Item = &R> {
        self.records.values().filter(|record| record.is_active())
    }

    /// Records stamped strictly after `tick`, ascending.
    pub fn after(&self, tick: Tick) -> impl Iterator<Item = &R> {
        self.records
            .range((Bound::Excluded(tick), Bound::Unbounded))
            .map(|(_, record)| record)
    }

    // ── indexes ──

    /// Register an index, or return the one already registered as `name`.
    ///
    /// A new index is back-filled from the records already stored.
    pub fn index<F>(&mut self, name: &str, test: F, mode: IndexMode) -> &CollectionIndex<R>
    where
        F: Fn(&R) -> IndexKey + 'static,
    {
        if !self.indexes.contains_key(name) {
            let mut index = CollectionIndex::new(name, Box::new(test), mode);
            for record in self.records.values() {
                index.record_added(record);
            }
            self.indexes.insert(name.to_string(), index);
        }
        &self.indexes[name]
    }

    pub fn find_index(&self, name: &str) -> Option<&CollectionIndex<R>> {
        self.indexes.get(name)
    }

    /// Ticks under `key` in index `name`; empty if the index is unknown.
    pub fn index_ticks(&self, name: &str, key: &IndexKey) -> Vec<Tick> {
        match self.indexes.get(name) {
            Some(index) => index.ticks_for_key(key),
            None => {
                trace!(collection = %self.name, index = name, "lookup on unregistered index");
                Vec::new()
            }
        }
    }

    /// Records under `key` in index `name`; empty if the index is unknown.
    pub fn index_records(&self, name: &str, key: &IndexKey) -> Vec<&R> {
        match self.indexes.get(name) {
            Some(index) => index.records_for_key(self, key),
            None => {
                trace!(collection = %self.name, index = name, "lookup on unregistered index");
                Vec::new()
            }
        }
    }

    // ── listeners ──

    /// Attach a listener. Works through `&self` so that read paths can
    /// attach caches lazily.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&ChangeEvent<'_, R>) -> ListenerStatus + 'static,
    {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Box::new(listener)));
        id
    }

    /// Detach a listener. Returns whether it was attached.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn emit(&self, kind: ChangeKind, record: &R) {
        let mut current = self.listeners.take();
        let event = ChangeEvent {
            collection: &self.name,
            kind,
            record,
        };
        current.retain_mut(|(_, listener)| listener(&event) == ListenerStatus::Keep);

        // Listeners attached while this event was being delivered go last.
        let mut slot = self.listeners.borrow_mut();
        let attached = std::mem::take(&mut *slot);
        *slot = current;
        slot.extend(attached);
    }
}
