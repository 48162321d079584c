//! Reactive secondary indexes.
//!
//! An index maps a key derived from each record to the tick(s) of the
//! records that produced it. The owning [`Collection`](crate::Collection)
//! feeds it every add and delete before any listener runs, so a listener
//! reacting to an event already sees the index in its post-event state.

use crate::clock::Tick;
use crate::collection::Collection;
use crate::record::Record;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Key produced by an index test function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// The record has no value for this index.
    Absent,
    Bool(bool),
    Int(i64),
    Tick(Tick),
    Text(String),
}

impl From<bool> for IndexKey {
    fn from(value: bool) -> Self {
        IndexKey::Bool(value)
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Int(value)
    }
}

impl From<Tick> for IndexKey {
    fn from(value: Tick) -> Self {
        IndexKey::Tick(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::Text(value.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(value: String) -> Self {
        IndexKey::Text(value)
    }
}

impl<T: Into<IndexKey>> From<Option<T>> for IndexKey {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(IndexKey::Absent)
    }
}

impl IndexKey {
    /// Truthiness used by binary indexes.
    pub fn is_truthy(&self) -> bool {
        match self {
            IndexKey::Absent => false,
            IndexKey::Bool(b) => *b,
            IndexKey::Int(n) => *n != 0,
            IndexKey::Tick(t) => *t != Tick::ZERO,
            IndexKey::Text(s) => !s.is_empty(),
        }
    }
}

/// How an index stores ticks per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// A set of ticks per key.
    #[default]
    Multi,
    /// One tick per key; the last write wins.
    Unique,
    /// Records split into `yes`/`no` sets by the truthiness of their key.
    /// `only_yes` skips tracking the `no` set.
    Binary { only_yes: bool },
}

/// Test function deriving an index key from a record.
pub type IndexTest<R> = Box<dyn Fn(&R) -> IndexKey>;

pub struct CollectionIndex<R> {
    name: String,
    mode: IndexMode,
    test: IndexTest<R>,
    yes: BTreeSet<Tick>,
    no: BTreeSet<Tick>,
    multi: BTreeMap<IndexKey, BTreeSet<Tick>>,
    unique: BTreeMap<IndexKey, Tick>,
}

impl<R: Record> fmt::Debug for CollectionIndex<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionIndex")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("keys", &self.key_count())
            .finish()
    }
}

impl<R: Record> CollectionIndex<R> {
    pub fn new(name: impl Into<String>, test: IndexTest<R>, mode: IndexMode) -> Self {
        Self {
            name: name.into(),
            mode,
            test,
            yes: BTreeSet::new(),
            no: BTreeSet::new(),
            multi: BTreeMap::new(),
            unique: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Number of distinct keys (binary indexes count their non-empty sides).
    pub fn key_count(&self) -> usize {
        match self.mode {
            IndexMode::Binary { .. } => {
                usize::from(!self.yes.is_empty()) + usize::from(!self.no.is_empty())
            }
            IndexMode::Multi => self.multi.len(),
            IndexMode::Unique => self.unique.len(),
        }
    }

    pub(crate) fn record_added(&mut self, record: &R) {
        let key = (self.test)(record);
        let tick = record.tick();
        match self.mode {
            IndexMode::Binary { only_yes } => {
                if key.is_truthy() {
                    self.yes.insert(tick);
                } else if !only_yes {
                    self.no.insert(tick);
                }
            }
            IndexMode::Unique => {
                self.unique.insert(key, tick);
            }
            IndexMode::Multi => {
                self.multi.entry(key).or_default().insert(tick);
            }
        }
    }

    /// Remove `tick` from every bucket it may belong to.
    ///
    /// The key is not retained per tick, so keyed modes scan all buckets.
    pub(crate) fn record_deleted(&mut self, tick: Tick) {
        match self.mode {
            IndexMode::Binary { .. } => {
                self.yes.remove(&tick);
                self.no.remove(&tick);
            }
            IndexMode::Unique => {
                self.unique.retain(|_, stored| *stored != tick);
            }
            IndexMode::Multi => {
                self.multi.retain(|_, ticks| {
                    ticks.remove(&tick);
                    !ticks.is_empty()
                });
            }
        }
    }

    /// Ticks stored under `key`, ascending.
    ///
    /// For binary indexes a truthy key selects the `yes` set.
    pub fn ticks_for_key(&self, key: &IndexKey) -> Vec<Tick> {
        match self.mode {
            IndexMode::Binary { .. } => {
                let side = if key.is_truthy() { &self.yes } else { &self.no };
                side.iter().copied().collect()
            }
            IndexMode::Unique => self.unique.get(key).copied().into_iter().collect(),
            IndexMode::Multi => self
                .multi
                .get(key)
                .map(|ticks| ticks.iter().copied().collect())
                .unwrap_or_default(),
        }
    }

    /// Records stored under `key`, skipping ticks no longer in `collection`.
    pub fn records_for_key<'c>(&self, collection: &'c Collection<R>, key: &IndexKey) -> Vec<&'c R> {
        self.ticks_for_key(key)
            .into_iter()
            .filter_map(|tick| collection.get(tick))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_keys_map_none_to_absent() {
        let key: IndexKey = Option::<Tick>::None.into();
        assert_eq!(key, IndexKey::Absent);
        let key: IndexKey = Some(Tick(3)).into();
        assert_eq!(key, IndexKey::Tick(Tick(3)));
    }

    #[test]
    fn truthiness() {
        assert!(!IndexKey::Absent.is_truthy());
        assert!(!IndexKey::Bool(false).is_truthy());
        assert!(IndexKey::Int(2).is_truthy());
        assert!(!IndexKey::Text(String::new()).is_truthy());
        assert!(IndexKey::Tick(Tick(1)).is_truthy());
    }
}
