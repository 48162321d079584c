//! Directed, append-only edges.
//!
//! Branches are never edited. A later branch with `del = true` and the same
//! `(source, dest)` pair retracts every earlier live branch for that pair in
//! the live view; both records stay in history.

use crate::error::{ConstructionError, ForestError};
use crate::schema::Schema;
use grove_kernel::{Clock, Lifecycle, Record, Tick};

#[derive(Debug, Clone)]
pub struct BranchInit {
    pub source: Tick,
    pub dest: Tick,
    pub del: bool,
    /// Checked against the dest node's value.
    pub schema: Option<Schema>,
}

impl BranchInit {
    pub fn new(source: Tick, dest: Tick) -> Self {
        Self {
            source,
            dest,
            del: false,
            schema: None,
        }
    }

    /// A retraction of `source → dest`.
    pub fn retract(source: Tick, dest: Tick) -> Self {
        Self {
            del: true,
            ..Self::new(source, dest)
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Branch {
    tick: Tick,
    lifecycle: Lifecycle,
    source: Tick,
    dest: Tick,
    del: bool,
    schema: Option<Schema>,
}

impl Branch {
    pub fn source(&self) -> Tick {
        self.source
    }

    pub fn dest(&self) -> Tick {
        self.dest
    }

    pub fn is_del(&self) -> bool {
        self.del
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Whether both branches join the same ordered pair.
    pub fn same_pair(&self, other: &Branch) -> bool {
        self.source == other.source && self.dest == other.dest
    }

    /// Whether this branch touches `node` at either end.
    pub fn touches(&self, node: Tick) -> bool {
        self.source == node || self.dest == node
    }
}

impl Record for Branch {
    type Init = BranchInit;
    type Error = ForestError;

    fn build(clock: &Clock, init: BranchInit) -> Result<Self, ForestError> {
        if init.source == init.dest {
            return Err(ConstructionError::CircularBranch { node: init.source }.into());
        }
        Ok(Self {
            tick: clock.next(),
            lifecycle: Lifecycle::new(),
            source: init.source,
            dest: init.dest,
            del: init.del,
            schema: init.schema,
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

/// Reduce branch records (ascending tick) to the ones still live.
///
/// Inactive records are ignored. A `del` record drops every live record
/// accumulated so far with its pair and is not kept itself.
pub fn live_fold<'a>(records: impl IntoIterator<Item = &'a Branch>) -> Vec<&'a Branch> {
    records
        .into_iter()
        .filter(|branch| branch.is_active())
        .fold(Vec::new(), |mut live, branch| {
            if branch.del {
                live.retain(|kept: &&Branch| !kept.same_pair(branch));
            } else {
                live.push(branch);
            }
            live
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(clock: &Clock, init: BranchInit) -> Branch {
        Branch::build(clock, init).expect("valid branch")
    }

    #[test]
    fn self_loops_are_rejected_without_a_tick() {
        let clock = Clock::new();
        let err = Branch::build(&clock, BranchInit::new(Tick(4), Tick(4))).expect_err("loop");
        assert!(matches!(
            err,
            ForestError::Construction(ConstructionError::CircularBranch { node }) if node == Tick(4)
        ));
        assert_eq!(clock.now(), Tick::ZERO);
    }

    #[test]
    fn del_retracts_every_earlier_match() {
        let clock = Clock::new();
        let a = branch(&clock, BranchInit::new(Tick(1), Tick(2)));
        let b = branch(&clock, BranchInit::new(Tick(1), Tick(2)));
        let c = branch(&clock, BranchInit::new(Tick(1), Tick(3)));
        let del = branch(&clock, BranchInit::retract(Tick(1), Tick(2)));
        let live: Vec<Tick> = live_fold([&a, &b, &c, &del])
            .into_iter()
            .map(Record::tick)
            .collect();
        assert_eq!(live, vec![c.tick()]);
    }

    #[test]
    fn inactive_del_does_not_retract() {
        let clock = Clock::new();
        let a = branch(&clock, BranchInit::new(Tick(1), Tick(2)));
        let mut del = branch(&clock, BranchInit::retract(Tick(1), Tick(2)));
        del.lifecycle_mut().remove(clock.now());
        assert_eq!(live_fold([&a, &del]).len(), 1);
    }

    #[test]
    fn re_adding_after_del_is_live() {
        let clock = Clock::new();
        let a = branch(&clock, BranchInit::new(Tick(1), Tick(2)));
        let del = branch(&clock, BranchInit::retract(Tick(1), Tick(2)));
        let again = branch(&clock, BranchInit::new(Tick(1), Tick(2)));
        let live: Vec<Tick> = live_fold([&a, &del, &again])
            .into_iter()
            .map(Record::tick)
            .collect();
        assert_eq!(live, vec![again.tick()]);
    }
}
