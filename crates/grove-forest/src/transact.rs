//! Transactions and rollback.
//!
//! ```text
//! transact ─→ Trans (active, pending)
//!               │ action(&mut Forest)
//!               ├─ Ok  → [final pass] → Complete
//!               └─ Err → rollback(start) → Error
//! ```
//!
//! Rollback walks every record stamped after the transaction's start, most
//! recent first, and removes it. Removed change records stop shadowing their
//! node, which restores the value or config they replaced.

use crate::error::ForestError;
use crate::forest::{Forest, RecordRef};
use crate::trans::TransOptions;
use grove_kernel::{Clock, Collection, Record, Tick, Transition};
use std::collections::BTreeSet;
use tracing::debug;

impl Forest {
    pub fn transact<T, F>(&mut self, action: F) -> Result<T, ForestError>
    where
        F: FnOnce(&mut Forest) -> Result<T, ForestError>,
    {
        self.transact_with(TransOptions::default(), action)
    }

    /// Run `action` as one transaction.
    ///
    /// On error every record written since the start is removed, the
    /// transaction record fails, and the error comes back wrapped in
    /// [`ForestError::TransactionFailed`].
    pub fn transact_with<T, F>(&mut self, options: TransOptions, action: F) -> Result<T, ForestError>
    where
        F: FnOnce(&mut Forest) -> Result<T, ForestError>,
    {
        let no_validation = options.no_validation;
        let trans = self.transactions.add(options)?;
        self.pending.push(trans);
        debug!(%trans, no_validation, "transaction started");

        let outcome = match action(self) {
            Ok(value) if no_validation => self.final_pass(trans).map(|()| value),
            other => other,
        };
        self.pending.retain(|pending| *pending != trans);

        match outcome {
            Ok(value) => {
                self.transactions.do_state(trans, Transition::Complete);
                debug!(%trans, "transaction complete");
                Ok(value)
            }
            Err(source) => {
                self.rollback(trans);
                self.transactions
                    .do_state(trans, Transition::Fail(source.to_string()));
                debug!(%trans, error = %source, "transaction failed");
                Err(ForestError::TransactionFailed {
                    trans,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Transactions that have started and not yet finished, outermost first.
    pub fn pending_transactions(&self) -> &[Tick] {
        &self.pending
    }

    pub fn has_pending_transaction(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Validate everything a suppressing transaction touched, once the last
    /// suppressing transaction is about to finish.
    fn final_pass(&mut self, trans: Tick) -> Result<(), ForestError> {
        if !self.config().validation.enabled || self.suppressors().iter().any(|t| *t != trans) {
            return Ok(());
        }
        let touched = self.touched_since(trans);
        debug!(%trans, nodes = touched.len(), "final validation pass");
        self.validate_cascade(&touched)?;

        accept_after(&mut self.nodes, trans);
        accept_after(&mut self.value_changes, trans);
        accept_after(&mut self.config_changes, trans);
        accept_after(&mut self.branches, trans);
        accept_after(&mut self.trees, trans);
        Ok(())
    }

    /// Nodes named by active records written after `start`.
    fn touched_since(&self, start: Tick) -> Vec<Tick> {
        let mut touched = BTreeSet::new();
        touched.extend(active_after(&self.nodes, start).map(Record::tick));
        touched.extend(active_after(&self.value_changes, start).map(|c| c.node()));
        touched.extend(active_after(&self.config_changes, start).map(|c| c.node()));
        for branch in active_after(&self.branches, start) {
            touched.insert(branch.source());
            touched.insert(branch.dest());
        }
        touched.extend(active_after(&self.trees, start).map(|t| t.root()));
        touched.into_iter().collect()
    }

    fn rollback(&mut self, start: Tick) {
        let mut written: Vec<RecordRef> = Vec::new();
        written.extend(self.nodes.after(start).map(|r| RecordRef::Node(r.tick())));
        written.extend(
            self.value_changes
                .after(start)
                .map(|r| RecordRef::ValueChange(r.tick())),
        );
        written.extend(
            self.config_changes
                .after(start)
                .map(|r| RecordRef::ConfigChange(r.tick())),
        );
        written.extend(self.branches.after(start).map(|r| RecordRef::Branch(r.tick())));
        written.extend(self.trees.after(start).map(|r| RecordRef::Tree(r.tick())));
        written.sort_by(|a, b| Clock::by_tick(&a.tick(), &b.tick()));

        for record in written {
            debug!(?record, "rolling back");
            self.transition(record, Transition::Remove);
        }
    }
}

fn active_after<R: Record>(collection: &Collection<R>, start: Tick) -> impl Iterator<Item = &R> {
    collection.after(start).filter(|record| record.is_active())
}

fn accept_after<R: Record>(collection: &mut Collection<R>, start: Tick) {
    let ticks: Vec<Tick> = active_after(collection, start).map(Record::tick).collect();
    for tick in ticks {
        collection.do_state(tick, Transition::Accept);
    }
}
