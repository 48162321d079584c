//! The validation cascade.
//!
//! A node is valid when its net value passes its config rules, the schemas
//! of live branches arriving at it, and the schemas of trees rooted at it.
//! A write validates the nodes it touched and then every active ancestor,
//! since an ancestor's net value folds in the touched node.

use crate::error::{ValidationError, ValidationKind};
use crate::forest::{Forest, NO_VALIDATION};
use grove_kernel::{Record, Tick};
use std::collections::{BTreeSet, VecDeque};

impl Forest {
    /// Whether writes currently skip the cascade: validation is disabled,
    /// or a pending transaction asked for it to be suppressed.
    pub fn validation_suppressed(&self) -> bool {
        !self.config().validation.enabled || !self.suppressors().is_empty()
    }

    /// Active transactions that suppress validation.
    pub(crate) fn suppressors(&self) -> Vec<Tick> {
        self.transactions
            .index_records(NO_VALIDATION, &true.into())
            .into_iter()
            .filter(|trans| trans.is_active())
            .map(Record::tick)
            .collect()
    }

    /// Validate `nodes`, then their ancestors breadth-first, each once.
    pub fn validate_cascade(&self, nodes: &[Tick]) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<Tick> = nodes.iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) || !self.is_active_node(node) {
                continue;
            }
            self.validate_node(node)?;
            queue.extend(self.parents(node));
        }
        Ok(())
    }

    /// Check one node. Unknown and inactive nodes are trivially valid.
    pub fn validate_node(&self, node: Tick) -> Result<(), ValidationError> {
        let Some(record) = self.node(node) else {
            return Ok(());
        };
        let Some(value) = self.value(node) else {
            return Ok(());
        };
        let fail = |kind: ValidationKind| ValidationError { node, kind };

        let config = self.node_config(node).unwrap_or_default();
        config
            .check(&value, record.form(), record.type_tag())
            .map_err(fail)?;

        for branch in self.live_branches_into(node) {
            if let Some(schema) = branch.schema() {
                schema.validate(&value).map_err(|message| {
                    fail(ValidationKind::Schema {
                        origin: branch.tick(),
                        message,
                    })
                })?;
            }
        }

        for tree in self.trees_rooted_at(node) {
            if let Some(schema) = tree.schema() {
                schema.validate(&value).map_err(|message| {
                    fail(ValidationKind::Schema {
                        origin: tree.tick(),
                        message,
                    })
                })?;
            }
        }
        Ok(())
    }
}
