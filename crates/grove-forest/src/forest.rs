//! The forest: six collections sharing one clock, plus the derived views
//! (net values, live children and parents) cached over them.
//!
//! Every mutation draws a fresh tick, so a per-tick memo is invalidated by
//! any later write. Lifecycle changes do not draw ticks (validation failure
//! and rollback happen within the tick of the write they undo), which is why
//! value memos also watch for state changes.

use crate::branch::{Branch, BranchInit, live_fold};
use crate::change::{ConfigChangeInit, NodeConfigChange, NodeValueChange, ValueChangeInit};
use crate::config::ForestConfig;
use crate::error::{ConstructionError, ForestError};
use crate::node::{FormRule, Node, NodeConfig, NodeInit};
use crate::trans::Trans;
use crate::tree::{Tree, TreeInit};
use crate::value::{Form, Key, Value};
use grove_kernel::{
    ChangeEvent, ChangeKind, Clock, Collection, Expiry, IndexMode, Memo, MemoBuilder, Record,
    Tick, Transition, Watch,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::{debug, trace};

pub(crate) const BY_SOURCE: &str = "source";
pub(crate) const BY_DEST: &str = "dest";
pub(crate) const BY_NODE: &str = "node";
pub(crate) const BY_NAME: &str = "name";
pub(crate) const BY_ROOT: &str = "root";
pub(crate) const NO_VALIDATION: &str = "no_validation";

type ValueMemo = Rc<Memo<Forest, Option<Value>>>;
type LinkMemo = Rc<Memo<Forest, Vec<Tick>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Direction {
    Children,
    Parents,
}

/// A record in one of the forest's mutable collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordRef {
    Node(Tick),
    ValueChange(Tick),
    ConfigChange(Tick),
    Branch(Tick),
    Tree(Tick),
}

impl RecordRef {
    pub(crate) fn tick(self) -> Tick {
        match self {
            RecordRef::Node(t)
            | RecordRef::ValueChange(t)
            | RecordRef::ConfigChange(t)
            | RecordRef::Branch(t)
            | RecordRef::Tree(t) => t,
        }
    }
}

#[derive(Debug)]
pub struct Forest {
    config: ForestConfig,
    clock: Clock,
    pub(crate) nodes: Collection<Node>,
    pub(crate) branches: Collection<Branch>,
    pub(crate) value_changes: Collection<NodeValueChange>,
    pub(crate) config_changes: Collection<NodeConfigChange>,
    pub(crate) transactions: Collection<Trans>,
    pub(crate) trees: Collection<Tree>,
    pub(crate) pending: Vec<Tick>,
    values: RefCell<BTreeMap<Tick, ValueMemo>>,
    links: RefCell<BTreeMap<(Tick, Direction), LinkMemo>>,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}

fn is_state_change<R>(event: &ChangeEvent<'_, R>) -> bool {
    matches!(event.kind, ChangeKind::StateChange { .. })
}

impl Forest {
    pub fn new() -> Self {
        Self::with_config(ForestConfig::default())
    }

    pub fn with_config(config: ForestConfig) -> Self {
        let clock = Clock::new();

        let nodes = Collection::new("nodes", clock.clone());

        let mut branches = Collection::new("branches", clock.clone());
        branches.index(BY_SOURCE, |b: &Branch| b.source().into(), IndexMode::Multi);
        branches.index(BY_DEST, |b: &Branch| b.dest().into(), IndexMode::Multi);

        let mut value_changes = Collection::new("value_changes", clock.clone());
        value_changes.index(BY_NODE, |c: &NodeValueChange| c.node().into(), IndexMode::Multi);

        let mut config_changes = Collection::new("config_changes", clock.clone());
        config_changes.index(BY_NODE, |c: &NodeConfigChange| c.node().into(), IndexMode::Multi);

        let mut transactions = Collection::new("transactions", clock.clone());
        transactions.index(
            NO_VALIDATION,
            |t: &Trans| t.no_validation().into(),
            IndexMode::Binary { only_yes: true },
        );

        let mut trees = Collection::new("trees", clock.clone());
        trees.index(BY_NAME, |t: &Tree| t.name().into(), IndexMode::Multi);
        trees.index(BY_ROOT, |t: &Tree| t.root().into(), IndexMode::Multi);

        debug!(forest = %config.name, "forest created");
        Self {
            config,
            clock,
            nodes,
            branches,
            value_changes,
            config_changes,
            transactions,
            trees,
            pending: Vec::new(),
            values: RefCell::new(BTreeMap::new()),
            links: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    // ── collections ──

    pub fn nodes(&self) -> &Collection<Node> {
        &self.nodes
    }

    pub fn branches(&self) -> &Collection<Branch> {
        &self.branches
    }

    pub fn value_changes(&self) -> &Collection<NodeValueChange> {
        &self.value_changes
    }

    pub fn config_changes(&self) -> &Collection<NodeConfigChange> {
        &self.config_changes
    }

    pub fn transactions(&self) -> &Collection<Trans> {
        &self.transactions
    }

    pub fn trees(&self) -> &Collection<Tree> {
        &self.trees
    }

    /// A memo builder bound to this forest's clock.
    ///
    /// Without watches the memo expires every tick; with watches it expires
    /// only when a watched event fires.
    pub fn cache<T, F>(&self, generator: F) -> MemoBuilder<Forest, T>
    where
        T: Clone,
        F: Fn(&Forest) -> T + 'static,
    {
        MemoBuilder::new(&self.clock, generator)
    }

    // ── reads ──

    pub fn node(&self, tick: Tick) -> Option<&Node> {
        self.nodes.get(tick)
    }

    pub fn is_active_node(&self, tick: Tick) -> bool {
        self.nodes.get(tick).is_some_and(Record::is_active)
    }

    /// The node's own current value, without children.
    pub fn base_value(&self, node: Tick) -> Option<Value> {
        let record = self.nodes.get(node)?;
        let latest = self
            .value_changes
            .index_records(BY_NODE, &node.into())
            .into_iter()
            .rev()
            .find(|change| change.is_active());
        Some(latest.map_or_else(
            || record.initial_value().clone(),
            |change| change.value().clone(),
        ))
    }

    pub fn node_config(&self, node: Tick) -> Option<NodeConfig> {
        let record = self.nodes.get(node)?;
        let latest = self
            .config_changes
            .index_records(BY_NODE, &node.into())
            .into_iter()
            .rev()
            .find(|change| change.is_active());
        Some(latest.map_or_else(
            || record.initial_config().clone(),
            |change| change.config().clone(),
        ))
    }

    /// Every value change recorded for `node`, ascending, whatever its state.
    pub fn value_history(&self, node: Tick) -> Vec<&NodeValueChange> {
        self.value_changes.index_records(BY_NODE, &node.into())
    }

    /// Every branch record from `source` to `dest`, including retractions.
    pub fn branches_between(&self, source: Tick, dest: Tick) -> Vec<&Branch> {
        self.branches
            .index_records(BY_SOURCE, &source.into())
            .into_iter()
            .filter(|branch| branch.dest() == dest)
            .collect()
    }

    /// Net value: the base value with every live child's net value set at
    /// the child's key. `None` for unknown or inactive nodes.
    pub fn value(&self, node: Tick) -> Option<Value> {
        if !self.nodes.has(node) {
            return None;
        }
        self.value_memo(node).get(self)
    }

    /// Live children, ascending tick. Empty for unknown or inactive nodes.
    pub fn children(&self, node: Tick) -> Vec<Tick> {
        if !self.nodes.has(node) {
            return Vec::new();
        }
        self.link_memo(node, Direction::Children).get(self)
    }

    pub fn parents(&self, node: Tick) -> Vec<Tick> {
        if !self.nodes.has(node) {
            return Vec::new();
        }
        self.link_memo(node, Direction::Parents).get(self)
    }

    /// Live branch records leaving `node`, ascending tick.
    pub fn live_branches_from(&self, node: Tick) -> Vec<&Branch> {
        live_fold(self.branches.index_records(BY_SOURCE, &node.into()))
    }

    /// Live branch records arriving at `node`, ascending tick.
    pub fn live_branches_into(&self, node: Tick) -> Vec<&Branch> {
        live_fold(self.branches.index_records(BY_DEST, &node.into()))
    }

    /// The most recent active tree with this name.
    pub fn tree(&self, name: &str) -> Option<&Tree> {
        self.trees
            .index_records(BY_NAME, &name.into())
            .into_iter()
            .rev()
            .find(|tree| tree.is_active())
    }

    pub fn trees_rooted_at(&self, node: Tick) -> Vec<&Tree> {
        self.trees
            .index_records(BY_ROOT, &node.into())
            .into_iter()
            .filter(|tree| tree.is_active())
            .collect()
    }

    fn value_memo(&self, node: Tick) -> ValueMemo {
        if let Some(memo) = self.values.borrow().get(&node) {
            return Rc::clone(memo);
        }
        let memo = Rc::new(
            MemoBuilder::new(&self.clock, move |forest: &Forest| forest.compute_value(node))
                .target(move |forest: &Forest| forest.is_active_node(node), |_| None)
                .watch(
                    &self.nodes,
                    Watch::when(move |event: &ChangeEvent<'_, Node>| {
                        event.record.tick() == node || is_state_change(event)
                    }),
                )
                .watch(
                    &self.value_changes,
                    Watch::when(move |event: &ChangeEvent<'_, NodeValueChange>| {
                        event.record.node() == node || is_state_change(event)
                    }),
                )
                .watch(
                    &self.config_changes,
                    Watch::when(move |event: &ChangeEvent<'_, NodeConfigChange>| {
                        event.record.node() == node || is_state_change(event)
                    }),
                )
                .watch(
                    &self.branches,
                    Watch::when(move |event: &ChangeEvent<'_, Branch>| {
                        event.record.touches(node) || is_state_change(event)
                    }),
                )
                .expiry(Expiry::EveryTick)
                .build(),
        );
        self.values.borrow_mut().insert(node, Rc::clone(&memo));
        memo
    }

    fn link_memo(&self, node: Tick, direction: Direction) -> LinkMemo {
        if let Some(memo) = self.links.borrow().get(&(node, direction)) {
            return Rc::clone(memo);
        }
        let memo = Rc::new(
            MemoBuilder::new(&self.clock, move |forest: &Forest| {
                forest.compute_links(node, direction)
            })
            .target(move |forest: &Forest| forest.is_active_node(node), |_| Vec::new())
            .watch(
                &self.branches,
                Watch::when(move |event: &ChangeEvent<'_, Branch>| match direction {
                    Direction::Children => event.record.source() == node,
                    Direction::Parents => event.record.dest() == node,
                }),
            )
            .expiry(Expiry::OnWatchedChange)
            .build(),
        );
        self.links
            .borrow_mut()
            .insert((node, direction), Rc::clone(&memo));
        memo
    }

    fn compute_links(&self, node: Tick, direction: Direction) -> Vec<Tick> {
        let mut linked: Vec<Tick> = match direction {
            Direction::Children => self
                .live_branches_from(node)
                .into_iter()
                .map(Branch::dest)
                .collect(),
            Direction::Parents => self
                .live_branches_into(node)
                .into_iter()
                .map(Branch::source)
                .collect(),
        };
        linked.sort();
        linked.dedup();
        linked
    }

    fn compute_value(&self, node: Tick) -> Option<Value> {
        let mut visited = BTreeSet::from([node]);
        self.net_value_from(node, &mut visited)
    }

    /// Uncached net value. `visited` guards against cycles: a child already
    /// in it is skipped, so the first path to reach a node wins.
    fn net_value_from(&self, node: Tick, visited: &mut BTreeSet<Tick>) -> Option<Value> {
        if !self.is_active_node(node) {
            return None;
        }
        let mut net = self.base_value(node)?;
        let form = net.form();
        if !form.is_compound() {
            return Some(net);
        }

        for child in self.children(node) {
            if !visited.insert(child) {
                continue;
            }
            let Some(record) = self.nodes.get(child) else {
                continue;
            };
            let Some(child_value) = self.net_value_from(child, visited) else {
                continue;
            };
            match (record.name(), form) {
                (Some(key), _) => net.insert_key(key, child_value, form),
                (None, Form::Array) => net.push(child_value),
                (None, _) => net.insert_key(&Key::from(child), child_value, form),
            }
        }
        Some(net)
    }

    // ── writes ──

    fn require_active(&self, node: Tick) -> Result<&Node, ForestError> {
        let record = self.nodes.get(node).ok_or(ForestError::UnknownNode(node))?;
        if !record.is_active() {
            return Err(ForestError::InactiveNode(node));
        }
        Ok(record)
    }

    /// Add a node. Without a form or type rule the node is locked to its
    /// initial form unless `validation.lock_initial_form` is off.
    pub fn add_node(&mut self, init: NodeInit) -> Result<Tick, ForestError> {
        let mut init = init;
        if self.config.validation.lock_initial_form && init.config.is_unconstrained() {
            init.config.form = Some(FormRule::Locked);
        }
        let tick = self.nodes.add(init)?;
        debug!(node = %tick, "node added");
        self.settle(RecordRef::Node(tick), &[tick])?;
        Ok(tick)
    }

    /// Add a node and link it under `parent`, atomically.
    pub fn add_child(&mut self, parent: Tick, init: NodeInit) -> Result<Tick, ForestError> {
        self.require_active(parent)?;
        self.transact(|forest| {
            let child = forest.add_node(init)?;
            forest.add_branch(parent, child)?;
            Ok(child)
        })
    }

    /// Record a new value for `node`; returns the change's tick.
    pub fn update_value(&mut self, node: Tick, value: impl Into<Value>) -> Result<Tick, ForestError> {
        self.require_active(node)?;
        let previous = self.base_value(node).unwrap_or_default();
        let change = self.value_changes.add(ValueChangeInit {
            node,
            value: value.into(),
            previous,
        })?;
        trace!(%node, %change, "value change recorded");
        self.settle(RecordRef::ValueChange(change), &[node])?;
        Ok(change)
    }

    /// Replace the config of `node`; returns the change's tick.
    pub fn update_config(&mut self, node: Tick, config: NodeConfig) -> Result<Tick, ForestError> {
        self.require_active(node)?;
        let previous = self.node_config(node).unwrap_or_default();
        let change = self.config_changes.add(ConfigChangeInit {
            node,
            config,
            previous,
        })?;
        trace!(%node, %change, "config change recorded");
        self.settle(RecordRef::ConfigChange(change), &[node])?;
        Ok(change)
    }

    pub fn add_branch(&mut self, source: Tick, dest: Tick) -> Result<Tick, ForestError> {
        self.add_branch_with(BranchInit::new(source, dest))
    }

    /// Retract every live `source → dest` branch.
    pub fn remove_branch(&mut self, source: Tick, dest: Tick) -> Result<Tick, ForestError> {
        self.add_branch_with(BranchInit::retract(source, dest))
    }

    pub fn add_branch_with(&mut self, init: BranchInit) -> Result<Tick, ForestError> {
        for endpoint in [init.source, init.dest] {
            if !self.nodes.has(endpoint) {
                return Err(ConstructionError::MissingEndpoint { endpoint }.into());
            }
        }
        let (source, dest, del) = (init.source, init.dest, init.del);
        let tick = self.branches.add(init)?;
        debug!(branch = %tick, %source, %dest, del, "branch added");
        self.settle(RecordRef::Branch(tick), &[dest, source])?;
        Ok(tick)
    }

    pub fn add_tree(&mut self, init: TreeInit) -> Result<Tick, ForestError> {
        self.require_active(init.root)?;
        let root = init.root;
        let tick = self.trees.add(init)?;
        debug!(tree = %tick, %root, "tree added");
        self.settle(RecordRef::Tree(tick), &[root])?;
        Ok(tick)
    }

    /// Accept `origin` if the cascade from `affected` validates, else fail
    /// it (reverting its effect) and return the error.
    fn settle(&mut self, origin: RecordRef, affected: &[Tick]) -> Result<(), ForestError> {
        if self.validation_suppressed() {
            trace!(?origin, "validation suppressed");
            return Ok(());
        }
        match self.validate_cascade(affected) {
            Ok(()) => {
                self.transition(origin, Transition::Accept);
                Ok(())
            }
            Err(err) => {
                debug!(?origin, error = %err, "validation failed; reverting");
                self.transition(origin, Transition::Fail(err.to_string()));
                Err(err.into())
            }
        }
    }

    pub(crate) fn transition(&mut self, record: RecordRef, transition: Transition) {
        match record {
            RecordRef::Node(t) => {
                self.nodes.do_state(t, transition);
            }
            RecordRef::ValueChange(t) => {
                self.value_changes.do_state(t, transition);
            }
            RecordRef::ConfigChange(t) => {
                self.config_changes.do_state(t, transition);
            }
            RecordRef::Branch(t) => {
                self.branches.do_state(t, transition);
            }
            RecordRef::Tree(t) => {
                self.trees.do_state(t, transition);
            }
        }
    }
}
