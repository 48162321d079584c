//! Proposed replacements of a node's value or config.
//!
//! The latest *active* change naming a node shadows the node's initial
//! value (resp. config). Failing or removing a change therefore reverts the
//! node to whatever the change replaced, which is also kept as `previous`.

use crate::error::ForestError;
use crate::node::NodeConfig;
use crate::value::Value;
use grove_kernel::{Clock, Lifecycle, Record, Tick};

#[derive(Debug, Clone)]
pub struct ValueChangeInit {
    pub node: Tick,
    pub value: Value,
    pub previous: Value,
}

#[derive(Debug, Clone)]
pub struct NodeValueChange {
    tick: Tick,
    lifecycle: Lifecycle,
    node: Tick,
    value: Value,
    previous: Value,
}

impl NodeValueChange {
    pub fn node(&self) -> Tick {
        self.node
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The node's base value when this change was made.
    pub fn previous(&self) -> &Value {
        &self.previous
    }
}

impl Record for NodeValueChange {
    type Init = ValueChangeInit;
    type Error = ForestError;

    fn build(clock: &Clock, init: ValueChangeInit) -> Result<Self, ForestError> {
        Ok(Self {
            tick: clock.next(),
            lifecycle: Lifecycle::new(),
            node: init.node,
            value: init.value,
            previous: init.previous,
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

#[derive(Debug, Clone)]
pub struct ConfigChangeInit {
    pub node: Tick,
    pub config: NodeConfig,
    pub previous: NodeConfig,
}

#[derive(Debug, Clone)]
pub struct NodeConfigChange {
    tick: Tick,
    lifecycle: Lifecycle,
    node: Tick,
    config: NodeConfig,
    previous: NodeConfig,
}

impl NodeConfigChange {
    pub fn node(&self) -> Tick {
        self.node
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn previous(&self) -> &NodeConfig {
        &self.previous
    }
}

impl Record for NodeConfigChange {
    type Init = ConfigChangeInit;
    type Error = ForestError;

    fn build(clock: &Clock, init: ConfigChangeInit) -> Result<Self, ForestError> {
        Ok(Self {
            tick: clock.next(),
            lifecycle: Lifecycle::new(),
            node: init.node,
            config: init.config,
            previous: init.previous,
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
