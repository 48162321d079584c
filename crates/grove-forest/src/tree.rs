//! Named entry points into the graph.

use crate::error::ForestError;
use crate::schema::Schema;
use grove_kernel::{Clock, Lifecycle, Record, Tick};

#[derive(Debug, Clone)]
pub struct TreeInit {
    pub name: String,
    pub root: Tick,
    /// Checked against the root node's net value.
    pub schema: Option<Schema>,
}

impl TreeInit {
    pub fn new(name: impl Into<String>, root: Tick) -> Self {
        Self {
            name: name.into(),
            root,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    tick: Tick,
    lifecycle: Lifecycle,
    name: String,
    root: Tick,
    schema: Option<Schema>,
}

impl Tree {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Tick {
        self.root
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }
}

impl Record for Tree {
    type Init = TreeInit;
    type Error = ForestError;

    fn build(clock: &Clock, init: TreeInit) -> Result<Self, ForestError> {
        Ok(Self {
            tick: clock.next(),
            lifecycle: Lifecycle::new(),
            name: init.name,
            root: init.root,
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
