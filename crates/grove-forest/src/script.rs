//! Operation scripts: JSON lines replayed against a forest.
//!
//! Each non-empty line that does not start with `#` is one operation,
//! tagged by `op`. Nodes are referred to by script-local aliases:
//!
//! ```text
//! {"op": "add_node", "id": "root", "value": {"alpha": 1}}
//! {"op": "add_child", "id": "beta", "parent": "root", "name": "beta", "value": 2}
//! {"op": "update", "node": "beta", "value": 40}
//! {"op": "transaction", "no_validation": true, "ops": [...]}
//! ```
//!
//! A failing operation is recorded in the report and replay continues.
//! Inside a `transaction` op, the first failure rolls the whole batch back.

use crate::branch::BranchInit;
use crate::error::ForestError;
use crate::forest::Forest;
use crate::node::{NodeConfig, NodeInit};
use crate::schema::Schema;
use crate::trans::TransOptions;
use crate::tree::TreeInit;
use crate::value::{Key, Value};
use grove_kernel::Tick;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    AddNode {
        id: String,
        value: Value,
        #[serde(default)]
        name: Option<Key>,
        #[serde(default)]
        config: NodeConfig,
    },
    AddChild {
        id: String,
        parent: String,
        value: Value,
        #[serde(default)]
        name: Option<Key>,
        #[serde(default)]
        config: NodeConfig,
    },
    Update {
        node: String,
        value: Value,
    },
    Configure {
        node: String,
        config: NodeConfig,
    },
    Link {
        source: String,
        dest: String,
        #[serde(default)]
        schema: Option<Schema>,
    },
    Unlink {
        source: String,
        dest: String,
    },
    Tree {
        name: String,
        root: String,
        #[serde(default)]
        schema: Option<Schema>,
    },
    Transaction {
        #[serde(default)]
        no_validation: bool,
        #[serde(default)]
        label: Option<String>,
        ops: Vec<ScriptOp>,
    },
    /// Fail on purpose; inside a transaction this rolls it back.
    Abort {
        reason: String,
    },
}

impl ScriptOp {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptOp::AddNode { .. } => "add_node",
            ScriptOp::AddChild { .. } => "add_child",
            ScriptOp::Update { .. } => "update",
            ScriptOp::Configure { .. } => "configure",
            ScriptOp::Link { .. } => "link",
            ScriptOp::Unlink { .. } => "unlink",
            ScriptOp::Tree { .. } => "tree",
            ScriptOp::Transaction { .. } => "transaction",
            ScriptOp::Abort { .. } => "abort",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptLine {
    pub line: usize,
    pub op: ScriptOp,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<ScriptLine>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),
}

pub fn read_script(reader: impl BufRead) -> Result<Script, ScriptError> {
    let mut lines = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ScriptError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let op: ScriptOp = serde_json::from_str(trimmed)
            .map_err(|e| ScriptError::Parse(line_no + 1, e.to_string()))?;
        lines.push(ScriptLine {
            line: line_no + 1,
            op,
        });
    }
    Ok(Script { lines })
}

pub fn read_script_from_path(path: impl AsRef<Path>) -> Result<Script, ScriptError> {
    let file = File::open(path.as_ref())
        .map_err(|e| ScriptError::Io(0, format!("{}: {e}", path.as_ref().display())))?;
    read_script(std::io::BufReader::new(file))
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub line: usize,
    pub op: &'static str,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ReplayReport {
    pub applied: usize,
    pub failures: Vec<Failure>,
    /// Net value of every alias whose node is still active.
    pub values: BTreeMap<String, Value>,
    #[serde(skip)]
    pub aliases: BTreeMap<String, Tick>,
}

impl ReplayReport {
    pub fn failed_lines(&self) -> Vec<usize> {
        self.failures.iter().map(|failure| failure.line).collect()
    }
}

/// Apply every line of `script` to `forest`.
pub fn replay(forest: &mut Forest, script: &Script) -> ReplayReport {
    let mut report = ReplayReport::default();
    for entry in &script.lines {
        match apply(forest, &mut report.aliases, &entry.op) {
            Ok(()) => report.applied += 1,
            Err(err) => {
                debug!(line = entry.line, op = entry.op.name(), error = %err, "script op failed");
                report.failures.push(Failure {
                    line: entry.line,
                    op: entry.op.name(),
                    error: err.to_string(),
                });
            }
        }
    }
    report.values = report
        .aliases
        .iter()
        .filter_map(|(alias, tick)| forest.value(*tick).map(|value| (alias.clone(), value)))
        .collect();
    report
}

fn node_init(value: &Value, name: &Option<Key>, config: &NodeConfig) -> NodeInit {
    NodeInit {
        name: name.clone(),
        value: value.clone(),
        config: config.clone(),
    }
}

fn resolve(aliases: &BTreeMap<String, Tick>, alias: &str) -> Result<Tick, ForestError> {
    aliases
        .get(alias)
        .copied()
        .ok_or_else(|| ForestError::Aborted(format!("unknown node alias `{alias}`")))
}

fn apply(
    forest: &mut Forest,
    aliases: &mut BTreeMap<String, Tick>,
    op: &ScriptOp,
) -> Result<(), ForestError> {
    match op {
        ScriptOp::AddNode {
            id,
            value,
            name,
            config,
        } => {
            let tick = forest.add_node(node_init(value, name, config))?;
            aliases.insert(id.clone(), tick);
        }
        ScriptOp::AddChild {
            id,
            parent,
            value,
            name,
            config,
        } => {
            let parent = resolve(aliases, parent)?;
            let tick = forest.add_child(parent, node_init(value, name, config))?;
            aliases.insert(id.clone(), tick);
        }
        ScriptOp::Update { node, value } => {
            forest.update_value(resolve(aliases, node)?, value.clone())?;
        }
        ScriptOp::Configure { node, config } => {
            forest.update_config(resolve(aliases, node)?, config.clone())?;
        }
        ScriptOp::Link {
            source,
            dest,
            schema,
        } => {
            let mut init = BranchInit::new(resolve(aliases, source)?, resolve(aliases, dest)?);
            init.schema = schema.clone();
            forest.add_branch_with(init)?;
        }
        ScriptOp::Unlink { source, dest } => {
            forest.remove_branch(resolve(aliases, source)?, resolve(aliases, dest)?)?;
        }
        ScriptOp::Tree { name, root, schema } => {
            let mut init = TreeInit::new(name.clone(), resolve(aliases, root)?);
            init.schema = schema.clone();
            forest.add_tree(init)?;
        }
        ScriptOp::Transaction {
            no_validation,
            label,
            ops,
        } => {
            let options = TransOptions {
                no_validation: *no_validation,
                label: label.clone(),
            };
            forest.transact_with(options, |forest| {
                for op in ops {
                    apply(forest, aliases, op)?;
                }
                Ok(())
            })?;
        }
        ScriptOp::Abort { reason } => return Err(ForestError::Aborted(reason.clone())),
    }
    Ok(())
}
