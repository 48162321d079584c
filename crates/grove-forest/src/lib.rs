//! # grove-forest
//!
//! The graph model over the Grove kernel.
//!
//! A [`Forest`] owns six collections on one clock:
//!
//! ```text
//! nodes           ← vertices; immutable once created
//! value_changes   ← latest active one is the node's base value
//! config_changes  ← latest active one is the node's config
//! branches        ← append-only edges; `del` records retract a pair
//! transactions    ← pending/complete/failed batches
//! trees           ← named roots, optionally with a schema
//! ```
//!
//! Everything else is derived: live children and parents fold the branch
//! log, net values fold a node's base value with its live children's net
//! values, and validation runs those values through config rules and
//! schemas. Derived views are memoized per node and invalidated through the
//! collections' listeners.
//!
//! ```
//! use grove_forest::{Forest, NodeInit, Value};
//!
//! let mut forest = Forest::new();
//! let root = forest
//!     .add_node(NodeInit::new(Value::map([("alpha", 1)])))
//!     .expect("root");
//! let beta = forest
//!     .add_child(root, NodeInit::new(2).named("beta"))
//!     .expect("child");
//! forest.update_value(beta, 40).expect("update");
//! assert_eq!(
//!     forest.value(root),
//!     Some(Value::map([("alpha", 1), ("beta", 40)]))
//! );
//! ```

pub mod branch;
pub mod change;
pub mod config;
pub mod error;
pub mod forest;
pub mod node;
pub mod schema;
pub mod script;
pub mod stream;
mod transact;
pub mod trans;
pub mod tree;
mod validate;
pub mod value;

pub use branch::{Branch, BranchInit, live_fold};
pub use change::{ConfigChangeInit, NodeConfigChange, NodeValueChange, ValueChangeInit};
pub use config::{ForestConfig, ValidationConfig};
pub use error::{ConfigError, ConstructionError, ForestError, ValidationError, ValidationKind};
pub use forest::Forest;
pub use node::{FormRule, Node, NodeConfig, NodeInit, TypeRule};
pub use schema::{Check, Schema};
pub use script::{
    Failure, ReplayReport, Script, ScriptError, ScriptLine, ScriptOp, read_script,
    read_script_from_path, replay,
};
pub use stream::ValueStream;
pub use trans::{Trans, TransOptions};
pub use tree::{Tree, TreeInit};
pub use value::{Form, Key, TypeTag, Value, ValueFn, detect_form, detect_type};

pub use grove_kernel::{Tick, Watch};
