//! Error types for forest operations.

use crate::value::{Form, TypeTag};
use grove_kernel::{CollectionError, Tick};

/// Structural errors raised while constructing a record. The record is
/// never created and no tick is consumed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    #[error("branch from {node} to itself")]
    CircularBranch { node: Tick },

    #[error("branch endpoint {endpoint} is not a node")]
    MissingEndpoint { endpoint: Tick },
}

/// What a node's value failed to satisfy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationKind {
    #[error("value is not the correct form (expected {expected}, found {found})")]
    Form { expected: Form, found: Form },

    #[error("value is not the correct type (expected {expected}, found {found})")]
    Type { expected: TypeTag, found: TypeTag },

    #[error("test `{check}` failed: {message}")]
    Test { check: String, message: String },

    /// A schema carried by the branch or tree record at `origin`.
    #[error("schema of {origin} failed: {message}")]
    Schema { origin: Tick, message: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("node {node}: {kind}")]
pub struct ValidationError {
    pub node: Tick,
    pub kind: ValidationKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transaction {trans} rolled back: {source}")]
    TransactionFailed {
        trans: Tick,
        source: Box<ForestError>,
    },

    #[error("unknown node {0}")]
    UnknownNode(Tick),

    #[error("node {0} is no longer active")]
    InactiveNode(Tick),

    /// Raised by caller code inside a transaction body.
    #[error("aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

impl ForestError {
    /// The innermost error, looking through transaction wrappers.
    pub fn root_cause(&self) -> &ForestError {
        match self {
            ForestError::TransactionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root_cause(), ForestError::Validation(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
