//! Error types for kernel operations.

use crate::clock::Tick;

/// Errors raised by a [`Collection`](crate::Collection).
///
/// Index lookups never fail: querying an unregistered index yields an empty
/// result instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// Two records were stamped with the same tick.
    #[error("tick collision in collection `{collection}` at {tick}")]
    TickCollision { collection: String, tick: Tick },
}
