//! The record contract every collection entry satisfies.

use crate::clock::{Clock, Tick};
use crate::error::CollectionError;
use crate::lifecycle::Lifecycle;

/// Any entity carrying `{tick, lifecycle}`.
///
/// `build` is the pluggable factory a [`Collection`](crate::Collection) calls
/// on `add`. Implementations validate `init` first and only then draw their
/// tick from `clock`, so a rejected construction never consumes a tick.
pub trait Record: Sized {
    /// Data required to construct the record.
    type Init;

    /// Construction error; must absorb collection-level failures.
    type Error: From<CollectionError>;

    fn build(clock: &Clock, init: Self::Init) -> Result<Self, Self::Error>;

    fn tick(&self) -> Tick;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    fn is_active(&self) -> bool {
        self.lifecycle().is_active()
    }
}
