//! # Grove Kernel
//!
//! The storage doctrine of a versioned graph: every record is stamped with a
//! tick from a single logical clock, never mutated except through its
//! collection, and only ever leaves the active view through a one-way
//! lifecycle transition.
//!
//! This crate is **domain-agnostic**: it does not know about nodes or
//! branches. It only prescribes how records are created, indexed, observed
//! and cached.
//!
//! ## Architecture
//!
//! ```text
//! Clock                 ← monotonic tick source, shared by handle
//!     │
//! Lifecycle             ← New/Active/Good → Complete | Removed | Error
//!     │
//! Record                ← {tick, lifecycle} + pluggable constructor
//!     │
//! Collection<R>         ← tick-ordered store, observer list
//!     │
//! CollectionIndex<R>    ← reactive key → tick(s), updated before listeners
//!     │
//! Memo<C, T>            ← value cached per tick, invalidated by watched events
//! ```

pub mod clock;
pub mod collection;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod memo;
pub mod record;

pub use clock::{Clock, Tick};
pub use collection::{ChangeEvent, ChangeKind, Collection, ListenerId, ListenerStatus};
pub use error::CollectionError;
pub use index::{CollectionIndex, IndexKey, IndexMode};
pub use lifecycle::{Lifecycle, LifecycleState, Transition};
pub use memo::{Expiry, Memo, MemoBuilder, Watch};
pub use record::Record;
