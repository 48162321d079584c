//! Transaction markers.

use crate::error::ForestError;
use grove_kernel::{Clock, Lifecycle, Record, Tick};

#[derive(Debug, Clone, Default)]
pub struct TransOptions {
    /// Suppress the validation cascade until the outermost suppressing
    /// transaction finishes, then validate everything it touched once.
    pub no_validation: bool,
    pub label: Option<String>,
}

impl TransOptions {
    pub fn unvalidated() -> Self {
        Self {
            no_validation: true,
            label: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A transaction record. Its tick is the start tick; it stays active while
/// the transaction is pending.
#[derive(Debug, Clone)]
pub struct Trans {
    tick: Tick,
    lifecycle: Lifecycle,
    no_validation: bool,
    label: Option<String>,
}

impl Trans {
    pub fn start(&self) -> Tick {
        self.tick
    }

    /// Tick at which the transaction completed or failed.
    pub fn end(&self) -> Option<Tick> {
        self.lifecycle.settled_at()
    }

    pub fn error(&self) -> Option<&str> {
        self.lifecycle.error()
    }

    pub fn no_validation(&self) -> bool {
        self.no_validation
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Record for Trans {
    type Init = TransOptions;
    type Error = ForestError;

    fn build(clock: &Clock, options: TransOptions) -> Result<Self, ForestError> {
        Ok(Self {
            tick: clock.next(),
            lifecycle: Lifecycle::active(),
            no_validation: options.no_validation,
            label: options.label,
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
