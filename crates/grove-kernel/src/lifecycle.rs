//! Record lifecycle: the state machine shared by every record kind.
//!
//! ```text
//! New ─┐
//! Active ─┼─ accept ─→ Good
//! Good ─┘     complete ─→ Complete
//!             remove   ─→ Removed
//!             fail     ─→ Error
//! ```
//!
//! `Complete`, `Removed` and `Error` are terminal. A transition requested
//! from a terminal state is ignored (and logged), so mutation code can be
//! replayed without tracking which records it already settled.

use crate::clock::Tick;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    New,
    Active,
    Good,
    Complete,
    Removed,
    Error,
}

impl LifecycleState {
    /// Whether a record in this state takes part in the live view.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            LifecycleState::New | LifecycleState::Active | LifecycleState::Good
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::New => "new",
            LifecycleState::Active => "active",
            LifecycleState::Good => "good",
            LifecycleState::Complete => "complete",
            LifecycleState::Removed => "removed",
            LifecycleState::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Complete,
    Remove,
    Fail(String),
}

impl Transition {
    pub fn target(&self) -> LifecycleState {
        match self {
            Transition::Accept => LifecycleState::Good,
            Transition::Complete => LifecycleState::Complete,
            Transition::Remove => LifecycleState::Removed,
            Transition::Fail(_) => LifecycleState::Error,
        }
    }
}

/// Lifecycle state plus the bookkeeping that goes with leaving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Tick at which the record left the active set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settled_at: Option<Tick>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::New,
            error: None,
            settled_at: None,
        }
    }

    /// A lifecycle that starts out `Active` rather than `New`.
    pub fn active() -> Self {
        Self {
            state: LifecycleState::Active,
            ..Self::new()
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Error recorded by [`Lifecycle::fail`], if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn settled_at(&self) -> Option<Tick> {
        self.settled_at
    }

    pub fn accept(&mut self) -> bool {
        self.apply(Transition::Accept, None)
    }

    pub fn complete(&mut self, at: Tick) -> bool {
        self.apply(Transition::Complete, Some(at))
    }

    pub fn remove(&mut self, at: Tick) -> bool {
        self.apply(Transition::Remove, Some(at))
    }

    pub fn fail(&mut self, error: impl Into<String>, at: Tick) -> bool {
        self.apply(Transition::Fail(error.into()), Some(at))
    }

    /// Apply `transition`, returning whether the state changed.
    ///
    /// `at` stamps `settled_at` for transitions that leave the active set.
    pub fn apply(&mut self, transition: Transition, at: Option<Tick>) -> bool {
        if !self.state.is_active() {
            debug!(
                state = %self.state,
                requested = %transition.target(),
                "ignoring lifecycle transition from terminal state"
            );
            return false;
        }

        let target = transition.target();
        if let Transition::Fail(error) = transition {
            self.error = Some(error);
        }
        if self.state == target {
            return false;
        }
        self.state = target;
        if target.is_terminal() {
            self.settled_at = at;
        }
        true
    }

    /// Set the state directly, bypassing the transition rules.
    ///
    /// Re-entering an active state clears `settled_at`.
    pub fn force(&mut self, state: LifecycleState, at: Option<Tick>) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        self.settled_at = if state.is_terminal() { at } else { None };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states_match_the_live_view() {
        assert!(LifecycleState::New.is_active());
        assert!(LifecycleState::Active.is_active());
        assert!(LifecycleState::Good.is_active());
        assert!(!LifecycleState::Complete.is_active());
        assert!(!LifecycleState::Removed.is_active());
        assert!(!LifecycleState::Error.is_active());
    }

    #[test]
    fn accept_moves_to_good() {
        let mut lc = Lifecycle::new();
        assert!(lc.accept());
        assert_eq!(lc.state(), LifecycleState::Good);
        assert!(lc.is_active());
        assert_eq!(lc.settled_at(), None);
    }

    #[test]
    fn fail_records_error_and_settles() {
        let mut lc = Lifecycle::active();
        assert!(lc.fail("bad form", Tick(7)));
        assert_eq!(lc.state(), LifecycleState::Error);
        assert_eq!(lc.error(), Some("bad form"));
        assert_eq!(lc.settled_at(), Some(Tick(7)));
    }

    #[test]
    fn terminal_states_ignore_transitions() {
        let mut lc = Lifecycle::new();
        assert!(lc.remove(Tick(3)));
        assert!(!lc.accept());
        assert!(!lc.complete(Tick(4)));
        assert!(!lc.fail("late", Tick(5)));
        assert_eq!(lc.state(), LifecycleState::Removed);
        assert_eq!(lc.error(), None);
        assert_eq!(lc.settled_at(), Some(Tick(3)));
    }

    #[test]
    fn force_can_reactivate() {
        let mut lc = Lifecycle::new();
        lc.complete(Tick(2));
        assert!(lc.force(LifecycleState::Active, None));
        assert!(lc.is_active());
        assert_eq!(lc.settled_at(), None);
    }
}
