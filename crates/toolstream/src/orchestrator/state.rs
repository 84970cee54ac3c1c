//! Per-invocation lifecycle tracking for one batch.
//!
//! ```text
//! Pending -> Running -> Succeeded | Failed -> Reported
//! ```
//!
//! `Reported` is terminal. The batch is `Active` until every call is `Reported`.

use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Reported,
}

impl CallState {
    fn can_advance_to(self, next: CallState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Succeeded, Self::Reported)
                | (Self::Failed, Self::Reported)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Active,
    Closed,
}

/// Lifecycle state of every call in a batch, indexed by submission position.
#[derive(Debug)]
pub struct CallTracker {
    states: Vec<CallState>,
}

impl CallTracker {
    pub fn new(len: usize) -> Self {
        Self {
            states: vec![CallState::Pending; len],
        }
    }

    pub fn state(&self, index: usize) -> Option<CallState> {
        self.states.get(index).copied()
    }

    pub fn start(&mut self, index: usize) -> bool {
        self.advance(index, CallState::Running)
    }

    pub fn finish(&mut self, index: usize, success: bool) -> bool {
        let next = if success {
            CallState::Succeeded
        } else {
            CallState::Failed
        };
        self.advance(index, next)
    }

    pub fn report(&mut self, index: usize) -> bool {
        self.advance(index, CallState::Reported)
    }

    pub fn phase(&self) -> BatchPhase {
        if self.states.iter().all(|s| *s == CallState::Reported) {
            BatchPhase::Closed
        } else {
            BatchPhase::Active
        }
    }

    /// Apply a transition. Illegal transitions are logged and ignored.
    fn advance(&mut self, index: usize, next: CallState) -> bool {
        let Some(current) = self.states.get_mut(index) else {
            error!(index, ?next, "Call index out of range");
            return false;
        };
        if !current.can_advance_to(next) {
            error!(index, from = ?*current, to = ?next, "Illegal call state transition");
            return false;
        }
        *current = next;
        true
    }
}
