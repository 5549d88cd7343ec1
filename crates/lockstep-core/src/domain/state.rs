//! Update task state machine.

use serde::{Deserialize, Serialize};

/// State of one update task.
///
/// Transitions:
/// - Pending -> Acquiring -> Reading -> Merging -> Writing -> Releasing -> Completed
/// - Pending -> Reading -> ... when the batch runs unsynchronized
/// - any non-terminal state -> Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Pending,
    Acquiring,
    Reading,
    Merging,
    Writing,
    Releasing,
    Completed,
    Failed,
}

impl UpdateState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UpdateState::Completed | UpdateState::Failed)
    }

    /// Is `next` a legal successor of `self`?
    pub fn can_transition_to(self, next: UpdateState) -> bool {
        use UpdateState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) => true,
            (Pending, Acquiring) | (Pending, Reading) => true,
            (Acquiring, Reading) => true,
            (Reading, Merging) => true,
            (Merging, Writing) => true,
            (Writing, Releasing) | (Writing, Completed) => true,
            (Releasing, Completed) => true,
            _ => false,
        }
    }
}
