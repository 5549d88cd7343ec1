use thiserror::Error;

use crate::app::BuildError;
use crate::domain::{LockError, StoreError};

/// Top-level error for callers driving a whole batch (the CLI, integration
/// tests). Task-level failures never surface here; they live in
/// [`crate::domain::UpdateOutcome`].
#[derive(Debug, Error)]
pub enum LockstepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("invariant violated: expected {expected} entries, found {actual}")]
    InvariantViolation { expected: usize, actual: usize },
}

impl LockstepError {
    /// Whether this is the batch-level correctness failure (lost updates or a
    /// merge bug) rather than an operational error.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, LockstepError::InvariantViolation { .. })
    }
}
