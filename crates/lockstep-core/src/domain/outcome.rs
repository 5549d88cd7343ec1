//! Outcome model: the result of one update task, and of a whole batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::StoreError;
use super::ids::EntryId;
use super::state::UpdateState;

/// Why an update task did not get its entry into the document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum UpdateFailure {
    /// Exclusion could not be obtained within the configured attempts.
    #[error("lock acquisition failed: {0}")]
    LockAcquisitionFailed(String),

    /// get/set could not complete.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The stored bytes are not a document; nothing was written.
    #[error("corrupt document: {0}")]
    CorruptDocument(String),

    /// The lock ran out before the write; the write was skipped.
    #[error("lock expired before write: {0}")]
    LockExpired(String),

    /// The task panicked or was cancelled.
    #[error("task aborted: {0}")]
    Aborted(String),
}

impl From<StoreError> for UpdateFailure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => UpdateFailure::StoreUnavailable(reason),
            corrupt @ StoreError::Corrupt { .. } => {
                UpdateFailure::CorruptDocument(corrupt.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The entry was written. A failed release is kept for reporting only.
    Completed {
        id: EntryId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        release_error: Option<String>,
    },

    Failed {
        id: EntryId,
        /// State the task was in when it failed; `None` if it never reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failed_in: Option<UpdateState>,
        cause: UpdateFailure,
    },
}

impl UpdateOutcome {
    pub fn id(&self) -> &EntryId {
        match self {
            UpdateOutcome::Completed { id, .. } | UpdateOutcome::Failed { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Completed { .. })
    }

    pub fn failure(&self) -> Option<&UpdateFailure> {
        match self {
            UpdateOutcome::Failed { cause, .. } => Some(cause),
            UpdateOutcome::Completed { .. } => None,
        }
    }

    pub fn release_error(&self) -> Option<&str> {
        match self {
            UpdateOutcome::Completed { release_error, .. } => release_error.as_deref(),
            UpdateOutcome::Failed { .. } => None,
        }
    }
}

/// Every outcome of a batch, in completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub outcomes: Vec<UpdateOutcome>,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn new(outcomes: Vec<UpdateOutcome>, elapsed: Duration) -> Self {
        Self { outcomes, elapsed }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn release_errors(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.release_error().is_some())
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&EntryId, &UpdateFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.failure().map(|cause| (o.id(), cause)))
    }
}
