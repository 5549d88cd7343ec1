//! Verifier - バッチ後のドキュメントを読み、エントリ数を期待値と比べる

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info};

use crate::domain::{Document, EntryId, StoreError};
use crate::error::LockstepError;
use crate::ports::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Pass(usize),
    Fail { expected: usize, actual: usize },
}

impl Verification {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verification::Pass(_))
    }

    /// `Fail` becomes `LockstepError::InvariantViolation`.
    pub fn into_result(self) -> Result<usize, LockstepError> {
        match self {
            Verification::Pass(count) => Ok(count),
            Verification::Fail { expected, actual } => {
                Err(LockstepError::InvariantViolation { expected, actual })
            }
        }
    }
}

/// Number of distinct entries a lossless run ends with.
pub fn expected_count(seed: &Document, ids: &[EntryId]) -> usize {
    seed.data
        .keys()
        .chain(ids)
        .collect::<BTreeSet<_>>()
        .len()
}

pub struct Verifier {
    store: Arc<dyn DocumentStore>,
}

impl Verifier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Reads the document without modifying it. Absent reads as empty.
    pub async fn final_document(&self) -> Result<Document, StoreError> {
        Ok(self.store.read().await?.unwrap_or_default())
    }

    pub async fn verify(&self, expected: usize) -> Result<Verification, StoreError> {
        let actual = self.final_document().await?.len();
        if actual == expected {
            info!(count = actual, "verification passed");
            Ok(Verification::Pass(actual))
        } else {
            error!(expected, actual, lost = expected.saturating_sub(actual), "lost updates detected");
            Ok(Verification::Fail { expected, actual })
        }
    }
}
