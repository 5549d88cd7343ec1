//! UpdateTask - 1 エントリ分の read → merge → write
//!
//! # フロー
//! 1. (Exclusive のみ) LockScope::acquire でロック取得
//! 2. DocumentStore::read で現在のドキュメント取得（なければ空）
//! 3. Document::with_entry で merge（同期・副作用なし）
//! 4. ロックがまだ有効か確認してから DocumentStore::write
//! 5. LockScope::release（失敗は記録のみ）

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::lock_scope::LockScope;
use crate::domain::{EntryId, UpdateEvent, UpdateFailure, UpdateOutcome, UpdateState};
use crate::ports::{Clock, DocumentStore, EventSink, LockManager};

/// Collaborators shared by every task of a batch.
pub struct UpdateContext {
    pub store: Arc<dyn DocumentStore>,
    /// `None` runs the critical section unsynchronized.
    pub locks: Option<Arc<dyn LockManager>>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventSink>,
    pub resources: Vec<String>,
    pub ttl: Duration,
}

pub struct UpdateTask {
    id: EntryId,
    state: UpdateState,
    ctx: Arc<UpdateContext>,
}

impl UpdateTask {
    pub fn new(id: EntryId, ctx: Arc<UpdateContext>) -> Self {
        Self {
            id,
            state: UpdateState::Pending,
            ctx,
        }
    }

    /// Drives the task to `Completed` or `Failed`.
    ///
    /// Once the lock is acquired it is released before this returns, whatever
    /// step failed.
    pub async fn run(mut self) -> UpdateOutcome {
        let scope = match self.ctx.locks.clone() {
            Some(manager) => {
                self.transition(UpdateState::Acquiring);
                let acquired = LockScope::acquire(
                    manager,
                    Arc::clone(&self.ctx.clock),
                    &self.ctx.resources,
                    self.ctx.ttl,
                )
                .await;
                match acquired {
                    Ok(scope) => {
                        trace!(
                            attempts = scope.lock().attempts(),
                            acquired_at = %scope.lock().acquired_at(),
                            "lock held"
                        );
                        Some(scope)
                    }
                    Err(err) => {
                        return self.fail(UpdateFailure::LockAcquisitionFailed(err.to_string()));
                    }
                }
            }
            None => None,
        };

        let written = self.critical_section(scope.as_ref()).await;

        let mut release_error = None;
        if let Some(scope) = scope {
            if written.is_ok() {
                self.transition(UpdateState::Releasing);
            }
            if let Err(err) = scope.release().await {
                warn!(error = %err, "lock release failed");
                release_error = Some(err.to_string());
            }
        }

        match written {
            Ok(()) => {
                self.transition(UpdateState::Completed);
                debug!("update completed");
                UpdateOutcome::Completed {
                    id: self.id,
                    release_error,
                }
            }
            Err(cause) => self.fail(cause),
        }
    }

    async fn critical_section(&mut self, scope: Option<&LockScope>) -> Result<(), UpdateFailure> {
        self.transition(UpdateState::Reading);
        self.ctx.events.emit(UpdateEvent::SectionEntered {
            id: self.id.clone(),
            at: self.ctx.clock.now(),
        });

        let result = self.read_merge_write(scope).await;

        self.ctx.events.emit(UpdateEvent::SectionExited {
            id: self.id.clone(),
            at: self.ctx.clock.now(),
        });
        result
    }

    async fn read_merge_write(&mut self, scope: Option<&LockScope>) -> Result<(), UpdateFailure> {
        let current = self.ctx.store.read().await?;

        // absent means nothing merged yet, not an error
        self.transition(UpdateState::Merging);
        let merged = current.unwrap_or_default().with_entry(&self.id);

        self.transition(UpdateState::Writing);
        if let Some(scope) = scope
            && !scope.is_valid()
        {
            return Err(UpdateFailure::LockExpired(format!(
                "{} expired at {}",
                scope.lock().token(),
                scope.valid_until()
            )));
        }

        trace!(entries = merged.len(), "setting value");
        self.ctx.store.write(&merged).await?;
        Ok(())
    }

    fn transition(&mut self, next: UpdateState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    fn fail(mut self, cause: UpdateFailure) -> UpdateOutcome {
        let failed_in = self.state;
        warn!(state = ?failed_in, error = %cause, "update failed");
        self.ctx.events.emit(UpdateEvent::Failed {
            id: self.id.clone(),
            state: failed_in,
            at: self.ctx.clock.now(),
        });
        self.transition(UpdateState::Failed);

        UpdateOutcome::Failed {
            id: self.id,
            failed_in: Some(failed_in),
            cause,
        }
    }
}
