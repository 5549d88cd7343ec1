//! Orchestrator - ID ごとに UpdateTask を 1 つずつ並行起動し、全件を待つ
//!
//! # 実装詳細
//! - JoinSet に全タスクを spawn（起動は ID 順、完了順は不定）
//! - 1 つのタスクの失敗で他をキャンセルしない（collect-all）
//! - panic したタスクは JoinError → UpdateFailure::Aborted として記録

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, info, warn};

use super::update_task::{UpdateContext, UpdateTask};
use crate::config::Isolation;
use crate::domain::{BatchResult, EntryId, UpdateFailure, UpdateOutcome};
use crate::observability::update_span;

pub struct Orchestrator {
    ctx: Arc<UpdateContext>,
    isolation: Isolation,
}

impl Orchestrator {
    /// `ctx.locks` is ignored when `isolation` is `Unsynchronized`.
    pub fn new(ctx: UpdateContext, isolation: Isolation) -> Self {
        let ctx = match isolation {
            Isolation::Exclusive => ctx,
            Isolation::Unsynchronized => UpdateContext { locks: None, ..ctx },
        };
        Self {
            ctx: Arc::new(ctx),
            isolation,
        }
    }

    /// Runs one update per id concurrently and waits for every one of them.
    ///
    /// Outcomes come back in completion order. Must be called from within a
    /// tokio runtime.
    pub async fn run_batch(&self, ids: &[EntryId]) -> BatchResult {
        let started = Instant::now();
        info!(
            tasks = ids.len(),
            isolation = ?self.isolation,
            key = self.ctx.store.key(),
            "starting batch"
        );

        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::with_capacity(ids.len());
        for id in ids {
            let task = UpdateTask::new(id.clone(), Arc::clone(&self.ctx));
            let handle = tasks.spawn(task.run().instrument(update_span(id)));
            spawned.insert(handle.id(), id.clone());
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(err) => {
                    let id = spawned
                        .get(&err.id())
                        .cloned()
                        .unwrap_or_else(|| EntryId::new("unknown"));
                    warn!(%id, error = %err, "update task aborted");
                    UpdateOutcome::Failed {
                        id,
                        failed_in: None,
                        cause: UpdateFailure::Aborted(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let result = BatchResult::new(outcomes, started.elapsed());
        info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            release_errors = result.release_errors(),
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "batch finished"
        );
        result
    }
}
