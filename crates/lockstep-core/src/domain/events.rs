//! Events - update task のイベント
//!
//! クリティカルセクションの開始・終了を記録し、排他が守られたかを検証するために使う。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::EntryId;
use super::state::UpdateState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// Entered Reading; the critical section starts.
    SectionEntered { id: EntryId, at: DateTime<Utc> },

    /// Left the critical section (after Writing, or on a failure inside it).
    SectionExited { id: EntryId, at: DateTime<Utc> },

    Failed {
        id: EntryId,
        state: UpdateState,
        at: DateTime<Utc>,
    },
}

impl UpdateEvent {
    pub fn id(&self) -> &EntryId {
        match self {
            UpdateEvent::SectionEntered { id, .. }
            | UpdateEvent::SectionExited { id, .. }
            | UpdateEvent::Failed { id, .. } => id,
        }
    }
}
