//! RecordingEventSink - イベントを順序付きで記録する EventSink
//!
//! 排他のテスト用。記録順（sequence）で区間の重なりを判定する。
//! タイムスタンプは同一時刻になり得るので判定には使わない。

use std::sync::Mutex;

use crate::domain::{EntryId, UpdateEvent};
use crate::ports::EventSink;

#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<UpdateEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in the order they were emitted.
    pub fn events(&self) -> Vec<UpdateEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sections_entered(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UpdateEvent::SectionEntered { .. }))
            .count()
    }

    /// Pairs `(open, entering)` where `entering` started its critical section
    /// while `open` had not left its own.
    ///
    /// Open sections are kept one per enter event, so two tasks carrying the
    /// same id stay tracked separately. An exit closes one open section with
    /// that id.
    pub fn overlapping_sections(&self) -> Vec<(EntryId, EntryId)> {
        let mut open: Vec<EntryId> = Vec::new();
        let mut overlaps = Vec::new();

        for event in self.events() {
            match &event {
                UpdateEvent::SectionEntered { .. } => {
                    let id = event.id();
                    overlaps.extend(open.iter().map(|held| (held.clone(), id.clone())));
                    open.push(id.clone());
                }
                UpdateEvent::SectionExited { .. } => {
                    if let Some(pos) = open.iter().position(|held| held == event.id()) {
                        open.remove(pos);
                    }
                }
                UpdateEvent::Failed { .. } => {}
            }
        }
        overlaps
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: UpdateEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entered(id: u64) -> UpdateEvent {
        UpdateEvent::SectionEntered {
            id: EntryId::from(id),
            at: Utc::now(),
        }
    }

    fn exited(id: u64) -> UpdateEvent {
        UpdateEvent::SectionExited {
            id: EntryId::from(id),
            at: Utc::now(),
        }
    }

    #[test]
    fn serial_sections_do_not_overlap() {
        let sink = RecordingEventSink::new();
        for id in [1, 2, 3] {
            sink.emit(entered(id));
            sink.emit(exited(id));
        }
        assert_eq!(sink.sections_entered(), 3);
        assert!(sink.overlapping_sections().is_empty());
    }

    #[test]
    fn interleaved_sections_are_reported() {
        let sink = RecordingEventSink::new();
        sink.emit(entered(1));
        sink.emit(entered(2));
        sink.emit(exited(1));
        sink.emit(exited(2));

        assert_eq!(
            sink.overlapping_sections(),
            vec![(EntryId::from(1), EntryId::from(2))]
        );
    }

    #[test]
    fn duplicate_ids_are_tracked_per_section() {
        let sink = RecordingEventSink::new();
        sink.emit(entered(1));
        sink.emit(entered(1));
        sink.emit(exited(1));
        // the second section for id 1 is still open
        sink.emit(entered(2));
        sink.emit(exited(1));
        sink.emit(exited(2));

        assert_eq!(
            sink.overlapping_sections(),
            vec![
                (EntryId::from(1), EntryId::from(1)),
                (EntryId::from(1), EntryId::from(2)),
            ]
        );
    }
}
