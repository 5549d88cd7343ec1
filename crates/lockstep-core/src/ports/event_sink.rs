//! EventSink port - イベント記録の抽象化
//!
//! `emit` は同期関数。クリティカルセクション内で呼ばれるので、
//! 新しいサスペンドポイントを作ってはいけない。

use crate::domain::UpdateEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: UpdateEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: UpdateEvent) {}
}
