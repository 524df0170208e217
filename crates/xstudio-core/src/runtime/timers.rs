//! One live tokio timer per `TimerKind`.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::StudioEventSender;
use crate::session::{StudioEvent, TimerKind};

#[derive(Debug, Default)]
pub(super) struct TimerSet {
    handles: HashMap<TimerKind, JoinHandle<()>>,
}

impl TimerSet {
    /// Starts a timer that reports `TimerFired` after `delay`.
    /// A live timer of the same kind is aborted first.
    pub(super) fn arm(
        &mut self,
        kind: TimerKind,
        generation: u64,
        delay: Duration,
        tx: &StudioEventSender,
    ) {
        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(StudioEvent::TimerFired { kind, generation });
        });
        if let Some(previous) = self.handles.insert(kind, handle) {
            previous.abort();
        }
    }

    pub(super) fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.handles.remove(&kind) {
            handle.abort();
        }
    }

    pub(super) fn is_live(&self, kind: TimerKind) -> bool {
        self.handles.get(&kind).is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}
