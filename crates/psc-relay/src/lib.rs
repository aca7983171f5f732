//! Buffer between the external broadcast ingester and the web-layer
//! poller. Messages are delivered to whichever poller drains next, exactly
//! once: a push racing a drain lands in either that drain or the next one,
//! never both, never neither.

use chrono::{DateTime, Utc};
use psc_core::BroadcastMessage;
use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub mod ingest;

/// Handle to the shared pending-message queue. Cheap to clone; hand one
/// clone to the ingester and one to the poller instead of sharing a
/// process-wide global.
#[derive(Clone, Default)]
pub struct MessageRelay {
    pending: Arc<Mutex<VecDeque<BroadcastMessage>>>,
}

impl MessageRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: impl Into<String>) {
        self.push_at(Utc::now(), text);
    }

    pub fn push_at(&self, received_at: DateTime<Utc>, text: impl Into<String>) {
        let mut pending = self.lock_pending();
        pending.push_back(BroadcastMessage {
            received_at,
            text: text.into(),
        });
        debug!(event = "relay_push", pending = pending.len());
    }

    /// Atomically removes and returns every pending message, oldest first.
    /// The swap happens under the queue lock, so a concurrent push either
    /// makes this drain or stays queued for the next one.
    pub fn drain(&self) -> Vec<BroadcastMessage> {
        let drained = mem::take(&mut *self.lock_pending());
        if !drained.is_empty() {
            debug!(event = "relay_drain", delivered = drained.len());
        }
        drained.into()
    }

    pub fn pending(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<BroadcastMessage>> {
        // push_back and take are panic-atomic; a poisoned lock still holds
        // a consistent queue
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
