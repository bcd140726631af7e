//! Engine counters.
//!
//! Every counted occurrence increments a local atomic (readable through
//! [`EngineMetrics::snapshot`]) and is forwarded to the configured
//! [`MetricsRecorder`].

use chainfeed_core::{CommitmentLevel, EventKind, MetricsRecorder, NoopRecorder, Slot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub events_received: u64,
    pub events_malformed: u64,
    pub startup_accounts_skipped: u64,
    pub stale_account_updates: u64,
    pub slots_force_evicted: u64,
    pub late_events: u64,
    pub sessions_opened: u64,
    pub sessions_dropped_backpressure: u64,
    pub sessions_closed: u64,
    pub filters_rejected: u64,
    pub updates_sent: u64,
    pub reconnections: u64,
}

pub struct EngineMetrics {
    events_received: AtomicU64,
    events_malformed: AtomicU64,
    startup_accounts_skipped: AtomicU64,
    stale_account_updates: AtomicU64,
    slots_force_evicted: AtomicU64,
    late_events: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_dropped_backpressure: AtomicU64,
    sessions_closed: AtomicU64,
    filters_rejected: AtomicU64,
    updates_sent: AtomicU64,
    reconnections: AtomicU64,
    recorder: Arc<dyn MetricsRecorder>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new(Arc::new(NoopRecorder))
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EngineMetrics").field(&self.snapshot()).finish()
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineMetrics {
    pub fn new(recorder: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_malformed: AtomicU64::new(0),
            startup_accounts_skipped: AtomicU64::new(0),
            stale_account_updates: AtomicU64::new(0),
            slots_force_evicted: AtomicU64::new(0),
            late_events: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            sessions_dropped_backpressure: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            filters_rejected: AtomicU64::new(0),
            updates_sent: AtomicU64::new(0),
            reconnections: AtomicU64::new(0),
            recorder,
        }
    }

    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EngineMetricsSnapshot {
            events_received: load(&self.events_received),
            events_malformed: load(&self.events_malformed),
            startup_accounts_skipped: load(&self.startup_accounts_skipped),
            stale_account_updates: load(&self.stale_account_updates),
            slots_force_evicted: load(&self.slots_force_evicted),
            late_events: load(&self.late_events),
            sessions_opened: load(&self.sessions_opened),
            sessions_dropped_backpressure: load(&self.sessions_dropped_backpressure),
            sessions_closed: load(&self.sessions_closed),
            filters_rejected: load(&self.filters_rejected),
            updates_sent: load(&self.updates_sent),
            reconnections: load(&self.reconnections),
        }
    }

    pub(crate) fn event_received(&self) {
        bump(&self.events_received);
    }

    pub(crate) fn malformed_event(&self, kind: &str, reason: &str) {
        bump(&self.events_malformed);
        self.recorder.malformed_event(kind, reason);
    }

    pub(crate) fn startup_account_skipped(&self) {
        bump(&self.startup_accounts_skipped);
    }

    pub(crate) fn stale_account_updates(&self, count: u64) {
        self.stale_account_updates.fetch_add(count, Ordering::Relaxed);
        for _ in 0..count {
            self.recorder.stale_account_update();
        }
    }

    pub(crate) fn slot_force_evicted(&self, slot: Slot) {
        bump(&self.slots_force_evicted);
        self.recorder.slot_force_evicted(slot);
    }

    pub(crate) fn late_event(&self, level: CommitmentLevel) {
        bump(&self.late_events);
        self.recorder.late_event(level);
    }

    pub(crate) fn session_opened(&self) {
        bump(&self.sessions_opened);
        self.recorder.session_opened();
    }

    pub(crate) fn session_dropped_backpressure(&self) {
        bump(&self.sessions_dropped_backpressure);
        self.recorder.session_dropped("resource_exhausted");
    }

    pub(crate) fn session_closed(&self, reason: &str) {
        bump(&self.sessions_closed);
        self.recorder.session_dropped(reason);
    }

    pub(crate) fn filter_rejected(&self, reason: &str) {
        bump(&self.filters_rejected);
        self.recorder.filter_rejected(reason);
    }

    pub(crate) fn update_sent(&self, kind: Option<EventKind>) {
        bump(&self.updates_sent);
        if let Some(kind) = kind {
            self.recorder.update_sent(kind);
        }
    }

    pub(crate) fn reconnection(&self) {
        bump(&self.reconnections);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        evicted: Mutex<Vec<Slot>>,
        malformed: Mutex<Vec<String>>,
    }

    impl MetricsRecorder for Recording {
        fn slot_force_evicted(&self, slot: Slot) {
            self.evicted.lock().push(slot);
        }

        fn malformed_event(&self, kind: &str, reason: &str) {
            self.malformed.lock().push(format!("{kind}:{reason}"));
        }
    }

    #[test]
    fn counters_forward_to_recorder() {
        let recorder = Arc::new(Recording::default());
        let metrics = EngineMetrics::new(recorder.clone());
        metrics.slot_force_evicted(42);
        metrics.malformed_event("account", "bad_key");
        metrics.malformed_event("slot", "unknown_status");

        let snap = metrics.snapshot();
        assert_eq!(snap.slots_force_evicted, 1);
        assert_eq!(snap.events_malformed, 2);
        assert_eq!(*recorder.evicted.lock(), vec![42]);
        assert_eq!(recorder.malformed.lock().len(), 2);
    }
}
