//! ChainFeed metrics definitions.
//!
//! All metrics use OpenTelemetry conventions and can be exported through
//! whatever `MeterProvider` the application installs.

use chainfeed_core::{CommitmentLevel, EventKind, MetricsRecorder, Slot};
use opentelemetry::{
    metrics::{Counter, Meter},
    KeyValue,
};

/// Central metrics handle for ChainFeed.
#[derive(Clone)]
pub struct FeedMetrics {
    pub events_malformed: Counter<u64>,
    pub stale_account_updates: Counter<u64>,
    pub slots_force_evicted: Counter<u64>,
    pub late_events: Counter<u64>,
    pub sessions_opened: Counter<u64>,
    pub sessions_closed: Counter<u64>,
    pub filters_rejected: Counter<u64>,
    pub updates_sent: Counter<u64>,
}

impl FeedMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            events_malformed: meter
                .u64_counter("chainfeed.events_malformed")
                .with_description("Raw events dropped by the normalizer")
                .build(),
            stale_account_updates: meter
                .u64_counter("chainfeed.stale_account_updates")
                .with_description("Account updates superseded by a newer write version")
                .build(),
            slots_force_evicted: meter
                .u64_counter("chainfeed.slots_force_evicted")
                .with_description("Slots evicted from the commitment gate before finalizing")
                .build(),
            late_events: meter
                .u64_counter("chainfeed.late_events")
                .with_description("Events held back from a band already past their slot")
                .build(),
            sessions_opened: meter
                .u64_counter("chainfeed.sessions_opened")
                .with_description("Sessions opened")
                .build(),
            sessions_closed: meter
                .u64_counter("chainfeed.sessions_closed")
                .with_description("Sessions closed, tagged with the close reason")
                .build(),
            filters_rejected: meter
                .u64_counter("chainfeed.filters_rejected")
                .with_description("Filter updates rejected during validation")
                .build(),
            updates_sent: meter
                .u64_counter("chainfeed.updates_sent")
                .with_description("Filtered updates enqueued for sessions")
                .build(),
        }
    }
}

impl MetricsRecorder for FeedMetrics {
    fn malformed_event(&self, kind: &str, reason: &str) {
        self.events_malformed.add(
            1,
            &[
                KeyValue::new("kind", kind.to_string()),
                KeyValue::new("reason", reason.to_string()),
            ],
        );
    }

    fn stale_account_update(&self) {
        self.stale_account_updates.add(1, &[]);
    }

    fn slot_force_evicted(&self, _slot: Slot) {
        self.slots_force_evicted.add(1, &[]);
    }

    fn late_event(&self, level: CommitmentLevel) {
        self.late_events
            .add(1, &[KeyValue::new("commitment", level.to_string())]);
    }

    fn session_dropped(&self, reason: &str) {
        self.sessions_closed
            .add(1, &[KeyValue::new("reason", reason.to_string())]);
    }

    fn session_opened(&self) {
        self.sessions_opened.add(1, &[]);
    }

    fn filter_rejected(&self, reason: &str) {
        self.filters_rejected
            .add(1, &[KeyValue::new("reason", reason.to_string())]);
    }

    fn update_sent(&self, kind: EventKind) {
        self.updates_sent
            .add(1, &[KeyValue::new("kind", kind.to_string())]);
    }
}

impl std::fmt::Debug for FeedMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedMetrics").finish_non_exhaustive()
    }
}
