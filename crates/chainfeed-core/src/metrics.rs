//! Observability hook.
//!
//! The engine reports every counted occurrence through a [`MetricsRecorder`].
//! The default methods do nothing, so an embedding application only
//! overrides what it exports. `chainfeed-observability` provides an
//! OpenTelemetry implementation.

use crate::commitment::CommitmentLevel;
use crate::event::EventKind;
use crate::types::Slot;

pub trait MetricsRecorder: Send + Sync {
    /// A raw event was dropped by the normalizer.
    fn malformed_event(&self, _kind: &str, _reason: &str) {}

    /// An account update lost to a newer write version in the same slot.
    fn stale_account_update(&self) {}

    /// A slot buffer was evicted before the slot finalized.
    fn slot_force_evicted(&self, _slot: Slot) {}

    /// An event held back from a band that had already moved past its slot.
    fn late_event(&self, _level: CommitmentLevel) {}

    /// A session was closed by the engine; `reason` is the close reason label.
    fn session_dropped(&self, _reason: &str) {}

    fn session_opened(&self) {}

    /// A filter update was rejected and the previous registry kept.
    fn filter_rejected(&self, _reason: &str) {}

    /// One update was enqueued for a session.
    fn update_sent(&self, _kind: EventKind) {}
}

/// Recorder that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}
