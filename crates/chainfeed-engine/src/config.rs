//! Engine configuration.

use chainfeed_filter::FilterLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-session output queue capacity (matched updates, not keepalives)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long the dispatcher may wait for room in a full queue before the
    /// session is dropped. 0 = drop immediately.
    #[serde(default)]
    pub send_grace_ms: u64,
    /// Server-initiated keepalive ping interval. 0 = disabled.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Unfinalized slots this far behind the newest slot are force-evicted
    #[serde(default = "default_max_slot_lag")]
    pub max_slot_lag: u64,
    /// Unfinalized slots older than this are force-evicted
    #[serde(default = "default_max_slot_age_ms")]
    pub max_slot_age_ms: u64,
    /// Emit a synthetic dead status for force-evicted slots
    #[serde(default = "bool_true")]
    pub emit_synthetic_dead: bool,
    /// Deliver account updates replayed from the startup snapshot
    #[serde(default)]
    pub include_startup_accounts: bool,
    /// Session count at which matching moves to the rayon pool
    #[serde(default = "default_parallel_match_threshold")]
    pub parallel_match_threshold: usize,
    /// Recent blocks kept for blockhash lookups
    #[serde(default = "default_blockhash_retention")]
    pub blockhash_retention: usize,
    /// Initial source reconnect backoff in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Give up on a source after this many consecutive failures. 0 = never.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub limits: FilterLimits,
}

fn default_queue_capacity() -> usize { 100_000 }
fn default_ping_interval_ms() -> u64 { 15_000 }
fn default_max_slot_lag() -> u64 { 300 }
fn default_max_slot_age_ms() -> u64 { 120_000 }
fn default_parallel_match_threshold() -> usize { 256 }
fn default_blockhash_retention() -> usize { 300 }
fn default_backoff_ms() -> u64 { 500 }
fn bool_true() -> bool { true }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            send_grace_ms: 0,
            ping_interval_ms: default_ping_interval_ms(),
            max_slot_lag: default_max_slot_lag(),
            max_slot_age_ms: default_max_slot_age_ms(),
            emit_synthetic_dead: true,
            include_startup_accounts: false,
            parallel_match_threshold: default_parallel_match_threshold(),
            blockhash_retention: default_blockhash_retention(),
            backoff_ms: default_backoff_ms(),
            max_retries: 0,
            limits: FilterLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn send_grace(&self) -> Duration {
        Duration::from_millis(self.send_grace_ms)
    }

    /// `None` when keepalive pings are disabled.
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_ms > 0).then(|| Duration::from_millis(self.ping_interval_ms))
    }

    pub fn max_slot_age(&self) -> Duration {
        Duration::from_millis(self.max_slot_age_ms)
    }

    /// Backoff before reconnect attempt `retry` (1-based), doubling up to 64x.
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(1 << retry.min(6)))
    }
}
