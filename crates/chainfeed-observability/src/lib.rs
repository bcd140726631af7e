//! # chainfeed-observability
//!
//! OpenTelemetry-based observability for ChainFeed.
//!
//! ## Built-in metrics
//! - `chainfeed.events_malformed`: counter, tagged with kind + reason
//! - `chainfeed.stale_account_updates`: counter
//! - `chainfeed.slots_force_evicted`: counter
//! - `chainfeed.late_events`: counter, tagged with commitment
//! - `chainfeed.sessions_opened`: counter
//! - `chainfeed.sessions_closed`: counter, tagged with reason
//! - `chainfeed.filters_rejected`: counter, tagged with reason
//! - `chainfeed.updates_sent`: counter, tagged with kind
//!
//! Sessions dropped for backpressure are `chainfeed.sessions_closed` with
//! `reason = "resource_exhausted"`.
//!
//! ## Structured logging
//! JSON-structured or human-readable logs with per-component levels.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::FeedMetrics;
pub use tracing_setup::{init_tracing, LogConfig};
