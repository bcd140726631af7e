//! # chainfeed-engine
//!
//! Commitment-gated multiplexing engine for ChainFeed.
//!
//! Pulls raw ledger events from one or more upstream sources, normalizes
//! them, holds each slot's events until the slot reaches the commitment a
//! session asked for, matches released events against every live session's
//! filters and enqueues the results on bounded per-session queues.
//!
//! ## Architecture
//! ```text
//! LedgerSource (per upstream, Tokio task)
//!       │
//!       ▼
//! Normalizer (RawLedgerEvent → LedgerEvent, malformed dropped + counted)
//!       │
//!       ├──────────────► LedgerState (point lookups)
//!       ▼
//! CommitmentGate (slot → buffered events, one band per commitment level)
//!       │
//!       ▼
//! Dispatcher (Filter::get_updates per session, rayon above threshold)
//!       │
//!       ▼
//! session queue (bounded; full ⇒ session closed ResourceExhausted)
//!       │
//!       ▼
//! SessionHandle::recv   ← keepalive pings / pongs on a separate lane
//! ```

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gate;
pub mod keepalive;
pub mod metrics;
pub mod normalizer;
pub mod queue;
pub mod session;
pub mod source;
pub mod state;

pub use config::EngineConfig;
pub use dispatcher::Dispatcher;
pub use engine::FeedEngine;
pub use error::{EngineError, SessionError};
pub use gate::{CommitmentGate, GateConfig, GateOutput};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use normalizer::Normalizer;
pub use queue::{session_queue, CloseReason, QueueReceiver, QueueSender};
pub use session::{Session, SessionHandle, SessionId, SessionRegistry};
pub use source::{JsonLinesSource, LedgerSource, RawEventStream};
pub use state::{BlockInfo, BlockhashValidity, LedgerState, VersionInfo};
