//! Engine-level errors.

use chainfeed_core::SourceError;
use chainfeed_filter::FilterError;
use thiserror::Error;

use crate::queue::CloseReason;

/// Errors surfaced to a session's client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The filter update was rejected; the previous filters stay active.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("session closed: {0}")]
    Closed(CloseReason),
}

impl SessionError {
    /// Returns `true` if the session can no longer be used.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Returns `true` if the session was dropped because its client fell behind.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::Closed(CloseReason::ResourceExhausted))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("source '{source_name}' gave up after {retries} attempts")]
    RetriesExhausted { source_name: String, retries: u32 },

    #[error("engine is shutting down")]
    ShuttingDown,
}

impl EngineError {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }
}
