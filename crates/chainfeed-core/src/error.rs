//! Error types shared across the ChainFeed pipeline.

use thiserror::Error;

use crate::types::Slot;

/// Failure to parse a base58 key, signature or hash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("invalid base58 {kind}: {reason}")]
    InvalidBase58 { kind: &'static str, reason: String },

    #[error("invalid {kind} length: expected {expected} bytes, got {got}")]
    WrongLength {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
}

/// A raw event that cannot be normalized. Always dropped and counted,
/// never propagated past the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("malformed {kind} at slot {slot}: field `{field}`: {source}")]
    BadKey {
        kind: &'static str,
        slot: Slot,
        field: &'static str,
        #[source]
        source: KeyParseError,
    },

    #[error("malformed {kind} at slot {slot}: field `{field}` is not valid hex")]
    BadHex {
        kind: &'static str,
        slot: Slot,
        field: &'static str,
    },

    #[error("unknown slot status code {code} for slot {slot}")]
    UnknownStatus { slot: Slot, code: u8 },

    #[error("transaction at slot {slot} carries no signature")]
    MissingSignature { slot: Slot },
}

impl NormalizeError {
    /// Short reason label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadKey { .. } => "bad_key",
            Self::BadHex { .. } => "bad_hex",
            Self::UnknownStatus { .. } => "unknown_status",
            Self::MissingSignature { .. } => "missing_signature",
        }
    }
}

/// Errors from an upstream ledger event source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source connection failed: {source_name}: {reason}")]
    ConnectionFailed { source_name: String, reason: String },

    #[error("source stream closed")]
    Closed,

    #[error("undecodable source record at line {line}: {reason}")]
    Decode { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Returns `true` if the source should be re-subscribed after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Closed | Self::Io(_))
    }
}
