//! Filter validation errors.
//!
//! Every variant is raised synchronously while compiling a
//! [`SubscribeRequest`](crate::SubscribeRequest); the session keeps its
//! previous registry when compilation fails.

use chainfeed_core::KeyParseError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter name must not be empty ({kind})")]
    EmptyName { kind: &'static str },

    #[error("too many {kind} filters: max {max}")]
    TooManyFilters { kind: &'static str, max: usize },

    #[error("filter '{filter}': too many entries in `{field}`: max {max}")]
    TooManyPubkeys {
        filter: String,
        field: &'static str,
        max: usize,
    },

    #[error("filter '{filter}': invalid pubkey in `{field}`: {source}")]
    InvalidPubkey {
        filter: String,
        field: &'static str,
        #[source]
        source: KeyParseError,
    },

    #[error("filter '{filter}': invalid signature: {source}")]
    InvalidSignature {
        filter: String,
        #[source]
        source: KeyParseError,
    },

    #[error("filter '{filter}': pubkey {pubkey} is not allowed in `{field}`")]
    RejectedPubkey {
        filter: String,
        field: &'static str,
        pubkey: String,
    },

    #[error("filter '{filter}': pubkey {pubkey} is both included and excluded")]
    ConflictingAccountLists { filter: String, pubkey: String },

    #[error("filter '{filter}': `{sub}` may be used only once")]
    DuplicateSubFilter { filter: String, sub: &'static str },

    #[error("filter '{filter}': too many sub-filters: max {max}")]
    TooManySubFilters { filter: String, max: usize },

    #[error("filter '{filter}': memcmp data must not be empty")]
    EmptyMemcmp { filter: String },

    #[error("filter '{filter}': memcmp data is {len} bytes, max {max}")]
    MemcmpTooLarge {
        filter: String,
        len: usize,
        max: usize,
    },

    #[error("filter '{filter}': memcmp data is not valid base58: {reason}")]
    InvalidMemcmpBase58 { filter: String, reason: String },

    #[error("too many data slices: max {max}")]
    TooManyDataSlices { max: usize },

    #[error("data slice {index} overlaps or precedes the previous slice")]
    DataSliceOverlap { index: usize },
}

impl FilterError {
    /// Short reason label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyName { .. } => "empty_name",
            Self::TooManyFilters { .. } => "too_many_filters",
            Self::TooManyPubkeys { .. } => "too_many_pubkeys",
            Self::InvalidPubkey { .. } => "invalid_pubkey",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::RejectedPubkey { .. } => "rejected_pubkey",
            Self::ConflictingAccountLists { .. } => "conflicting_account_lists",
            Self::DuplicateSubFilter { .. } => "duplicate_sub_filter",
            Self::TooManySubFilters { .. } => "too_many_sub_filters",
            Self::EmptyMemcmp { .. } => "empty_memcmp",
            Self::MemcmpTooLarge { .. } => "memcmp_too_large",
            Self::InvalidMemcmpBase58 { .. } => "invalid_memcmp",
            Self::TooManyDataSlices { .. } => "too_many_data_slices",
            Self::DataSliceOverlap { .. } => "data_slice_overlap",
        }
    }
}
