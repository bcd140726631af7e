//! # chainfeed-core
//!
//! Core types shared across all ChainFeed crates: fixed-width ledger
//! primitives, commitment levels, the normalized [`LedgerEvent`] model, the
//! raw upstream event model, and the outbound [`FilteredUpdate`].

pub mod commitment;
pub mod error;
pub mod event;
pub mod metrics;
pub mod raw;
pub mod types;
pub mod update;

pub use commitment::{CommitmentLevel, SlotStatus};
pub use error::{KeyParseError, NormalizeError, SourceError};
pub use event::{
    AccountUpdate, Block, BlockMeta, CompiledInstruction, EntryUpdate, EventKind, LedgerEvent,
    Reward, SlotUpdate, TransactionInfo, TransactionMessage, TransactionMeta,
    TransactionStatusUpdate, TransactionUpdate,
};
pub use metrics::{MetricsRecorder, NoopRecorder};
pub use raw::RawLedgerEvent;
pub use types::{Hash, Pubkey, Signature, Slot};
pub use update::{FilteredUpdate, UpdateOneof};
