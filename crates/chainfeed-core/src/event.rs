//! Normalized ledger events.
//!
//! Every event produced by the normalizer is one of the [`LedgerEvent`]
//! variants below. Payloads are reference counted so that a single event can
//! be fanned out to thousands of sessions without copying account data or
//! transaction bodies.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::commitment::SlotStatus;
use crate::types::{Hash, Pubkey, Signature, Slot};

/// A write to an account observed in `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub slot: Slot,
    pub pubkey: Pubkey,
    pub owner: Pubkey,
    pub lamports: u64,
    pub executable: bool,
    pub rent_epoch: u64,
    pub data: Bytes,
    /// Strictly increasing per pubkey; later writes win.
    pub write_version: u64,
    /// Transaction that caused the write, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub txn_signature: Option<Signature>,
    /// Replayed from a snapshot at startup rather than observed live.
    #[serde(default)]
    pub is_startup: bool,
}

/// A status transition for a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotUpdate {
    pub slot: Slot,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<Slot>,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dead_error: Option<String>,
}

/// One compiled instruction of a transaction message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Bytes,
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionMessage {
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

/// Execution metadata recorded by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionMeta {
    /// `None` when the transaction succeeded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub err: Option<String>,
    pub fee: u64,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub log_messages: Vec<String>,
    /// Writable addresses loaded from address lookup tables.
    #[serde(default)]
    pub loaded_writable_addresses: Vec<Pubkey>,
    /// Read-only addresses loaded from address lookup tables.
    #[serde(default)]
    pub loaded_readonly_addresses: Vec<Pubkey>,
}

/// A full transaction with its execution metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub signature: Signature,
    pub is_vote: bool,
    /// Position within the block.
    pub index: u64,
    pub message: TransactionMessage,
    pub meta: TransactionMeta,
}

impl TransactionInfo {
    /// Every account key the transaction references: static keys first,
    /// then lookup-table loaded writable and read-only addresses.
    pub fn account_keys(&self) -> impl Iterator<Item = &Pubkey> {
        self.message
            .account_keys
            .iter()
            .chain(self.meta.loaded_writable_addresses.iter())
            .chain(self.meta.loaded_readonly_addresses.iter())
    }

    pub fn is_failed(&self) -> bool {
        self.meta.err.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub slot: Slot,
    pub transaction: Arc<TransactionInfo>,
}

/// Status-only view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatusUpdate {
    pub slot: Slot,
    pub signature: Signature,
    pub is_vote: bool,
    pub index: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub err: Option<String>,
}

impl TransactionStatusUpdate {
    pub fn from_transaction(slot: Slot, tx: &TransactionInfo) -> Self {
        Self {
            slot,
            signature: tx.signature,
            is_vote: tx.is_vote,
            index: tx.index,
            err: tx.meta.err.clone(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.err.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub pubkey: Pubkey,
    pub lamports: i64,
    pub post_balance: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reward_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub commission: Option<u8>,
}

/// Aggregate block information without nested collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub slot: Slot,
    pub blockhash: Hash,
    pub parent_slot: Slot,
    pub parent_blockhash: Hash,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub block_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    pub executed_transaction_count: u64,
    pub updated_account_count: u64,
    pub entries_count: u64,
}

/// A full block. The nested lists may be narrowed per session before delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub meta: BlockMeta,
    #[serde(default)]
    pub transactions: Vec<Arc<TransactionInfo>>,
    #[serde(default)]
    pub accounts: Vec<Arc<AccountUpdate>>,
    #[serde(default)]
    pub entries: Vec<Arc<EntryUpdate>>,
}

/// One consensus entry (a batch of hashed transactions) within a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUpdate {
    pub slot: Slot,
    pub index: u64,
    pub num_hashes: u64,
    pub hash: Hash,
    pub executed_transaction_count: u64,
    pub starting_transaction_index: u64,
}

/// The closed set of filterable event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Account,
    Slot,
    Transaction,
    TransactionStatus,
    Block,
    BlockMeta,
    Entry,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Account => "account",
            Self::Slot => "slot",
            Self::Transaction => "transaction",
            Self::TransactionStatus => "transaction_status",
            Self::Block => "block",
            Self::BlockMeta => "block_meta",
            Self::Entry => "entry",
        };
        f.write_str(s)
    }
}

/// A normalized ledger event. Cloning is cheap: payloads are behind `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Account(Arc<AccountUpdate>),
    Slot(SlotUpdate),
    Transaction(TransactionUpdate),
    TransactionStatus(TransactionStatusUpdate),
    Block(Arc<Block>),
    BlockMeta(Arc<BlockMeta>),
    Entry(Arc<EntryUpdate>),
}

impl LedgerEvent {
    pub fn slot(&self) -> Slot {
        match self {
            Self::Account(a) => a.slot,
            Self::Slot(s) => s.slot,
            Self::Transaction(t) => t.slot,
            Self::TransactionStatus(t) => t.slot,
            Self::Block(b) => b.meta.slot,
            Self::BlockMeta(m) => m.slot,
            Self::Entry(e) => e.slot,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Account(_) => EventKind::Account,
            Self::Slot(_) => EventKind::Slot,
            Self::Transaction(_) => EventKind::Transaction,
            Self::TransactionStatus(_) => EventKind::TransactionStatus,
            Self::Block(_) => EventKind::Block,
            Self::BlockMeta(_) => EventKind::BlockMeta,
            Self::Entry(_) => EventKind::Entry,
        }
    }

    /// Slot status carried by this event. Only `Slot` events carry one;
    /// everything else inherits `Processed` from the slot it belongs to.
    pub fn status(&self) -> SlotStatus {
        match self {
            Self::Slot(s) => s.status,
            _ => SlotStatus::Processed,
        }
    }
}
