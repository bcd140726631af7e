//! Raw, un-normalized events as delivered by an upstream source.
//!
//! Keys, signatures and hashes are base58 text; byte payloads are hex
//! (with or without a `0x` prefix). Nothing here is validated: the
//! normalizer turns a `RawLedgerEvent` into a [`crate::LedgerEvent`] or
//! rejects it as malformed.

use serde::{Deserialize, Serialize};

use crate::types::Slot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawLedgerEvent {
    Account(RawAccount),
    Slot(RawSlot),
    Transaction(RawTransaction),
    TransactionStatus(RawTransactionStatus),
    Block(RawBlock),
    BlockMeta(RawBlockMeta),
    Entry(RawEntry),
}

impl RawLedgerEvent {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Account(_) => "account",
            Self::Slot(_) => "slot",
            Self::Transaction(_) => "transaction",
            Self::TransactionStatus(_) => "transaction_status",
            Self::Block(_) => "block",
            Self::BlockMeta(_) => "block_meta",
            Self::Entry(_) => "entry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAccount {
    pub slot: Slot,
    pub pubkey: String,
    pub owner: String,
    pub lamports: u64,
    #[serde(default)]
    pub executable: bool,
    #[serde(default)]
    pub rent_epoch: u64,
    /// Hex-encoded account data.
    #[serde(default)]
    pub data: String,
    pub write_version: u64,
    #[serde(default)]
    pub txn_signature: Option<String>,
    #[serde(default)]
    pub is_startup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSlot {
    pub slot: Slot,
    #[serde(default)]
    pub parent: Option<Slot>,
    /// Numeric status code, see [`crate::SlotStatus::from_code`].
    pub status: u8,
    #[serde(default)]
    pub dead_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstruction {
    pub program_id_index: u8,
    #[serde(default)]
    pub accounts: Vec<u8>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub slot: Slot,
    /// All signatures; the first one identifies the transaction.
    pub signatures: Vec<String>,
    #[serde(default)]
    pub is_vote: bool,
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub account_keys: Vec<String>,
    #[serde(default)]
    pub recent_blockhash: Option<String>,
    #[serde(default)]
    pub instructions: Vec<RawInstruction>,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub log_messages: Vec<String>,
    #[serde(default)]
    pub loaded_writable_addresses: Vec<String>,
    #[serde(default)]
    pub loaded_readonly_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransactionStatus {
    pub slot: Slot,
    pub signature: String,
    #[serde(default)]
    pub is_vote: bool,
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub err: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReward {
    pub pubkey: String,
    pub lamports: i64,
    #[serde(default)]
    pub post_balance: u64,
    #[serde(default)]
    pub reward_type: Option<String>,
    #[serde(default)]
    pub commission: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlockMeta {
    pub slot: Slot,
    pub blockhash: String,
    pub parent_slot: Slot,
    pub parent_blockhash: String,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub rewards: Vec<RawReward>,
    #[serde(default)]
    pub executed_transaction_count: u64,
    #[serde(default)]
    pub updated_account_count: u64,
    #[serde(default)]
    pub entries_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(flatten)]
    pub meta: RawBlockMeta,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
    #[serde(default)]
    pub accounts: Vec<RawAccount>,
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub slot: Slot,
    pub index: u64,
    #[serde(default)]
    pub num_hashes: u64,
    pub hash: String,
    #[serde(default)]
    pub executed_transaction_count: u64,
    #[serde(default)]
    pub starting_transaction_index: u64,
}
