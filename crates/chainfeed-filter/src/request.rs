//! Session control message: the full set of named filters a session wants.
//!
//! Every update replaces the previous request wholesale. Map order is the
//! registration order and is preserved (`IndexMap`), which is also the order
//! in which matched filter names are reported.

use chainfeed_core::CommitmentLevel;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub accounts: IndexMap<String, AccountsFilterSpec>,
    #[serde(default)]
    pub slots: IndexMap<String, SlotsFilterSpec>,
    #[serde(default)]
    pub transactions: IndexMap<String, TransactionsFilterSpec>,
    #[serde(default)]
    pub transactions_status: IndexMap<String, TransactionsFilterSpec>,
    #[serde(default)]
    pub blocks: IndexMap<String, BlocksFilterSpec>,
    #[serde(default)]
    pub blocks_meta: IndexMap<String, BlocksMetaFilterSpec>,
    #[serde(default)]
    pub entry: IndexMap<String, EntryFilterSpec>,
    /// Minimum commitment; `None` means processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<CommitmentLevel>,
    #[serde(default)]
    pub accounts_data_slice: Vec<DataSliceSpec>,
    /// Liveness probe. A request carrying a ping is answered with a pong
    /// and does not touch the session's filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<PingRequest>,
}

impl SubscribeRequest {
    pub fn ping(id: i32) -> Self {
        Self {
            ping: Some(PingRequest { id }),
            ..Default::default()
        }
    }

    /// Total number of named filters across all kinds.
    pub fn filter_count(&self) -> usize {
        self.accounts.len()
            + self.slots.len()
            + self.transactions.len()
            + self.transactions_status.len()
            + self.blocks.len()
            + self.blocks_meta.len()
            + self.entry.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    pub id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsFilterSpec {
    /// Account pubkeys (base58). Empty = any account.
    #[serde(default)]
    pub account: Vec<String>,
    /// Owner program pubkeys (base58). Empty = any owner.
    #[serde(default)]
    pub owner: Vec<String>,
    /// Additional predicates; all must pass.
    #[serde(default)]
    pub filters: Vec<AccountsSubFilterSpec>,
    /// Require the update to carry its originating transaction signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonempty_txn_signature: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountsSubFilterSpec {
    Memcmp(MemcmpSpec),
    Datasize(u64),
    TokenAccountState(bool),
    Lamports(LamportsSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemcmpSpec {
    pub offset: usize,
    #[serde(flatten)]
    pub data: MemcmpData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemcmpData {
    Bytes(Vec<u8>),
    Base58(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LamportsSpec {
    Eq(u64),
    Ne(u64),
    Lt(u64),
    Gt(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotsFilterSpec {
    /// Only deliver statuses at or above the session commitment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by_commitment: Option<bool>,
    /// Also deliver first-shred-received / completed / created-bank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interslot_updates: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsFilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub account_include: Vec<String>,
    #[serde(default)]
    pub account_exclude: Vec<String>,
    #[serde(default)]
    pub account_required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksFilterSpec {
    #[serde(default)]
    pub account_include: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_transactions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_accounts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_entries: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksMetaFilterSpec {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilterSpec {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSliceSpec {
    pub offset: u64,
    pub length: u64,
}
