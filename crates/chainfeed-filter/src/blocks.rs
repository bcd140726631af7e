//! Blocks and blocks-meta matchers.
//!
//! A block filter both decides whether a block is delivered and selects
//! which nested transactions, accounts and entries travel with it. When
//! several block filters of one session match, their selections are merged
//! into a single outbound block.

use chainfeed_core::{AccountUpdate, Block, Pubkey};
use std::collections::HashSet;
use std::sync::Arc;

use crate::data_slice::{apply_slices, DataSlice};
use crate::error::FilterError;
use crate::limits::FilterLimits;
use crate::request::BlocksFilterSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocksFilter {
    account_include: HashSet<Pubkey>,
    include_transactions: bool,
    include_accounts: bool,
    include_entries: bool,
}

impl BlocksFilter {
    pub fn compile(
        name: &str,
        spec: &BlocksFilterSpec,
        limits: &FilterLimits,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            account_include: limits.parse_pubkeys(name, "account_include", &spec.account_include, true)?,
            include_transactions: spec.include_transactions.unwrap_or(true),
            include_accounts: spec.include_accounts.unwrap_or(true),
            include_entries: spec.include_entries.unwrap_or(true),
        })
    }

    /// Participants are the account keys of every transaction plus the
    /// pubkeys of every updated account.
    pub fn matches(&self, block: &Block) -> bool {
        if self.account_include.is_empty() {
            return true;
        }
        block
            .transactions
            .iter()
            .flat_map(|tx| tx.account_keys())
            .chain(block.accounts.iter().map(|a| &a.pubkey))
            .any(|key| self.account_include.contains(key))
    }

    /// What this filter contributes to the outbound block, or `None` when
    /// the block does not match.
    pub fn select(&self, block: &Block) -> Option<BlockSelection> {
        if !self.matches(block) {
            return None;
        }
        let narrow = !self.account_include.is_empty();
        let transactions = block
            .transactions
            .iter()
            .map(|tx| {
                self.include_transactions
                    && (!narrow || tx.account_keys().any(|k| self.account_include.contains(k)))
            })
            .collect();
        let accounts = block
            .accounts
            .iter()
            .map(|a| self.include_accounts && (!narrow || self.account_include.contains(&a.pubkey)))
            .collect();
        Some(BlockSelection {
            transactions,
            accounts,
            entries: self.include_entries,
        })
    }
}

/// Per-item inclusion masks over one block's nested lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSelection {
    transactions: Vec<bool>,
    accounts: Vec<bool>,
    entries: bool,
}

impl BlockSelection {
    pub fn merge(&mut self, other: &BlockSelection) {
        for (mine, theirs) in self.transactions.iter_mut().zip(&other.transactions) {
            *mine |= *theirs;
        }
        for (mine, theirs) in self.accounts.iter_mut().zip(&other.accounts) {
            *mine |= *theirs;
        }
        self.entries |= other.entries;
    }

    /// Build the outbound block. Nested accounts receive the session's data
    /// slices.
    pub fn build(&self, block: &Block, slices: &[DataSlice]) -> Block {
        let transactions = block
            .transactions
            .iter()
            .zip(&self.transactions)
            .filter(|(_, keep)| **keep)
            .map(|(tx, _)| Arc::clone(tx))
            .collect();
        let accounts = block
            .accounts
            .iter()
            .zip(&self.accounts)
            .filter(|(_, keep)| **keep)
            .map(|(account, _)| project_account(account, slices))
            .collect();
        let entries = if self.entries {
            block.entries.clone()
        } else {
            Vec::new()
        };
        Block {
            meta: block.meta.clone(),
            transactions,
            accounts,
            entries,
        }
    }
}

/// Apply data slices to an account, sharing the original when there is
/// nothing to project.
pub fn project_account(account: &Arc<AccountUpdate>, slices: &[DataSlice]) -> Arc<AccountUpdate> {
    if slices.is_empty() {
        return Arc::clone(account);
    }
    let mut projected = AccountUpdate::clone(account);
    projected.data = apply_slices(slices, &account.data);
    Arc::new(projected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chainfeed_core::{
        BlockMeta, EntryUpdate, Hash, Signature, TransactionInfo, TransactionMessage,
        TransactionMeta,
    };

    fn key(b: u8) -> Pubkey {
        Pubkey::new([b; 32])
    }

    fn tx(keys: &[u8]) -> Arc<TransactionInfo> {
        Arc::new(TransactionInfo {
            signature: Signature::new([keys.first().copied().unwrap_or(0); 64]),
            is_vote: false,
            index: 0,
            message: TransactionMessage {
                account_keys: keys.iter().map(|b| key(*b)).collect(),
                ..Default::default()
            },
            meta: TransactionMeta::default(),
        })
    }

    fn account(pubkey: u8) -> Arc<AccountUpdate> {
        Arc::new(AccountUpdate {
            slot: 3,
            pubkey: key(pubkey),
            owner: key(0),
            lamports: 1,
            executable: false,
            rent_epoch: 0,
            data: Bytes::from_static(b"0123456789"),
            write_version: 1,
            txn_signature: None,
            is_startup: false,
        })
    }

    fn block() -> Block {
        Block {
            meta: BlockMeta {
                slot: 3,
                blockhash: Hash::new([3; 32]),
                parent_slot: 2,
                parent_blockhash: Hash::new([2; 32]),
                block_time: None,
                block_height: Some(3),
                rewards: Vec::new(),
                executed_transaction_count: 2,
                updated_account_count: 2,
                entries_count: 1,
            },
            transactions: vec![tx(&[1, 2]), tx(&[5])],
            accounts: vec![account(1), account(6)],
            entries: vec![Arc::new(EntryUpdate {
                slot: 3,
                index: 0,
                num_hashes: 1,
                hash: Hash::new([9; 32]),
                executed_transaction_count: 2,
                starting_transaction_index: 0,
            })],
        }
    }

    fn compile(spec: BlocksFilterSpec) -> BlocksFilter {
        BlocksFilter::compile("b", &spec, &FilterLimits::default()).unwrap()
    }

    #[test]
    fn empty_include_matches_and_keeps_everything() {
        let b = block();
        let sel = compile(BlocksFilterSpec::default()).select(&b).unwrap();
        let out = sel.build(&b, &[]);
        assert_eq!(out, b);
    }

    #[test]
    fn include_narrows_nested_lists() {
        let b = block();
        let f = compile(BlocksFilterSpec {
            account_include: vec![key(6).to_string()],
            ..Default::default()
        });
        let out = f.select(&b).unwrap().build(&b, &[]);
        assert!(out.transactions.is_empty());
        assert_eq!(out.accounts.len(), 1);
        assert_eq!(out.accounts[0].pubkey, key(6));
        assert_eq!(out.entries.len(), 1);
    }

    #[test]
    fn unrelated_include_does_not_match() {
        let f = compile(BlocksFilterSpec {
            account_include: vec![key(42).to_string()],
            ..Default::default()
        });
        assert!(f.select(&block()).is_none());
    }

    #[test]
    fn include_flags_drop_collections() {
        let b = block();
        let f = compile(BlocksFilterSpec {
            include_transactions: Some(false),
            include_accounts: Some(false),
            include_entries: Some(false),
            ..Default::default()
        });
        let out = f.select(&b).unwrap().build(&b, &[]);
        assert!(out.transactions.is_empty() && out.accounts.is_empty() && out.entries.is_empty());
        assert_eq!(out.meta, b.meta);
    }

    #[test]
    fn selections_merge_as_union() {
        let b = block();
        let txs_only = compile(BlocksFilterSpec {
            account_include: vec![key(5).to_string()],
            include_accounts: Some(false),
            include_entries: Some(false),
            ..Default::default()
        });
        let accounts_only = compile(BlocksFilterSpec {
            include_transactions: Some(false),
            include_entries: Some(false),
            ..Default::default()
        });
        let mut sel = txs_only.select(&b).unwrap();
        sel.merge(&accounts_only.select(&b).unwrap());
        let out = sel.build(&b, &[]);
        assert_eq!(out.transactions.len(), 1);
        assert_eq!(out.transactions[0].message.account_keys, vec![key(5)]);
        assert_eq!(out.accounts.len(), 2);
        assert!(out.entries.is_empty());
    }

    #[test]
    fn nested_accounts_are_sliced() {
        let b = block();
        let slices = [DataSlice { offset: 0, length: 2 }];
        let out = compile(BlocksFilterSpec::default())
            .select(&b)
            .unwrap()
            .build(&b, &slices);
        assert_eq!(out.accounts[0].data, Bytes::from_static(b"01"));
    }
}
