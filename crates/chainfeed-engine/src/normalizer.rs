//! Raw upstream events → [`LedgerEvent`].
//!
//! The normalizer is stateless: one raw event in, at most one normalized
//! event out. It performs no filtering beyond dropping startup snapshot
//! accounts when configured to.

use bytes::Bytes;
use chainfeed_core::{
    raw::{RawAccount, RawBlockMeta, RawEntry, RawTransaction},
    AccountUpdate, Block, BlockMeta, CompiledInstruction, EntryUpdate, Hash, KeyParseError,
    LedgerEvent, NormalizeError, Pubkey, RawLedgerEvent, Reward, Signature, Slot, SlotStatus,
    SlotUpdate, TransactionInfo, TransactionMessage, TransactionMeta, TransactionStatusUpdate,
    TransactionUpdate,
};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    include_startup_accounts: bool,
}

/// Field context carried into error reports.
#[derive(Clone, Copy)]
struct Ctx {
    kind: &'static str,
    slot: Slot,
}

impl Ctx {
    fn key<T: FromStr<Err = KeyParseError>>(self, field: &'static str, s: &str) -> Result<T, NormalizeError> {
        s.parse().map_err(|source| NormalizeError::BadKey {
            kind: self.kind,
            slot: self.slot,
            field,
            source,
        })
    }

    fn keys<T: FromStr<Err = KeyParseError>>(
        self,
        field: &'static str,
        values: &[String],
    ) -> Result<Vec<T>, NormalizeError> {
        values.iter().map(|v| self.key(field, v)).collect()
    }

    fn hex(self, field: &'static str, s: &str) -> Result<Bytes, NormalizeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s).map(Bytes::from).map_err(|_| NormalizeError::BadHex {
            kind: self.kind,
            slot: self.slot,
            field,
        })
    }
}

impl Normalizer {
    pub fn new(include_startup_accounts: bool) -> Self {
        Self {
            include_startup_accounts,
        }
    }

    /// Normalize one raw event. `Ok(None)` means the event was skipped on
    /// purpose (a startup account while startup accounts are excluded).
    pub fn normalize(&self, raw: RawLedgerEvent) -> Result<Option<LedgerEvent>, NormalizeError> {
        let event = match raw {
            RawLedgerEvent::Account(raw) => {
                if raw.is_startup && !self.include_startup_accounts {
                    return Ok(None);
                }
                LedgerEvent::Account(Arc::new(account(&raw)?))
            }
            RawLedgerEvent::Slot(raw) => {
                let status = SlotStatus::from_code(raw.status).ok_or(NormalizeError::UnknownStatus {
                    slot: raw.slot,
                    code: raw.status,
                })?;
                LedgerEvent::Slot(SlotUpdate {
                    slot: raw.slot,
                    parent: raw.parent,
                    status,
                    dead_error: raw.dead_error,
                })
            }
            RawLedgerEvent::Transaction(raw) => LedgerEvent::Transaction(TransactionUpdate {
                slot: raw.slot,
                transaction: Arc::new(transaction(&raw)?),
            }),
            RawLedgerEvent::TransactionStatus(raw) => {
                let ctx = Ctx {
                    kind: "transaction_status",
                    slot: raw.slot,
                };
                LedgerEvent::TransactionStatus(TransactionStatusUpdate {
                    slot: raw.slot,
                    signature: ctx.key("signature", &raw.signature)?,
                    is_vote: raw.is_vote,
                    index: raw.index,
                    err: raw.err,
                })
            }
            RawLedgerEvent::Block(raw) => {
                let meta = block_meta(&raw.meta, "block")?;
                let transactions = raw
                    .transactions
                    .iter()
                    .map(|tx| transaction(tx).map(Arc::new))
                    .collect::<Result<_, _>>()?;
                let accounts = raw
                    .accounts
                    .iter()
                    .map(|a| account(a).map(Arc::new))
                    .collect::<Result<_, _>>()?;
                let entries = raw
                    .entries
                    .iter()
                    .map(|e| entry(e).map(Arc::new))
                    .collect::<Result<_, _>>()?;
                LedgerEvent::Block(Arc::new(Block {
                    meta,
                    transactions,
                    accounts,
                    entries,
                }))
            }
            RawLedgerEvent::BlockMeta(raw) => {
                LedgerEvent::BlockMeta(Arc::new(block_meta(&raw, "block_meta")?))
            }
            RawLedgerEvent::Entry(raw) => LedgerEvent::Entry(Arc::new(entry(&raw)?)),
        };
        Ok(Some(event))
    }
}

fn account(raw: &RawAccount) -> Result<AccountUpdate, NormalizeError> {
    let ctx = Ctx {
        kind: "account",
        slot: raw.slot,
    };
    Ok(AccountUpdate {
        slot: raw.slot,
        pubkey: ctx.key("pubkey", &raw.pubkey)?,
        owner: ctx.key("owner", &raw.owner)?,
        lamports: raw.lamports,
        executable: raw.executable,
        rent_epoch: raw.rent_epoch,
        data: ctx.hex("data", &raw.data)?,
        write_version: raw.write_version,
        txn_signature: raw
            .txn_signature
            .as_deref()
            .map(|s| ctx.key::<Signature>("txn_signature", s))
            .transpose()?,
        is_startup: raw.is_startup,
    })
}

fn transaction(raw: &RawTransaction) -> Result<TransactionInfo, NormalizeError> {
    let ctx = Ctx {
        kind: "transaction",
        slot: raw.slot,
    };
    let first = raw
        .signatures
        .first()
        .ok_or(NormalizeError::MissingSignature { slot: raw.slot })?;
    let instructions = raw
        .instructions
        .iter()
        .map(|ix| {
            Ok(CompiledInstruction {
                program_id_index: ix.program_id_index,
                accounts: ix.accounts.clone(),
                data: ctx.hex("instructions.data", &ix.data)?,
            })
        })
        .collect::<Result<_, NormalizeError>>()?;

    Ok(TransactionInfo {
        signature: ctx.key("signatures", first)?,
        is_vote: raw.is_vote,
        index: raw.index,
        message: TransactionMessage {
            account_keys: ctx.keys::<Pubkey>("account_keys", &raw.account_keys)?,
            recent_blockhash: raw
                .recent_blockhash
                .as_deref()
                .map(|h| ctx.key::<Hash>("recent_blockhash", h))
                .transpose()?
                .unwrap_or_default(),
            instructions,
        },
        meta: TransactionMeta {
            err: raw.err.clone(),
            fee: raw.fee,
            pre_balances: raw.pre_balances.clone(),
            post_balances: raw.post_balances.clone(),
            log_messages: raw.log_messages.clone(),
            loaded_writable_addresses: ctx.keys("loaded_writable_addresses", &raw.loaded_writable_addresses)?,
            loaded_readonly_addresses: ctx.keys("loaded_readonly_addresses", &raw.loaded_readonly_addresses)?,
        },
    })
}

fn block_meta(raw: &RawBlockMeta, kind: &'static str) -> Result<BlockMeta, NormalizeError> {
    let ctx = Ctx {
        kind,
        slot: raw.slot,
    };
    let rewards = raw
        .rewards
        .iter()
        .map(|r| {
            Ok(Reward {
                pubkey: ctx.key("rewards.pubkey", &r.pubkey)?,
                lamports: r.lamports,
                post_balance: r.post_balance,
                reward_type: r.reward_type.clone(),
                commission: r.commission,
            })
        })
        .collect::<Result<_, NormalizeError>>()?;
    Ok(BlockMeta {
        slot: raw.slot,
        blockhash: ctx.key("blockhash", &raw.blockhash)?,
        parent_slot: raw.parent_slot,
        parent_blockhash: ctx.key("parent_blockhash", &raw.parent_blockhash)?,
        block_time: raw.block_time,
        block_height: raw.block_height,
        rewards,
        executed_transaction_count: raw.executed_transaction_count,
        updated_account_count: raw.updated_account_count,
        entries_count: raw.entries_count,
    })
}

fn entry(raw: &RawEntry) -> Result<EntryUpdate, NormalizeError> {
    let ctx = Ctx {
        kind: "entry",
        slot: raw.slot,
    };
    Ok(EntryUpdate {
        slot: raw.slot,
        index: raw.index,
        num_hashes: raw.num_hashes,
        hash: ctx.key("hash", &raw.hash)?,
        executed_transaction_count: raw.executed_transaction_count,
        starting_transaction_index: raw.starting_transaction_index,
    })
}
