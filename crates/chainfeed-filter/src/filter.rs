//! Compiled, immutable per-session filter set.
//!
//! A [`Filter`] is built once from a [`SubscribeRequest`] and never mutated;
//! updating a session swaps in a freshly compiled `Filter` as a whole.

use chainfeed_core::{
    CommitmentLevel, FilteredUpdate, LedgerEvent, TransactionStatusUpdate, TransactionUpdate,
    UpdateOneof,
};
use indexmap::IndexMap;
use std::sync::Arc;

use crate::accounts::AccountsFilter;
use crate::blocks::{project_account, BlockSelection, BlocksFilter};
use crate::data_slice::DataSlice;
use crate::error::FilterError;
use crate::limits::FilterLimits;
use crate::request::SubscribeRequest;
use crate::slots::SlotsFilter;
use crate::transactions::TransactionsFilter;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    accounts: Vec<(String, AccountsFilter)>,
    slots: Vec<(String, SlotsFilter)>,
    transactions: Vec<(String, TransactionsFilter)>,
    transactions_status: Vec<(String, TransactionsFilter)>,
    blocks: Vec<(String, BlocksFilter)>,
    blocks_meta: Vec<String>,
    entry: Vec<String>,
    commitment: CommitmentLevel,
    data_slices: Vec<DataSlice>,
}

fn compile_map<S, F>(
    kind: &'static str,
    map: &IndexMap<String, S>,
    limits: &FilterLimits,
    mut compile: impl FnMut(&str, &S) -> Result<F, FilterError>,
) -> Result<Vec<(String, F)>, FilterError> {
    limits.check_filter_count(kind, map.len())?;
    map.iter()
        .map(|(name, spec)| {
            if name.is_empty() {
                return Err(FilterError::EmptyName { kind });
            }
            Ok((name.clone(), compile(name, spec)?))
        })
        .collect()
}

fn names<S>(
    kind: &'static str,
    map: &IndexMap<String, S>,
    limits: &FilterLimits,
) -> Result<Vec<String>, FilterError> {
    Ok(compile_map(kind, map, limits, |_, _| Ok(()))?
        .into_iter()
        .map(|(name, ())| name)
        .collect())
}

impl Filter {
    /// Validate and compile a request. Nothing is partially applied: any
    /// error leaves the caller's current filter in place.
    pub fn new(request: &SubscribeRequest, limits: &FilterLimits) -> Result<Self, FilterError> {
        Ok(Self {
            accounts: compile_map("accounts", &request.accounts, limits, |name, spec| {
                AccountsFilter::compile(name, spec, limits)
            })?,
            slots: compile_map("slots", &request.slots, limits, |_, spec| {
                Ok(SlotsFilter::compile(spec))
            })?,
            transactions: compile_map("transactions", &request.transactions, limits, |name, spec| {
                TransactionsFilter::compile(name, spec, limits)
            })?,
            transactions_status: compile_map(
                "transactions_status",
                &request.transactions_status,
                limits,
                |name, spec| TransactionsFilter::compile(name, spec, limits),
            )?,
            blocks: compile_map("blocks", &request.blocks, limits, |name, spec| {
                BlocksFilter::compile(name, spec, limits)
            })?,
            blocks_meta: names("blocks_meta", &request.blocks_meta, limits)?,
            entry: names("entry", &request.entry, limits)?,
            commitment: request.commitment.unwrap_or_default(),
            data_slices: DataSlice::compile(&request.accounts_data_slice, limits)?,
        })
    }

    pub fn commitment(&self) -> CommitmentLevel {
        self.commitment
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.slots.is_empty()
            && self.transactions.is_empty()
            && self.transactions_status.is_empty()
            && self.blocks.is_empty()
            && self.blocks_meta.is_empty()
            && self.entry.is_empty()
    }

    /// Every outbound message this filter produces for `event`. Empty when
    /// nothing matches. A transaction can yield two messages: one for the
    /// `transactions` filters and a status projection for the
    /// `transactions_status` filters.
    pub fn get_updates(&self, event: &LedgerEvent) -> Vec<FilteredUpdate> {
        match event {
            LedgerEvent::Account(account) => {
                let matched = matching(&self.accounts, |f| f.matches(account));
                single(matched, || {
                    UpdateOneof::Account(project_account(account, &self.data_slices))
                })
            }
            LedgerEvent::Slot(slot) => {
                let matched = matching(&self.slots, |f| f.matches(slot, self.commitment));
                single(matched, || UpdateOneof::Slot(slot.clone()))
            }
            LedgerEvent::Transaction(update) => {
                let tx = &update.transaction;
                let mut out = single(
                    matching(&self.transactions, |f| f.matches_transaction(tx)),
                    || {
                        UpdateOneof::Transaction(TransactionUpdate {
                            slot: update.slot,
                            transaction: Arc::clone(tx),
                        })
                    },
                );
                out.extend(single(
                    matching(&self.transactions_status, |f| f.matches_transaction(tx)),
                    || {
                        UpdateOneof::TransactionStatus(TransactionStatusUpdate::from_transaction(
                            update.slot,
                            tx,
                        ))
                    },
                ));
                out
            }
            LedgerEvent::TransactionStatus(status) => single(
                matching(&self.transactions_status, |f| f.matches_status(status)),
                || UpdateOneof::TransactionStatus(status.clone()),
            ),
            LedgerEvent::Block(block) => {
                let mut matched = Vec::new();
                let mut selection: Option<BlockSelection> = None;
                for (name, filter) in &self.blocks {
                    if let Some(sel) = filter.select(block) {
                        matched.push(name.clone());
                        match selection.as_mut() {
                            Some(acc) => acc.merge(&sel),
                            None => selection = Some(sel),
                        }
                    }
                }
                match selection {
                    Some(sel) => vec![FilteredUpdate::new(
                        matched,
                        UpdateOneof::Block(Arc::new(sel.build(block, &self.data_slices))),
                    )],
                    None => Vec::new(),
                }
            }
            LedgerEvent::BlockMeta(meta) => single(self.blocks_meta.clone(), || {
                UpdateOneof::BlockMeta(Arc::clone(meta))
            }),
            LedgerEvent::Entry(entry) => {
                single(self.entry.clone(), || UpdateOneof::Entry(Arc::clone(entry)))
            }
        }
    }
}

fn matching<F>(filters: &[(String, F)], mut pred: impl FnMut(&F) -> bool) -> Vec<String> {
    filters
        .iter()
        .filter(|(_, f)| pred(f))
        .map(|(name, _)| name.clone())
        .collect()
}

fn single(matched: Vec<String>, build: impl FnOnce() -> UpdateOneof) -> Vec<FilteredUpdate> {
    if matched.is_empty() {
        Vec::new()
    } else {
        vec![FilteredUpdate::new(matched, build())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{AccountsFilterSpec, TransactionsFilterSpec};
    use bytes::Bytes;
    use chainfeed_core::{
        AccountUpdate, Pubkey, Signature, SlotStatus, SlotUpdate, TransactionInfo,
        TransactionMessage, TransactionMeta,
    };

    fn key(b: u8) -> Pubkey {
        Pubkey::new([b; 32])
    }

    fn account_event(pubkey: u8, owner: u8) -> LedgerEvent {
        LedgerEvent::Account(Arc::new(AccountUpdate {
            slot: 1,
            pubkey: key(pubkey),
            owner: key(owner),
            lamports: 1,
            executable: false,
            rent_epoch: 0,
            data: Bytes::from_static(b"abcdef"),
            write_version: 1,
            txn_signature: None,
            is_startup: false,
        }))
    }

    fn tx_event(keys: &[u8]) -> LedgerEvent {
        LedgerEvent::Transaction(TransactionUpdate {
            slot: 1,
            transaction: Arc::new(TransactionInfo {
                signature: Signature::new([1; 64]),
                is_vote: false,
                index: 0,
                message: TransactionMessage {
                    account_keys: keys.iter().map(|b| key(*b)).collect(),
                    ..Default::default()
                },
                meta: TransactionMeta::default(),
            }),
        })
    }

    fn request(json: &str) -> SubscribeRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn owner_scenario_tags_filter_name() {
        let req = request(&format!(r#"{{"accounts": {{"f1": {{"owner": ["{}"]}}}}}}"#, key(0xA)));
        let filter = Filter::new(&req, &FilterLimits::default()).unwrap();

        let hit = filter.get_updates(&account_event(1, 0xA));
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].filters, vec!["f1"]);

        assert!(filter.get_updates(&account_event(1, 0xB)).is_empty());
    }

    #[test]
    fn all_matching_names_in_registration_order() {
        let mut req = SubscribeRequest::default();
        req.accounts.insert("zeta".into(), AccountsFilterSpec::default());
        req.accounts.insert(
            "skip".into(),
            AccountsFilterSpec {
                owner: vec![key(9).to_string()],
                ..Default::default()
            },
        );
        req.accounts.insert("alpha".into(), AccountsFilterSpec::default());
        let filter = Filter::new(&req, &FilterLimits::default()).unwrap();

        let updates = filter.get_updates(&account_event(1, 2));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].filters, vec!["zeta", "alpha"]);
    }

    #[test]
    fn include_exclude_scenario() {
        let req = request(&format!(
            r#"{{"transactions": {{"f2": {{"account_include": ["{}", "{}"], "account_exclude": ["{}"]}}}}}}"#,
            key(1),
            key(2),
            key(3)
        ));
        let filter = Filter::new(&req, &FilterLimits::default()).unwrap();
        assert!(filter.get_updates(&tx_event(&[1, 3])).is_empty());

        let updates = filter.get_updates(&tx_event(&[1, 2]));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].filters, vec!["f2"]);
        assert!(matches!(updates[0].update, UpdateOneof::Transaction(_)));
    }

    #[test]
    fn transaction_yields_status_projection_too() {
        let mut req = SubscribeRequest::default();
        req.transactions.insert("full".into(), TransactionsFilterSpec::default());
        req.transactions_status.insert("status".into(), TransactionsFilterSpec::default());
        let filter = Filter::new(&req, &FilterLimits::default()).unwrap();

        let updates = filter.get_updates(&tx_event(&[1]));
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[0].update, UpdateOneof::Transaction(_)));
        assert!(matches!(updates[1].update, UpdateOneof::TransactionStatus(_)));
        assert_eq!(updates[1].filters, vec!["status"]);
    }

    #[test]
    fn data_slice_applied_to_accounts() {
        let req = request(r#"{"accounts": {"a": {}}, "accounts_data_slice": [{"offset": 1, "length": 2}]}"#);
        let filter = Filter::new(&req, &FilterLimits::default()).unwrap();
        let updates = filter.get_updates(&account_event(1, 2));
        match &updates[0].update {
            UpdateOneof::Account(a) => assert_eq!(a.data, Bytes::from_static(b"bc")),
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[test]
    fn slot_matcher_uses_session_commitment() {
        let req = request(r#"{"slots": {"s": {"filter_by_commitment": true}}, "commitment": "finalized"}"#);
        let filter = Filter::new(&req, &FilterLimits::default()).unwrap();
        let slot = |status| {
            LedgerEvent::Slot(SlotUpdate {
                slot: 4,
                parent: None,
                status,
                dead_error: None,
            })
        };
        assert!(filter.get_updates(&slot(SlotStatus::Confirmed)).is_empty());
        assert_eq!(filter.get_updates(&slot(SlotStatus::Finalized)).len(), 1);
    }

    #[test]
    fn empty_name_rejected() {
        let req = request(r#"{"entry": {"": {}}}"#);
        assert_eq!(
            Filter::new(&req, &FilterLimits::default()).unwrap_err(),
            FilterError::EmptyName { kind: "entry" }
        );
    }

    #[test]
    fn filter_count_limit_per_kind() {
        let limits = FilterLimits {
            max_filters: 1,
            ..Default::default()
        };
        let req = request(r#"{"blocks_meta": {"a": {}, "b": {}}}"#);
        assert!(matches!(
            Filter::new(&req, &limits),
            Err(FilterError::TooManyFilters { kind: "blocks_meta", max: 1 })
        ));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let filter = Filter::default();
        assert!(filter.is_empty());
        assert!(filter.get_updates(&account_event(1, 2)).is_empty());
        assert_eq!(filter.commitment(), CommitmentLevel::Processed);
    }
}
