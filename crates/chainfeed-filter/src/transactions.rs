//! Transactions matcher, shared by the `transactions` and
//! `transactions_status` filter maps.

use chainfeed_core::{Pubkey, Signature, TransactionInfo, TransactionStatusUpdate};
use std::collections::HashSet;

use crate::error::FilterError;
use crate::limits::FilterLimits;
use crate::request::TransactionsFilterSpec;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionsFilter {
    vote: Option<bool>,
    failed: Option<bool>,
    signature: Option<Signature>,
    account_include: HashSet<Pubkey>,
    account_exclude: HashSet<Pubkey>,
    account_required: HashSet<Pubkey>,
}

impl TransactionsFilter {
    pub fn compile(
        name: &str,
        spec: &TransactionsFilterSpec,
        limits: &FilterLimits,
    ) -> Result<Self, FilterError> {
        let signature = spec
            .signature
            .as_deref()
            .map(|s| {
                s.parse::<Signature>().map_err(|source| FilterError::InvalidSignature {
                    filter: name.to_string(),
                    source,
                })
            })
            .transpose()?;

        let account_include = limits.parse_pubkeys(name, "account_include", &spec.account_include, true)?;
        let account_exclude = limits.parse_pubkeys(name, "account_exclude", &spec.account_exclude, false)?;
        let account_required =
            limits.parse_pubkeys(name, "account_required", &spec.account_required, false)?;

        if let Some(both) = account_include.intersection(&account_exclude).next() {
            return Err(FilterError::ConflictingAccountLists {
                filter: name.to_string(),
                pubkey: both.to_string(),
            });
        }

        Ok(Self {
            vote: spec.vote,
            failed: spec.failed,
            signature,
            account_include,
            account_exclude,
            account_required,
        })
    }

    fn has_account_lists(&self) -> bool {
        !self.account_include.is_empty()
            || !self.account_exclude.is_empty()
            || !self.account_required.is_empty()
    }

    fn matches_header(&self, signature: &Signature, is_vote: bool, is_failed: bool) -> bool {
        if self.vote.is_some_and(|vote| vote != is_vote) {
            return false;
        }
        if self.failed.is_some_and(|failed| failed != is_failed) {
            return false;
        }
        if self.signature.as_ref().is_some_and(|s| s != signature) {
            return false;
        }
        true
    }

    pub fn matches_transaction(&self, tx: &TransactionInfo) -> bool {
        if !self.matches_header(&tx.signature, tx.is_vote, tx.is_failed()) {
            return false;
        }
        if !self.has_account_lists() {
            return true;
        }

        let mut included = self.account_include.is_empty();
        let mut required_seen = HashSet::with_capacity(self.account_required.len());
        for key in tx.account_keys() {
            if self.account_exclude.contains(key) {
                return false;
            }
            if !included && self.account_include.contains(key) {
                included = true;
            }
            if self.account_required.contains(key) {
                required_seen.insert(*key);
            }
        }
        included && required_seen.len() == self.account_required.len()
    }

    /// Status events carry no account keys, so a filter with any account
    /// list never matches them.
    pub fn matches_status(&self, status: &TransactionStatusUpdate) -> bool {
        !self.has_account_lists()
            && self.matches_header(&status.signature, status.is_vote, status.is_failed())
    }
}
