//! Accounts matcher.

use chainfeed_core::{AccountUpdate, Pubkey};
use std::collections::HashSet;

use crate::error::FilterError;
use crate::limits::FilterLimits;
use crate::request::{AccountsFilterSpec, AccountsSubFilterSpec, LamportsSpec, MemcmpData};
use crate::token::is_initialized_token_account;

/// A compiled sub-predicate over account contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountPredicate {
    Memcmp { offset: usize, bytes: Vec<u8> },
    DataSize(u64),
    TokenAccountState,
    Lamports(LamportsSpec),
}

impl AccountPredicate {
    /// Total over all inputs: an out-of-range memcmp is simply a non-match.
    pub fn matches(&self, account: &AccountUpdate) -> bool {
        match self {
            Self::Memcmp { offset, bytes } => {
                let Some(end) = offset.checked_add(bytes.len()) else {
                    return false;
                };
                account
                    .data
                    .get(*offset..end)
                    .map_or(false, |window| window == bytes.as_slice())
            }
            Self::DataSize(size) => account.data.len() as u64 == *size,
            Self::TokenAccountState => is_initialized_token_account(&account.data),
            Self::Lamports(cmp) => match *cmp {
                LamportsSpec::Eq(v) => account.lamports == v,
                LamportsSpec::Ne(v) => account.lamports != v,
                LamportsSpec::Lt(v) => account.lamports < v,
                LamportsSpec::Gt(v) => account.lamports > v,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountsFilter {
    accounts: HashSet<Pubkey>,
    owners: HashSet<Pubkey>,
    predicates: Vec<AccountPredicate>,
    nonempty_txn_signature: bool,
}

impl AccountsFilter {
    pub fn compile(
        name: &str,
        spec: &AccountsFilterSpec,
        limits: &FilterLimits,
    ) -> Result<Self, FilterError> {
        let accounts = limits.parse_pubkeys(name, "account", &spec.account, true)?;
        let owners = limits.parse_pubkeys(name, "owner", &spec.owner, false)?;

        if spec.filters.len() > limits.max_subfilters {
            return Err(FilterError::TooManySubFilters {
                filter: name.to_string(),
                max: limits.max_subfilters,
            });
        }

        let mut predicates = Vec::with_capacity(spec.filters.len());
        let mut seen_datasize = false;
        let mut seen_token_state = false;
        for sub in &spec.filters {
            match sub {
                AccountsSubFilterSpec::Memcmp(memcmp) => {
                    let bytes = match &memcmp.data {
                        MemcmpData::Bytes(bytes) => bytes.clone(),
                        MemcmpData::Base58(text) => bs58::decode(text).into_vec().map_err(|e| {
                            FilterError::InvalidMemcmpBase58 {
                                filter: name.to_string(),
                                reason: e.to_string(),
                            }
                        })?,
                    };
                    if bytes.is_empty() {
                        return Err(FilterError::EmptyMemcmp {
                            filter: name.to_string(),
                        });
                    }
                    if bytes.len() > limits.max_memcmp_bytes {
                        return Err(FilterError::MemcmpTooLarge {
                            filter: name.to_string(),
                            len: bytes.len(),
                            max: limits.max_memcmp_bytes,
                        });
                    }
                    predicates.push(AccountPredicate::Memcmp {
                        offset: memcmp.offset,
                        bytes,
                    });
                }
                AccountsSubFilterSpec::Datasize(size) => {
                    if std::mem::replace(&mut seen_datasize, true) {
                        return Err(FilterError::DuplicateSubFilter {
                            filter: name.to_string(),
                            sub: "datasize",
                        });
                    }
                    predicates.push(AccountPredicate::DataSize(*size));
                }
                AccountsSubFilterSpec::TokenAccountState(enabled) => {
                    if std::mem::replace(&mut seen_token_state, true) {
                        return Err(FilterError::DuplicateSubFilter {
                            filter: name.to_string(),
                            sub: "token_account_state",
                        });
                    }
                    if *enabled {
                        predicates.push(AccountPredicate::TokenAccountState);
                    }
                }
                AccountsSubFilterSpec::Lamports(cmp) => {
                    predicates.push(AccountPredicate::Lamports(*cmp));
                }
            }
        }

        Ok(Self {
            accounts,
            owners,
            predicates,
            nonempty_txn_signature: spec.nonempty_txn_signature.unwrap_or(false),
        })
    }

    pub fn matches(&self, account: &AccountUpdate) -> bool {
        if !self.accounts.is_empty() && !self.accounts.contains(&account.pubkey) {
            return false;
        }
        if !self.owners.is_empty() && !self.owners.contains(&account.owner) {
            return false;
        }
        if self.nonempty_txn_signature && account.txn_signature.is_none() {
            return false;
        }
        self.predicates.iter().all(|p| p.matches(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::MemcmpSpec;
    use bytes::Bytes;
    use chainfeed_core::Signature;

    fn key(b: u8) -> Pubkey {
        Pubkey::new([b; 32])
    }

    fn account(pubkey: Pubkey, owner: Pubkey, data: &[u8], lamports: u64) -> AccountUpdate {
        AccountUpdate {
            slot: 1,
            pubkey,
            owner,
            lamports,
            executable: false,
            rent_epoch: 0,
            data: Bytes::copy_from_slice(data),
            write_version: 1,
            txn_signature: None,
            is_startup: false,
        }
    }

    fn compile(spec: AccountsFilterSpec) -> AccountsFilter {
        AccountsFilter::compile("f", &spec, &FilterLimits::default()).unwrap()
    }

    fn memcmp(offset: usize, bytes: &[u8]) -> AccountsSubFilterSpec {
        AccountsSubFilterSpec::Memcmp(MemcmpSpec {
            offset,
            data: MemcmpData::Bytes(bytes.to_vec()),
        })
    }

    #[test]
    fn owner_list_matches_owner_only() {
        let f = compile(AccountsFilterSpec {
            owner: vec![key(0xA).to_string()],
            ..Default::default()
        });
        assert!(f.matches(&account(key(1), key(0xA), &[], 0)));
        assert!(!f.matches(&account(key(1), key(0xB), &[], 0)));
    }

    #[test]
    fn empty_lists_match_everything() {
        let f = compile(AccountsFilterSpec::default());
        assert!(f.matches(&account(key(1), key(2), b"xyz", 5)));
    }

    #[test]
    fn account_and_owner_are_anded() {
        let f = compile(AccountsFilterSpec {
            account: vec![key(1).to_string()],
            owner: vec![key(0xA).to_string()],
            ..Default::default()
        });
        assert!(f.matches(&account(key(1), key(0xA), &[], 0)));
        assert!(!f.matches(&account(key(1), key(0xB), &[], 0)));
        assert!(!f.matches(&account(key(2), key(0xA), &[], 0)));
    }

    #[test]
    fn memcmp_compares_window() {
        let f = compile(AccountsFilterSpec {
            filters: vec![memcmp(2, b"cd")],
            ..Default::default()
        });
        assert!(f.matches(&account(key(1), key(2), b"abcdef", 0)));
        assert!(!f.matches(&account(key(1), key(2), b"abxxef", 0)));
    }

    #[test]
    fn memcmp_out_of_range_never_matches() {
        let f = compile(AccountsFilterSpec {
            filters: vec![memcmp(5, b"zz")],
            ..Default::default()
        });
        assert!(!f.matches(&account(key(1), key(2), b"abc", 0)));
        assert!(!f.matches(&account(key(1), key(2), b"", 0)));

        let huge = compile(AccountsFilterSpec {
            filters: vec![memcmp(usize::MAX, b"z")],
            ..Default::default()
        });
        assert!(!huge.matches(&account(key(1), key(2), b"abc", 0)));
    }

    #[test]
    fn memcmp_base58_decoded() {
        let f = compile(AccountsFilterSpec {
            filters: vec![AccountsSubFilterSpec::Memcmp(MemcmpSpec {
                offset: 0,
                data: MemcmpData::Base58(bs58::encode(b"hi").into_string()),
            })],
            ..Default::default()
        });
        assert!(f.matches(&account(key(1), key(2), b"hi there", 0)));
    }

    #[test]
    fn datasize_and_lamports_all_must_pass() {
        let f = compile(AccountsFilterSpec {
            filters: vec![
                AccountsSubFilterSpec::Datasize(3),
                AccountsSubFilterSpec::Lamports(LamportsSpec::Gt(10)),
            ],
            ..Default::default()
        });
        assert!(f.matches(&account(key(1), key(2), b"abc", 11)));
        assert!(!f.matches(&account(key(1), key(2), b"abc", 10)));
        assert!(!f.matches(&account(key(1), key(2), b"abcd", 11)));
    }

    #[test]
    fn lamports_comparisons() {
        let acc = account(key(1), key(2), b"", 100);
        assert!(AccountPredicate::Lamports(LamportsSpec::Eq(100)).matches(&acc));
        assert!(AccountPredicate::Lamports(LamportsSpec::Ne(99)).matches(&acc));
        assert!(AccountPredicate::Lamports(LamportsSpec::Lt(101)).matches(&acc));
        assert!(!AccountPredicate::Lamports(LamportsSpec::Lt(100)).matches(&acc));
    }

    #[test]
    fn nonempty_txn_signature_required() {
        let f = compile(AccountsFilterSpec {
            nonempty_txn_signature: Some(true),
            ..Default::default()
        });
        let mut acc = account(key(1), key(2), b"", 0);
        assert!(!f.matches(&acc));
        acc.txn_signature = Some(Signature::new([1; 64]));
        assert!(f.matches(&acc));
    }

    #[test]
    fn duplicate_datasize_rejected() {
        let spec = AccountsFilterSpec {
            filters: vec![
                AccountsSubFilterSpec::Datasize(1),
                AccountsSubFilterSpec::Datasize(2),
            ],
            ..Default::default()
        };
        let err = AccountsFilter::compile("f", &spec, &FilterLimits::default()).unwrap_err();
        assert!(matches!(err, FilterError::DuplicateSubFilter { sub: "datasize", .. }));
    }

    #[test]
    fn empty_and_oversized_memcmp_rejected() {
        let limits = FilterLimits::default();
        let empty = AccountsFilterSpec {
            filters: vec![memcmp(0, b"")],
            ..Default::default()
        };
        assert!(matches!(
            AccountsFilter::compile("f", &empty, &limits),
            Err(FilterError::EmptyMemcmp { .. })
        ));

        let big = AccountsFilterSpec {
            filters: vec![memcmp(0, &[1u8; 129])],
            ..Default::default()
        };
        assert!(matches!(
            AccountsFilter::compile("f", &big, &limits),
            Err(FilterError::MemcmpTooLarge { len: 129, .. })
        ));
    }

    #[test]
    fn invalid_owner_rejected() {
        let spec = AccountsFilterSpec {
            owner: vec!["not-a-key".into()],
            ..Default::default()
        };
        let err = AccountsFilter::compile("f", &spec, &FilterLimits::default()).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPubkey { field: "owner", .. }));
    }
}
