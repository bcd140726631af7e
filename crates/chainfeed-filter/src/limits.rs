//! Per-session filter limits.

use chainfeed_core::Pubkey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::FilterError;

/// Bounds applied when compiling a subscribe request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterLimits {
    /// Maximum named filters per kind.
    #[serde(default = "default_max_filters")]
    pub max_filters: usize,
    /// Maximum pubkeys in a single account/owner/include/exclude/required list.
    #[serde(default = "default_max_pubkeys")]
    pub max_pubkeys: usize,
    /// Maximum sub-filters (memcmp, datasize, ...) per accounts filter.
    #[serde(default = "default_max_subfilters")]
    pub max_subfilters: usize,
    /// Maximum memcmp comparison length in bytes.
    #[serde(default = "default_max_memcmp_bytes")]
    pub max_memcmp_bytes: usize,
    /// Maximum data-slice projections per session.
    #[serde(default = "default_max_data_slices")]
    pub max_data_slices: usize,
    /// Pubkeys that may not be named in `account` / `account_include` lists,
    /// typically programs whose subscription would mean the whole chain.
    #[serde(default)]
    pub account_reject: Vec<Pubkey>,
}

fn default_max_filters() -> usize { 32 }
fn default_max_pubkeys() -> usize { 10_000 }
fn default_max_subfilters() -> usize { 4 }
fn default_max_memcmp_bytes() -> usize { 128 }
fn default_max_data_slices() -> usize { 16 }

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            max_filters: default_max_filters(),
            max_pubkeys: default_max_pubkeys(),
            max_subfilters: default_max_subfilters(),
            max_memcmp_bytes: default_max_memcmp_bytes(),
            max_data_slices: default_max_data_slices(),
            account_reject: Vec::new(),
        }
    }
}

impl FilterLimits {
    pub(crate) fn check_filter_count(&self, kind: &'static str, count: usize) -> Result<(), FilterError> {
        if count > self.max_filters {
            return Err(FilterError::TooManyFilters {
                kind,
                max: self.max_filters,
            });
        }
        Ok(())
    }

    /// Parse a list of base58 pubkeys, enforcing the length limit and,
    /// when `reject` is set, the reject list.
    pub(crate) fn parse_pubkeys(
        &self,
        filter: &str,
        field: &'static str,
        values: &[String],
        reject: bool,
    ) -> Result<HashSet<Pubkey>, FilterError> {
        if values.len() > self.max_pubkeys {
            return Err(FilterError::TooManyPubkeys {
                filter: filter.to_string(),
                field,
                max: self.max_pubkeys,
            });
        }
        let mut keys = HashSet::with_capacity(values.len());
        for value in values {
            let key: Pubkey = value.parse().map_err(|source| FilterError::InvalidPubkey {
                filter: filter.to_string(),
                field,
                source,
            })?;
            if reject && self.account_reject.contains(&key) {
                return Err(FilterError::RejectedPubkey {
                    filter: filter.to_string(),
                    field,
                    pubkey: key.to_string(),
                });
            }
            keys.insert(key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_list_limit_enforced() {
        let limits = FilterLimits {
            max_pubkeys: 1,
            ..Default::default()
        };
        let values = vec![
            Pubkey::new([1; 32]).to_string(),
            Pubkey::new([2; 32]).to_string(),
        ];
        let err = limits.parse_pubkeys("f", "account", &values, true).unwrap_err();
        assert!(matches!(err, FilterError::TooManyPubkeys { max: 1, .. }));
    }

    #[test]
    fn reject_list_applies_only_when_requested() {
        let banned = Pubkey::new([3; 32]);
        let limits = FilterLimits {
            account_reject: vec![banned],
            ..Default::default()
        };
        let values = vec![banned.to_string()];
        assert!(limits.parse_pubkeys("f", "account", &values, true).is_err());
        assert!(limits.parse_pubkeys("f", "owner", &values, false).is_ok());
    }

    #[test]
    fn defaults_from_empty_json() {
        let limits: FilterLimits = serde_json::from_str("{}").unwrap();
        assert_eq!(limits.max_memcmp_bytes, 128);
        assert_eq!(limits.max_subfilters, 4);
    }
}
