//! # chainfeed-filter
//!
//! Session subscription filters: the serde-facing [`SubscribeRequest`],
//! validation against [`FilterLimits`], and compilation into an immutable
//! [`Filter`] whose per-kind matchers are pure functions of the event.

pub mod accounts;
pub mod blocks;
pub mod data_slice;
pub mod error;
pub mod filter;
pub mod limits;
pub mod request;
pub mod slots;
pub mod token;
pub mod transactions;

pub use accounts::{AccountPredicate, AccountsFilter};
pub use blocks::{BlockSelection, BlocksFilter};
pub use data_slice::{apply_slices, DataSlice};
pub use error::FilterError;
pub use filter::Filter;
pub use limits::FilterLimits;
pub use request::{
    AccountsFilterSpec, AccountsSubFilterSpec, BlocksFilterSpec, BlocksMetaFilterSpec,
    DataSliceSpec, EntryFilterSpec, LamportsSpec, MemcmpData, MemcmpSpec, PingRequest,
    SlotsFilterSpec, SubscribeRequest, TransactionsFilterSpec,
};
pub use slots::SlotsFilter;
pub use transactions::TransactionsFilter;
