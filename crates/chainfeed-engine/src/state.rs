//! Ledger state for point lookups.
//!
//! Tracks the newest slot per commitment and a bounded window of recent
//! blocks, fed from the same normalized stream the gate sees.

use chainfeed_core::{BlockMeta, CommitmentLevel, Hash, LedgerEvent, Slot, SlotStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Blocks after which a blockhash stops being accepted.
pub const MAX_PROCESSING_AGE: u64 = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub slot: Slot,
    pub blockhash: Hash,
    pub block_height: u64,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockhashValidity {
    /// Slot the answer was computed at.
    pub slot: Slot,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub package: String,
    pub version: String,
}

impl VersionInfo {
    pub fn semver(&self) -> Result<semver::Version, semver::Error> {
        semver::Version::parse(&self.version)
    }
}

#[derive(Debug)]
struct TrackedBlock {
    info: BlockInfo,
    commitment: CommitmentLevel,
}

#[derive(Debug)]
pub struct LedgerState {
    retention: usize,
    slots: [Option<Slot>; 3],
    blocks: BTreeMap<Slot, TrackedBlock>,
    by_hash: HashMap<Hash, Slot>,
    /// Commitment reached by recent slots, including ones whose block
    /// metadata has not arrived yet.
    levels: BTreeMap<Slot, CommitmentLevel>,
    earliest: Option<Slot>,
}

impl LedgerState {
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            slots: [None; 3],
            blocks: BTreeMap::new(),
            by_hash: HashMap::new(),
            levels: BTreeMap::new(),
            earliest: None,
        }
    }

    pub fn observe(&mut self, event: &LedgerEvent) {
        let slot = event.slot();
        self.earliest = Some(self.earliest.map_or(slot, |e| e.min(slot)));
        match event {
            LedgerEvent::Slot(update) => self.on_status(slot, update.status),
            LedgerEvent::BlockMeta(meta) => self.on_block(meta),
            LedgerEvent::Block(block) => self.on_block(&block.meta),
            _ => {}
        }
    }

    fn on_status(&mut self, slot: Slot, status: SlotStatus) {
        if status.is_dead() {
            self.levels.remove(&slot);
            if let Some(block) = self.blocks.remove(&slot) {
                self.by_hash.remove(&block.info.blockhash);
            }
            return;
        }
        let Some(level) = status.commitment() else {
            return;
        };
        let newest = &mut self.slots[level.index()];
        *newest = Some(newest.map_or(slot, |s| s.max(slot)));

        let known = self.levels.entry(slot).or_insert(level);
        *known = (*known).max(level);
        let level = *known;
        if let Some(block) = self.blocks.get_mut(&slot) {
            block.commitment = level;
        }
        self.prune();
    }

    fn on_block(&mut self, meta: &BlockMeta) {
        let Some(block_height) = meta.block_height else {
            return;
        };
        let commitment = self
            .levels
            .get(&meta.slot)
            .copied()
            .unwrap_or(CommitmentLevel::Processed);
        let info = BlockInfo {
            slot: meta.slot,
            blockhash: meta.blockhash,
            block_height,
            last_valid_block_height: block_height.saturating_add(MAX_PROCESSING_AGE),
        };
        self.by_hash.insert(info.blockhash, info.slot);
        self.blocks.insert(meta.slot, TrackedBlock { info, commitment });
        self.prune();
    }

    fn prune(&mut self) {
        while self.blocks.len() > self.retention {
            if let Some((_, block)) = self.blocks.pop_first() {
                self.by_hash.remove(&block.info.blockhash);
            }
        }
        while self.levels.len() > self.retention {
            self.levels.pop_first();
        }
    }

    fn latest_block(&self, commitment: CommitmentLevel) -> Option<&BlockInfo> {
        self.blocks
            .values()
            .rev()
            .find(|b| b.commitment >= commitment)
            .map(|b| &b.info)
    }

    pub fn get_latest_blockhash(&self, commitment: CommitmentLevel) -> Option<BlockInfo> {
        self.latest_block(commitment).cloned()
    }

    pub fn get_block_height(&self, commitment: CommitmentLevel) -> Option<u64> {
        self.latest_block(commitment).map(|b| b.block_height)
    }

    pub fn get_slot(&self, commitment: CommitmentLevel) -> Option<Slot> {
        self.slots[commitment.index()]
    }

    /// `None` until a block at `commitment` is known.
    pub fn is_blockhash_valid(&self, blockhash: &Hash, commitment: CommitmentLevel) -> Option<BlockhashValidity> {
        let latest = self.latest_block(commitment)?;
        let valid = self
            .by_hash
            .get(blockhash)
            .and_then(|slot| self.blocks.get(slot))
            .is_some_and(|b| b.info.last_valid_block_height >= latest.block_height);
        Some(BlockhashValidity {
            slot: latest.slot,
            valid,
        })
    }

    pub fn get_version(&self) -> VersionInfo {
        VersionInfo {
            package: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Lowest slot observed since startup.
    pub fn earliest_available_slot(&self) -> Option<Slot> {
        self.earliest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfeed_core::SlotUpdate;
    use std::sync::Arc;

    fn meta(slot: Slot, height: u64) -> LedgerEvent {
        LedgerEvent::BlockMeta(Arc::new(BlockMeta {
            slot,
            blockhash: Hash::new([slot as u8; 32]),
            parent_slot: slot.saturating_sub(1),
            parent_blockhash: Hash::default(),
            block_time: None,
            block_height: Some(height),
            rewards: Vec::new(),
            executed_transaction_count: 0,
            updated_account_count: 0,
            entries_count: 0,
        }))
    }

    fn status(slot: Slot, status: SlotStatus) -> LedgerEvent {
        LedgerEvent::Slot(SlotUpdate {
            slot,
            parent: None,
            status,
            dead_error: None,
        })
    }

    #[test]
    fn latest_blockhash_per_commitment() {
        let mut state = LedgerState::new(10);
        state.observe(&meta(10, 100));
        state.observe(&status(10, SlotStatus::Confirmed));
        state.observe(&meta(11, 101));

        let processed = state.get_latest_blockhash(CommitmentLevel::Processed).unwrap();
        assert_eq!(processed.slot, 11);
        assert_eq!(processed.last_valid_block_height, 251);

        let confirmed = state.get_latest_blockhash(CommitmentLevel::Confirmed).unwrap();
        assert_eq!(confirmed.slot, 10);
        assert_eq!(state.get_block_height(CommitmentLevel::Confirmed), Some(100));
        assert_eq!(state.get_latest_blockhash(CommitmentLevel::Finalized), None);
    }

    #[test]
    fn status_before_block_meta_is_remembered() {
        let mut state = LedgerState::new(10);
        state.observe(&status(7, SlotStatus::Finalized));
        state.observe(&meta(7, 70));
        assert_eq!(state.get_block_height(CommitmentLevel::Finalized), Some(70));
        assert_eq!(state.get_slot(CommitmentLevel::Finalized), Some(7));
    }

    #[test]
    fn blockhash_validity_window() {
        let mut state = LedgerState::new(500);
        state.observe(&meta(1, 1));
        state.observe(&meta(2, 100));
        let hash = Hash::new([1; 32]);
        let v = state.is_blockhash_valid(&hash, CommitmentLevel::Processed).unwrap();
        assert!(v.valid);
        assert_eq!(v.slot, 2);

        state.observe(&meta(3, 152));
        assert!(!state.is_blockhash_valid(&hash, CommitmentLevel::Processed).unwrap().valid);
        assert!(!state
            .is_blockhash_valid(&Hash::new([99; 32]), CommitmentLevel::Processed)
            .unwrap()
            .valid);
    }

    #[test]
    fn extreme_block_height_saturates() {
        let mut state = LedgerState::new(10);
        state.observe(&meta(5, u64::MAX));
        let latest = state.get_latest_blockhash(CommitmentLevel::Processed).unwrap();
        assert_eq!(latest.last_valid_block_height, u64::MAX);
        assert!(state
            .is_blockhash_valid(&Hash::new([5; 32]), CommitmentLevel::Processed)
            .unwrap()
            .valid);
    }

    #[test]
    fn retention_bounds_blocks_and_dead_removes() {
        let mut state = LedgerState::new(2);
        for slot in 1..=4 {
            state.observe(&meta(slot, slot));
        }
        assert_eq!(state.blocks.len(), 2);
        state.observe(&status(4, SlotStatus::Dead));
        assert_eq!(state.get_latest_blockhash(CommitmentLevel::Processed).unwrap().slot, 3);
        assert_eq!(state.earliest_available_slot(), Some(1));
    }

    #[test]
    fn version_is_semver() {
        let state = LedgerState::new(1);
        assert!(state.get_version().semver().is_ok());
    }
}
