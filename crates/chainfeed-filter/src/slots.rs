//! Slots matcher.

use chainfeed_core::{CommitmentLevel, SlotStatus, SlotUpdate};

use crate::request::SlotsFilterSpec;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotsFilter {
    pub filter_by_commitment: bool,
    pub interslot_updates: bool,
}

impl SlotsFilter {
    pub fn compile(spec: &SlotsFilterSpec) -> Self {
        Self {
            filter_by_commitment: spec.filter_by_commitment.unwrap_or(false),
            interslot_updates: spec.interslot_updates.unwrap_or(false),
        }
    }

    /// Whether a slot status transition is delivered to a session whose
    /// minimum commitment is `commitment`.
    ///
    /// Interslot progress and dead slots carry no commitment, so a filter
    /// restricted to the commitment ladder never sees them.
    pub fn matches(&self, update: &SlotUpdate, commitment: CommitmentLevel) -> bool {
        match update.status.commitment() {
            Some(level) => !self.filter_by_commitment || level >= commitment,
            None if update.status == SlotStatus::Dead => !self.filter_by_commitment,
            None => self.interslot_updates && !self.filter_by_commitment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(status: SlotStatus) -> SlotUpdate {
        SlotUpdate {
            slot: 10,
            parent: Some(9),
            status,
            dead_error: None,
        }
    }

    fn filter(by_commitment: bool, interslot: bool) -> SlotsFilter {
        SlotsFilter::compile(&SlotsFilterSpec {
            filter_by_commitment: Some(by_commitment),
            interslot_updates: Some(interslot),
        })
    }

    #[test]
    fn unrestricted_filter_sees_every_ladder_status() {
        let f = filter(false, false);
        for status in [SlotStatus::Processed, SlotStatus::Confirmed, SlotStatus::Finalized] {
            assert!(f.matches(&slot(status), CommitmentLevel::Finalized));
        }
        assert!(f.matches(&slot(SlotStatus::Dead), CommitmentLevel::Processed));
    }

    #[test]
    fn commitment_filter_drops_lower_statuses() {
        let f = filter(true, false);
        assert!(!f.matches(&slot(SlotStatus::Processed), CommitmentLevel::Confirmed));
        assert!(f.matches(&slot(SlotStatus::Confirmed), CommitmentLevel::Confirmed));
        assert!(f.matches(&slot(SlotStatus::Finalized), CommitmentLevel::Confirmed));
        assert!(!f.matches(&slot(SlotStatus::Dead), CommitmentLevel::Processed));
    }

    #[test]
    fn interslot_only_when_requested_and_unrestricted() {
        let status = SlotStatus::FirstShredReceived;
        assert!(!filter(false, false).matches(&slot(status), CommitmentLevel::Processed));
        assert!(filter(false, true).matches(&slot(status), CommitmentLevel::Processed));
        assert!(!filter(true, true).matches(&slot(status), CommitmentLevel::Processed));
    }

    #[test]
    fn defaults_are_permissive_for_ladder_only() {
        let f = SlotsFilter::compile(&SlotsFilterSpec::default());
        assert!(f.matches(&slot(SlotStatus::Processed), CommitmentLevel::Finalized));
        assert!(!f.matches(&slot(SlotStatus::Completed), CommitmentLevel::Processed));
    }
}
