//! Commitment levels and slot status transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Durability tier a session asks for. Ordered: `Processed < Confirmed < Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    #[default]
    Processed,
    Confirmed,
    Finalized,
}

impl CommitmentLevel {
    /// All levels in ascending order.
    pub const ALL: [CommitmentLevel; 3] = [
        CommitmentLevel::Processed,
        CommitmentLevel::Confirmed,
        CommitmentLevel::Finalized,
    ];

    /// Dense index, usable for per-level arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Processed => 0,
            Self::Confirmed => 1,
            Self::Finalized => 2,
        }
    }

    /// The status a slot must reach for this level to be satisfied.
    pub fn as_status(self) -> SlotStatus {
        match self {
            Self::Processed => SlotStatus::Processed,
            Self::Confirmed => SlotStatus::Confirmed,
            Self::Finalized => SlotStatus::Finalized,
        }
    }
}

impl fmt::Display for CommitmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => write!(f, "processed"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Status reported for a slot by the upstream source.
///
/// The three commitment statuses form the main ladder. The interslot statuses
/// (`FirstShredReceived`, `Completed`, `CreatedBank`) are progress markers
/// reported before a slot is processed. `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Processed,
    Confirmed,
    Finalized,
    FirstShredReceived,
    Completed,
    CreatedBank,
    Dead,
}

impl SlotStatus {
    /// Decode the numeric status code used by the raw event feed.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Processed,
            1 => Self::Confirmed,
            2 => Self::Finalized,
            3 => Self::FirstShredReceived,
            4 => Self::Completed,
            5 => Self::CreatedBank,
            6 => Self::Dead,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Processed => 0,
            Self::Confirmed => 1,
            Self::Finalized => 2,
            Self::FirstShredReceived => 3,
            Self::Completed => 4,
            Self::CreatedBank => 5,
            Self::Dead => 6,
        }
    }

    /// Commitment level this status represents, if it is on the main ladder.
    pub fn commitment(self) -> Option<CommitmentLevel> {
        match self {
            Self::Processed => Some(CommitmentLevel::Processed),
            Self::Confirmed => Some(CommitmentLevel::Confirmed),
            Self::Finalized => Some(CommitmentLevel::Finalized),
            _ => None,
        }
    }

    /// Progress markers reported before a slot reaches `Processed`.
    pub fn is_interslot(self) -> bool {
        matches!(
            self,
            Self::FirstShredReceived | Self::Completed | Self::CreatedBank
        )
    }

    pub fn is_dead(self) -> bool {
        matches!(self, Self::Dead)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
            Self::FirstShredReceived => "first-shred-received",
            Self::Completed => "completed",
            Self::CreatedBank => "created-bank",
            Self::Dead => "dead",
        };
        f.write_str(s)
    }
}
