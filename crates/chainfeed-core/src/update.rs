//! Outbound messages delivered to sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::event::{
    AccountUpdate, Block, BlockMeta, EntryUpdate, EventKind, SlotUpdate, TransactionStatusUpdate,
    TransactionUpdate,
};

/// Payload of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UpdateOneof {
    Account(Arc<AccountUpdate>),
    Slot(SlotUpdate),
    Transaction(TransactionUpdate),
    TransactionStatus(TransactionStatusUpdate),
    Block(Arc<Block>),
    BlockMeta(Arc<BlockMeta>),
    Entry(Arc<EntryUpdate>),
    /// Server-initiated keepalive.
    Ping,
    /// Reply to a client liveness probe, echoing its id.
    Pong { id: i32 },
}

impl UpdateOneof {
    /// The event kind carried, or `None` for keepalive traffic.
    pub fn kind(&self) -> Option<EventKind> {
        Some(match self {
            Self::Account(_) => EventKind::Account,
            Self::Slot(_) => EventKind::Slot,
            Self::Transaction(_) => EventKind::Transaction,
            Self::TransactionStatus(_) => EventKind::TransactionStatus,
            Self::Block(_) => EventKind::Block,
            Self::BlockMeta(_) => EventKind::BlockMeta,
            Self::Entry(_) => EventKind::Entry,
            Self::Ping | Self::Pong { .. } => return None,
        })
    }

    pub fn is_keepalive(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong { .. })
    }
}

/// An event tagged with the names of every session filter that matched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredUpdate {
    /// Matching filter names, deduplicated, in registration order.
    pub filters: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub update: UpdateOneof,
}

impl FilteredUpdate {
    pub fn new(filters: Vec<String>, update: UpdateOneof) -> Self {
        Self {
            filters,
            created_at: Utc::now(),
            update,
        }
    }

    pub fn ping() -> Self {
        Self::new(Vec::new(), UpdateOneof::Ping)
    }

    pub fn pong(id: i32) -> Self {
        Self::new(Vec::new(), UpdateOneof::Pong { id })
    }

    /// Returns `true` if `name` is among the matched filters.
    pub fn matched(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f == name)
    }
}
