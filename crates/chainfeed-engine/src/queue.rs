//! Per-session output queue.
//!
//! Matched updates go through a bounded channel; a full channel closes the
//! session with [`CloseReason::ResourceExhausted`] instead of dropping the
//! update. Keepalive traffic (pings, pongs) uses a separate unbounded lane
//! that is always drained first and never counts against capacity.

use chainfeed_core::FilteredUpdate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::{
    self,
    error::{SendTimeoutError, TrySendError},
};
use tokio::sync::watch;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client did not drain its queue fast enough.
    ResourceExhausted,
    ClientClosed,
    EngineShutdown,
}

impl CloseReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::ResourceExhausted => "resource_exhausted",
            Self::ClientClosed => "client_closed",
            Self::EngineShutdown => "engine_shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Create a queue holding at most `capacity` matched updates.
pub fn session_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (updates_tx, updates_rx) = mpsc::channel(capacity.max(1));
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(None);
    (
        QueueSender {
            updates: updates_tx,
            control: control_tx,
            closed: closed_tx,
        },
        QueueReceiver {
            updates: updates_rx,
            control: control_rx,
            closed: closed_rx,
        },
    )
}

/// Engine side of a session queue.
#[derive(Debug)]
pub struct QueueSender {
    updates: mpsc::Sender<FilteredUpdate>,
    control: mpsc::UnboundedSender<FilteredUpdate>,
    closed: watch::Sender<Option<CloseReason>>,
}

impl QueueSender {
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.closed.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.close_reason().is_some()
    }

    /// Close the queue. The first reason wins; returns the effective one.
    pub fn close(&self, reason: CloseReason) -> CloseReason {
        self.closed.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        self.close_reason().unwrap_or(reason)
    }

    /// Watch the close signal.
    pub fn closed(&self) -> watch::Receiver<Option<CloseReason>> {
        self.closed.subscribe()
    }

    /// Enqueue a matched update, waiting at most `grace` for room. On
    /// failure the queue is closed and the reason returned.
    pub async fn send(&self, update: FilteredUpdate, grace: Duration) -> Result<(), CloseReason> {
        if let Some(reason) = self.close_reason() {
            return Err(reason);
        }
        match self.updates.try_send(update) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(self.close(CloseReason::ClientClosed)),
            Err(TrySendError::Full(_)) if grace.is_zero() => {
                Err(self.close(CloseReason::ResourceExhausted))
            }
            Err(TrySendError::Full(update)) => match self.updates.send_timeout(update, grace).await {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(self.close(CloseReason::ResourceExhausted)),
                Err(SendTimeoutError::Closed(_)) => Err(self.close(CloseReason::ClientClosed)),
            },
        }
    }

    /// Enqueue keepalive traffic, bypassing capacity.
    pub fn send_control(&self, update: FilteredUpdate) -> Result<(), CloseReason> {
        if let Some(reason) = self.close_reason() {
            return Err(reason);
        }
        self.control
            .send(update)
            .map_err(|_| self.close(CloseReason::ClientClosed))
    }
}

/// Client side of a session queue.
#[derive(Debug)]
pub struct QueueReceiver {
    updates: mpsc::Receiver<FilteredUpdate>,
    control: mpsc::UnboundedReceiver<FilteredUpdate>,
    closed: watch::Receiver<Option<CloseReason>>,
}

impl QueueReceiver {
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.closed.borrow()
    }

    /// Next message: keepalive traffic first, then matched updates in FIFO
    /// order. Once the queue is closed, returns the close reason; anything
    /// still buffered is discarded.
    pub async fn recv(&mut self) -> Result<FilteredUpdate, CloseReason> {
        loop {
            if let Some(reason) = self.close_reason() {
                return Err(reason);
            }
            tokio::select! {
                biased;
                changed = self.closed.changed() => {
                    if changed.is_err() {
                        return Err(self.close_reason().unwrap_or(CloseReason::EngineShutdown));
                    }
                }
                Some(update) = self.control.recv() => return Ok(update),
                update = self.updates.recv() => {
                    return update.ok_or_else(|| {
                        self.close_reason().unwrap_or(CloseReason::EngineShutdown)
                    });
                }
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `Ok(None)` means
    /// nothing is queued right now.
    pub fn try_recv(&mut self) -> Result<Option<FilteredUpdate>, CloseReason> {
        if let Some(reason) = self.close_reason() {
            return Err(reason);
        }
        if let Ok(update) = self.control.try_recv() {
            return Ok(Some(update));
        }
        match self.updates.try_recv() {
            Ok(update) => Ok(Some(update)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(self.close_reason().unwrap_or(CloseReason::EngineShutdown))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfeed_core::UpdateOneof;

    fn update(n: i32) -> FilteredUpdate {
        FilteredUpdate::new(vec![format!("f{n}")], UpdateOneof::Pong { id: n })
    }

    #[tokio::test]
    async fn overflow_closes_with_resource_exhausted() {
        let (tx, mut rx) = session_queue(2);
        tx.send(update(1), Duration::ZERO).await.unwrap();
        tx.send(update(2), Duration::ZERO).await.unwrap();
        let err = tx.send(update(3), Duration::ZERO).await.unwrap_err();
        assert_eq!(err, CloseReason::ResourceExhausted);
        assert_eq!(rx.recv().await.unwrap_err(), CloseReason::ResourceExhausted);
    }

    #[tokio::test]
    async fn grace_allows_consumer_to_catch_up() {
        let (tx, mut rx) = session_queue(1);
        tx.send(update(1), Duration::ZERO).await.unwrap();
        let consumer = tokio::spawn(async move {
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            (first, second)
        });
        tx.send(update(2), Duration::from_secs(5)).await.unwrap();
        let (first, second) = consumer.await.unwrap();
        assert_eq!(first.filters, vec!["f1"]);
        assert_eq!(second.filters, vec!["f2"]);
    }

    #[tokio::test]
    async fn control_lane_bypasses_capacity_and_goes_first() {
        let (tx, mut rx) = session_queue(1);
        tx.send(update(1), Duration::ZERO).await.unwrap();
        for id in 0..10 {
            tx.send_control(FilteredUpdate::pong(id)).unwrap();
        }
        assert_eq!(rx.recv().await.unwrap().update, UpdateOneof::Pong { id: 0 });
        assert!(!tx.is_closed());
    }

    #[tokio::test]
    async fn first_close_reason_wins() {
        let (tx, rx) = session_queue(1);
        assert_eq!(tx.close(CloseReason::ClientClosed), CloseReason::ClientClosed);
        assert_eq!(tx.close(CloseReason::EngineShutdown), CloseReason::ClientClosed);
        assert_eq!(rx.close_reason(), Some(CloseReason::ClientClosed));
        assert!(tx.send(update(1), Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn dropped_sender_ends_stream() {
        let (tx, mut rx) = session_queue(1);
        drop(tx);
        assert_eq!(rx.recv().await.unwrap_err(), CloseReason::EngineShutdown);
    }

    #[test]
    fn try_recv_reports_empty() {
        let (_tx, mut rx) = session_queue(1);
        assert_eq!(rx.try_recv().unwrap(), None);
    }
}
