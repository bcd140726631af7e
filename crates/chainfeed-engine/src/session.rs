//! Sessions and the live-session registry.
//!
//! Each session owns an immutable compiled [`Filter`] behind an `Arc`.
//! A filter update compiles the new request first and swaps the `Arc`
//! only on success, so readers always see either the old or the new
//! filter set in full. The dispatcher snapshots `Arc<Session>`s under a
//! brief read lock and never holds a lock across sessions.

use chainfeed_core::{CommitmentLevel, FilteredUpdate};
use chainfeed_filter::{Filter, FilterLimits, SubscribeRequest};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::metrics::EngineMetrics;
use crate::queue::{CloseReason, QueueReceiver, QueueSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Engine-side state of one session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    filter: RwLock<Arc<Filter>>,
    version: AtomicU64,
    queue: QueueSender,
}

impl Session {
    pub fn new(queue: QueueSender) -> Self {
        Self {
            id: SessionId::new(),
            filter: RwLock::new(Arc::new(Filter::default())),
            version: AtomicU64::new(0),
            queue,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current filter snapshot.
    pub fn filter(&self) -> Arc<Filter> {
        Arc::clone(&self.filter.read())
    }

    /// Number of successful filter replacements.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn commitment(&self) -> CommitmentLevel {
        self.filter.read().commitment()
    }

    pub fn queue(&self) -> &QueueSender {
        &self.queue
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn close(&self, reason: CloseReason) -> CloseReason {
        self.queue.close(reason)
    }

    /// Swap in a compiled filter; returns the new version.
    pub fn replace_filter(&self, filter: Filter) -> u64 {
        *self.filter.write() = Arc::new(filter);
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Apply a control message. A ping is answered with a pong and leaves
    /// the filters untouched; anything else replaces the filter set, or
    /// fails and keeps the previous one.
    pub fn apply(&self, request: &SubscribeRequest, limits: &FilterLimits) -> Result<(), SessionError> {
        if let Some(reason) = self.queue.close_reason() {
            return Err(SessionError::Closed(reason));
        }
        if let Some(ping) = request.ping {
            return self
                .queue
                .send_control(FilteredUpdate::pong(ping.id))
                .map_err(SessionError::Closed);
        }
        let filter = Filter::new(request, limits)?;
        let commitment = filter.commitment();
        let version = self.replace_filter(filter);
        debug!(session = %self.id, version, %commitment, filters = request.filter_count(), "filters replaced");
        Ok(())
    }
}

/// All live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.write().insert(session.id(), session);
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Copy of the live set; the lock is released before returning.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn drain(&self) -> Vec<Arc<Session>> {
        self.sessions.write().drain().map(|(_, s)| s).collect()
    }
}

/// Client-facing handle of an open session. Dropping it closes the session.
pub struct SessionHandle {
    session: Arc<Session>,
    receiver: QueueReceiver,
    registry: Arc<SessionRegistry>,
    metrics: Arc<EngineMetrics>,
    limits: Arc<FilterLimits>,
    keepalive: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn new(
        session: Arc<Session>,
        receiver: QueueReceiver,
        registry: Arc<SessionRegistry>,
        metrics: Arc<EngineMetrics>,
        limits: Arc<FilterLimits>,
        keepalive: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            session,
            receiver,
            registry,
            metrics,
            limits,
            keepalive,
        }
    }

    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Replace this session's filters, or answer a ping.
    pub fn subscribe(&self, request: &SubscribeRequest) -> Result<(), SessionError> {
        self.session.apply(request, &self.limits).map_err(|e| {
            if let SessionError::InvalidFilter(err) = &e {
                warn!(session = %self.id(), error = %err, "filter update rejected");
                self.metrics.filter_rejected(err.reason());
            }
            e
        })
    }

    /// Next update for this session.
    pub async fn recv(&mut self) -> Result<FilteredUpdate, SessionError> {
        self.receiver.recv().await.map_err(SessionError::Closed)
    }

    /// Non-blocking receive; `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<FilteredUpdate>, SessionError> {
        self.receiver.try_recv().map_err(SessionError::Closed)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.receiver.close_reason()
    }

    /// Close the session. Equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let reason = self.session.close(CloseReason::ClientClosed);
        if let Some(task) = self.keepalive.take() {
            task.abort();
        }
        if self.registry.remove(self.session.id()).is_some() {
            info!(session = %self.session.id(), %reason, "session closed");
            self.metrics.session_closed(reason.label());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::session_queue;
    use chainfeed_core::UpdateOneof;
    use chainfeed_filter::FilterError;

    fn session() -> (Arc<Session>, QueueReceiver) {
        let (tx, rx) = session_queue(4);
        (Arc::new(Session::new(tx)), rx)
    }

    fn request(json: &str) -> SubscribeRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn update_replaces_filter_atomically() {
        let (session, _rx) = session();
        let limits = FilterLimits::default();
        session
            .apply(&request(r#"{"slots": {"s": {}}, "commitment": "confirmed"}"#), &limits)
            .unwrap();
        assert_eq!(session.version(), 1);
        assert_eq!(session.commitment(), CommitmentLevel::Confirmed);

        let before = session.filter();
        let err = session
            .apply(&request(r#"{"accounts": {"a": {"owner": ["bogus"]}}}"#), &limits)
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidFilter(FilterError::InvalidPubkey { .. })));
        assert_eq!(session.version(), 1);
        assert!(Arc::ptr_eq(&before, &session.filter()));
    }

    #[tokio::test]
    async fn ping_answers_pong_without_touching_filters() {
        let (session, mut rx) = session();
        let limits = FilterLimits::default();
        session.apply(&request(r#"{"entry": {"e": {}}}"#), &limits).unwrap();
        session.apply(&SubscribeRequest::ping(9), &limits).unwrap();

        assert_eq!(session.version(), 1);
        assert!(!session.filter().is_empty());
        assert_eq!(rx.recv().await.unwrap().update, UpdateOneof::Pong { id: 9 });
    }

    #[test]
    fn closed_session_rejects_updates() {
        let (session, _rx) = session();
        session.close(CloseReason::ResourceExhausted);
        let err = session
            .apply(&SubscribeRequest::default(), &FilterLimits::default())
            .unwrap_err();
        assert!(err.is_resource_exhausted());
    }

    #[test]
    fn registry_snapshot_is_detached() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = session();
        let (b, _rx_b) = session();
        registry.insert(a.clone());
        registry.insert(b);
        let snapshot = registry.snapshot();
        registry.remove(a.id());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }
}
