//! `FeedEngine`: orchestrates upstream sources, the commitment gate and
//! session dispatch.

use chainfeed_core::{
    CommitmentLevel, Hash, LedgerEvent, MetricsRecorder, RawLedgerEvent, Slot,
};
use chainfeed_filter::{FilterLimits, SubscribeRequest};
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, SessionError};
use crate::gate::{CommitmentGate, GateConfig, GateOutput};
use crate::keepalive::spawn_keepalive;
use crate::metrics::{EngineMetrics, EngineMetricsSnapshot};
use crate::normalizer::Normalizer;
use crate::queue::{session_queue, CloseReason};
use crate::session::{Session, SessionHandle, SessionRegistry};
use crate::source::LedgerSource;
use crate::state::{BlockInfo, BlockhashValidity, LedgerState, VersionInfo};

/// How often the gate is checked for expired slots when no events arrive.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The top-level feed engine.
///
/// # Usage
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use chainfeed_engine::{EngineConfig, FeedEngine, JsonLinesSource};
/// use std::sync::Arc;
///
/// let mut engine = FeedEngine::new(EngineConfig::default());
/// engine.add_source(Arc::new(JsonLinesSource::new("events.jsonl")));
/// let engine = Arc::new(engine);
///
/// let request = serde_json::from_str(r#"{"slots": {"all": {}}}"#)?;
/// let mut session = engine.subscribe(&request)?;
/// let _tasks = Arc::clone(&engine).run();
/// while let Ok(update) = session.recv().await {
///     println!("{:?} {:?}", update.filters, update.update);
/// }
/// # Ok(())
/// # }
/// ```
pub struct FeedEngine {
    config: EngineConfig,
    normalizer: Normalizer,
    /// Held across gate push and dispatch so releases reach every queue in
    /// gate order.
    gate: Mutex<CommitmentGate>,
    registry: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
    state: RwLock<LedgerState>,
    metrics: Arc<EngineMetrics>,
    limits: Arc<FilterLimits>,
    sources: Vec<Arc<dyn LedgerSource>>,
    shutdown: watch::Sender<bool>,
}

impl FeedEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_metrics(config, Arc::new(EngineMetrics::default()))
    }

    /// Create an engine that forwards every counter increment to `recorder`.
    pub fn with_recorder(config: EngineConfig, recorder: Arc<dyn MetricsRecorder>) -> Self {
        Self::with_metrics(config, Arc::new(EngineMetrics::new(recorder)))
    }

    fn with_metrics(config: EngineConfig, metrics: Arc<EngineMetrics>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
            config.parallel_match_threshold,
            config.send_grace(),
        );
        let (shutdown, _) = watch::channel(false);
        Self {
            normalizer: Normalizer::new(config.include_startup_accounts),
            gate: Mutex::new(CommitmentGate::new(GateConfig::from(&config))),
            registry,
            dispatcher,
            state: RwLock::new(LedgerState::new(config.blockhash_retention)),
            metrics,
            limits: Arc::new(config.limits.clone()),
            sources: Vec::new(),
            shutdown,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an upstream source. Sources start on [`run`](Self::run).
    pub fn add_source(&mut self, source: Arc<dyn LedgerSource>) {
        self.sources.push(source);
    }

    /// Returns a snapshot of current metrics.
    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    // ─── Sessions ────────────────────────────────────────────────────────────

    /// Open a session with an empty filter set. Must be called inside a
    /// Tokio runtime when keepalive pings are enabled.
    pub fn open_session(&self) -> SessionHandle {
        let (tx, rx) = session_queue(self.config.queue_capacity);
        let session = Arc::new(Session::new(tx));

        let keepalive = if self.is_shutting_down() {
            session.close(CloseReason::EngineShutdown);
            None
        } else {
            self.registry.insert(Arc::clone(&session));
            self.metrics.session_opened();
            info!(session = %session.id(), sessions = self.registry.len(), "session opened");
            self.config
                .ping_interval()
                .map(|interval| spawn_keepalive(Arc::clone(&session), interval))
        };

        SessionHandle::new(
            session,
            rx,
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            Arc::clone(&self.limits),
            keepalive,
        )
    }

    /// Open a session and install `request` as its first filter set.
    pub fn subscribe(&self, request: &SubscribeRequest) -> Result<SessionHandle, SessionError> {
        let handle = self.open_session();
        handle.subscribe(request)?;
        Ok(handle)
    }

    // ─── Ingest ──────────────────────────────────────────────────────────────

    /// Normalize one raw event and push it through the gate. Malformed
    /// events are logged, counted and dropped.
    pub async fn ingest(&self, raw: RawLedgerEvent) {
        self.metrics.event_received();
        let kind = raw.label();
        match self.normalizer.normalize(raw) {
            Ok(Some(event)) => self.ingest_event(event).await,
            Ok(None) => self.metrics.startup_account_skipped(),
            Err(e) => {
                warn!(kind, error = %e, "dropping malformed event");
                self.metrics.malformed_event(kind, e.reason());
            }
        }
    }

    /// Push an already-normalized event through the gate and dispatch
    /// whatever it releases.
    pub async fn ingest_event(&self, event: LedgerEvent) {
        self.state.write().observe(&event);

        let mut gate = self.gate.lock().await;
        let sessions = self.registry.snapshot();
        let max_required = sessions
            .iter()
            .filter(|s| !s.is_closed())
            .map(|s| s.commitment())
            .max()
            .unwrap_or(CommitmentLevel::Processed);

        let out = gate.push(event, Instant::now(), max_required);
        self.release(&sessions, out).await;
    }

    /// Force-evict expired slots. Called periodically by [`run`](Self::run).
    pub async fn tick(&self) {
        let mut gate = self.gate.lock().await;
        let out = gate.tick(Instant::now());
        if out.is_empty() {
            return;
        }
        let sessions = self.registry.snapshot();
        self.release(&sessions, out).await;
    }

    async fn release(&self, sessions: &[Arc<Session>], out: GateOutput) {
        if out.stale_dropped > 0 {
            debug!(count = out.stale_dropped, "stale account updates dropped");
            self.metrics.stale_account_updates(out.stale_dropped);
        }
        for slot in &out.force_evicted {
            self.metrics.slot_force_evicted(*slot);
        }
        for level in &out.late {
            self.metrics.late_event(*level);
        }
        self.dispatcher.dispatch(sessions, out.released).await;
    }

    // ─── Sources ─────────────────────────────────────────────────────────────

    /// Start the engine. Spawns one Tokio task per source plus the gate
    /// ticker and returns their handles immediately.
    pub fn run(self: Arc<Self>) -> Vec<JoinHandle<Result<(), EngineError>>> {
        info!(sources = self.sources.len(), "FeedEngine starting");

        let mut tasks: Vec<JoinHandle<Result<(), EngineError>>> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let engine = Arc::clone(&self);
                tokio::spawn(async move { engine.run_source(source).await })
            })
            .collect();

        let engine = Arc::clone(&self);
        tasks.push(tokio::spawn(async move {
            let mut shutdown = engine.shutdown.subscribe();
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.tick().await,
                    _ = stopped(&mut shutdown) => return Ok(()),
                }
            }
        }));
        tasks
    }

    /// Drive one source until it ends (replay sources), retries run out, or
    /// the engine shuts down.
    pub async fn run_source(&self, source: Arc<dyn LedgerSource>) -> Result<(), EngineError> {
        let name = source.name().to_string();
        let mut shutdown = self.shutdown.subscribe();
        let mut retry = 0u32;

        loop {
            if self.is_shutting_down() {
                return Err(EngineError::ShuttingDown);
            }
            info!(source = %name, "connecting source");
            let mut stream = match source.subscribe().await {
                Ok(stream) => {
                    retry = 0;
                    stream
                }
                Err(e) if e.is_retryable() => {
                    error!(source = %name, error = %e, retry, "source connect error");
                    retry += 1;
                    if self.config.max_retries > 0 && retry > self.config.max_retries {
                        return Err(EngineError::RetriesExhausted {
                            source_name: name,
                            retries: self.config.max_retries,
                        });
                    }
                    self.metrics.reconnection();
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.backoff(retry)) => continue,
                        _ = stopped(&mut shutdown) => return Err(EngineError::ShuttingDown),
                    }
                }
                Err(e) => return Err(e.into()),
            };

            loop {
                let item = tokio::select! {
                    item = stream.next() => item,
                    _ = stopped(&mut shutdown) => return Err(EngineError::ShuttingDown),
                };
                match item {
                    None => break,
                    Some(Ok(raw)) => self.ingest(raw).await,
                    Some(Err(e)) if e.is_retryable() => {
                        warn!(source = %name, error = %e, "source stream error");
                        if source.is_replay() {
                            return Err(e.into());
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(source = %name, error = %e, "dropping undecodable source record");
                        self.metrics.event_received();
                        self.metrics.malformed_event("source", "decode");
                    }
                }
            }

            if source.is_replay() {
                info!(source = %name, "replay finished");
                return Ok(());
            }
            info!(source = %name, "source stream closed, reconnecting");
            self.metrics.reconnection();
            tokio::select! {
                _ = tokio::time::sleep(self.config.backoff(retry)) => {}
                _ = shutdown.wait_for(|stop| *stop) => return Err(EngineError::ShuttingDown),
            }
        }
    }

    /// Stop all source loops and close every session with
    /// [`CloseReason::EngineShutdown`].
    pub fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        let sessions = self.registry.drain();
        info!(sessions = sessions.len(), "FeedEngine shutting down");
        for session in sessions {
            let reason = session.close(CloseReason::EngineShutdown);
            self.metrics.session_closed(reason.label());
        }
    }

    // ─── Point lookups ───────────────────────────────────────────────────────

    pub fn get_latest_blockhash(&self, commitment: CommitmentLevel) -> Option<BlockInfo> {
        self.state.read().get_latest_blockhash(commitment)
    }

    pub fn get_block_height(&self, commitment: CommitmentLevel) -> Option<u64> {
        self.state.read().get_block_height(commitment)
    }

    pub fn get_slot(&self, commitment: CommitmentLevel) -> Option<Slot> {
        self.state.read().get_slot(commitment)
    }

    pub fn is_blockhash_valid(
        &self,
        blockhash: &Hash,
        commitment: CommitmentLevel,
    ) -> Option<BlockhashValidity> {
        self.state.read().is_blockhash_valid(blockhash, commitment)
    }

    pub fn get_version(&self) -> VersionInfo {
        self.state.read().get_version()
    }

    pub fn earliest_available_slot(&self) -> Option<Slot> {
        self.state.read().earliest_available_slot()
    }

    /// Unary liveness probe; echoes `count`.
    pub fn ping(&self, count: u32) -> u32 {
        count
    }
}

/// Resolves once the shutdown flag is set.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

impl std::fmt::Debug for FeedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEngine")
            .field("sources", &self.sources.len())
            .field("sessions", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawEventStream;
    use async_trait::async_trait;
    use chainfeed_core::{
        raw::{RawBlockMeta, RawSlot},
        SourceError,
    };
    use futures::stream;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn slot(slot: u64, status: u8) -> RawLedgerEvent {
        RawLedgerEvent::Slot(RawSlot {
            slot,
            parent: None,
            status,
            dead_error: None,
        })
    }

    /// Fails to connect `failures` times, then streams `events` once.
    struct Flaky {
        failures: u32,
        attempts: AtomicU32,
        events: Vec<RawLedgerEvent>,
    }

    #[async_trait]
    impl LedgerSource for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn subscribe(&self) -> Result<RawEventStream, SourceError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(SourceError::ConnectionFailed {
                    source_name: "flaky".into(),
                    reason: "refused".into(),
                });
            }
            let items: Vec<Result<RawLedgerEvent, SourceError>> =
                self.events.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn is_replay(&self) -> bool {
            true
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            ping_interval_ms: 0,
            backoff_ms: 1,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn reconnects_until_source_answers() {
        let engine = FeedEngine::new(config());
        let source = Arc::new(Flaky {
            failures: 2,
            attempts: AtomicU32::new(0),
            events: vec![slot(5, 0), slot(5, 1)],
        });
        engine.run_source(source.clone()).await.unwrap();

        let metrics = engine.metrics();
        assert_eq!(source.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.reconnections, 2);
        assert_eq!(metrics.events_received, 2);
        assert_eq!(engine.get_slot(CommitmentLevel::Confirmed), Some(5));
    }

    #[tokio::test]
    async fn retries_exhausted() {
        let engine = FeedEngine::new(EngineConfig {
            max_retries: 2,
            ..config()
        });
        let source = Arc::new(Flaky {
            failures: u32::MAX,
            attempts: AtomicU32::new(0),
            events: Vec::new(),
        });
        let err = engine.run_source(source).await.unwrap_err();
        assert!(matches!(err, EngineError::RetriesExhausted { retries: 2, .. }));
    }

    /// Streams `events` and then stays connected without sending more.
    struct Live {
        events: Vec<RawLedgerEvent>,
    }

    #[async_trait]
    impl LedgerSource for Live {
        fn name(&self) -> &str {
            "live"
        }

        async fn subscribe(&self) -> Result<RawEventStream, SourceError> {
            let items: Vec<Result<RawLedgerEvent, SourceError>> =
                self.events.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(items).chain(stream::pending())))
        }
    }

    #[tokio::test]
    async fn run_delivers_then_stops_on_shutdown() {
        let mut engine = FeedEngine::new(config());
        engine.add_source(Arc::new(Live {
            events: vec![slot(8, 0), slot(8, 1)],
        }));
        let engine = Arc::new(engine);
        let mut handle = engine
            .subscribe(&serde_json::from_str(r#"{"slots": {"s": {}}}"#).unwrap())
            .unwrap();

        let tasks = Arc::clone(&engine).run();
        assert_eq!(tasks.len(), 2);
        for _ in 0..2 {
            let update = tokio::time::timeout(Duration::from_secs(5), handle.recv())
                .await
                .expect("update before timeout")
                .unwrap();
            assert_eq!(update.filters, vec!["s"]);
        }

        engine.shutdown();
        let mut results = Vec::new();
        for task in tasks {
            let result = tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .expect("task stops after shutdown")
                .unwrap();
            results.push(result);
        }
        assert!(matches!(results[0], Err(EngineError::ShuttingDown)));
        assert!(results[1].is_ok());
        assert_eq!(engine.metrics().events_received, 2);
    }

    #[tokio::test]
    async fn extreme_block_height_does_not_stop_ingest() {
        let engine = FeedEngine::new(config());
        let hash = chainfeed_core::Hash::new([3; 32]);
        engine
            .ingest(RawLedgerEvent::BlockMeta(RawBlockMeta {
                slot: 9,
                blockhash: hash.to_string(),
                parent_slot: 8,
                parent_blockhash: chainfeed_core::Hash::new([2; 32]).to_string(),
                block_time: None,
                block_height: Some(u64::MAX),
                rewards: Vec::new(),
                executed_transaction_count: 0,
                updated_account_count: 0,
                entries_count: 0,
            }))
            .await;

        assert_eq!(engine.get_block_height(CommitmentLevel::Processed), Some(u64::MAX));
        let validity = engine
            .is_blockhash_valid(&hash, CommitmentLevel::Processed)
            .unwrap();
        assert!(validity.valid);

        engine.ingest(slot(10, 0)).await;
        assert_eq!(engine.get_slot(CommitmentLevel::Processed), Some(10));
    }

    #[tokio::test]
    async fn shutdown_closes_sessions() {
        let engine = FeedEngine::new(config());
        let mut handle = engine.open_session();
        assert_eq!(engine.session_count(), 1);

        engine.shutdown();
        assert!(engine.is_shutting_down());
        assert_eq!(engine.session_count(), 0);
        let err = handle.recv().await.unwrap_err();
        assert_eq!(err, SessionError::Closed(CloseReason::EngineShutdown));

        let late = engine.open_session();
        assert_eq!(late.close_reason(), Some(CloseReason::EngineShutdown));
        assert_eq!(engine.metrics().sessions_closed, 1);
    }

    #[tokio::test]
    async fn dropping_handle_unregisters() {
        let engine = FeedEngine::new(config());
        let handle = engine.open_session();
        assert_eq!(engine.session_count(), 1);
        drop(handle);
        assert_eq!(engine.session_count(), 0);
        assert_eq!(engine.metrics().sessions_closed, 1);
    }

    #[test]
    fn ping_echoes_count() {
        let engine = FeedEngine::new(config());
        assert_eq!(engine.ping(42), 42);
        assert_eq!(engine.get_version().package, "chainfeed-engine");
    }
}
