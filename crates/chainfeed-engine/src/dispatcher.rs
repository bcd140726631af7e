//! Dispatcher: released events → per-session output queues.
//!
//! Matching is pure and runs against per-session filter snapshots, on the
//! rayon pool once the session count reaches the configured threshold.
//! Enqueueing is sequential so each session sees its updates in release
//! order.

use chainfeed_core::{CommitmentLevel, FilteredUpdate, LedgerEvent};
use chainfeed_filter::Filter;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::metrics::EngineMetrics;
use crate::queue::CloseReason;
use crate::session::{Session, SessionRegistry};

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    metrics: Arc<EngineMetrics>,
    parallel_match_threshold: usize,
    send_grace: Duration,
}

/// A session paired with the filter snapshot used for one dispatch pass.
type Target = (Arc<Session>, Arc<Filter>);

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        metrics: Arc<EngineMetrics>,
        parallel_match_threshold: usize,
        send_grace: Duration,
    ) -> Self {
        Self {
            registry,
            metrics,
            parallel_match_threshold,
            send_grace,
        }
    }

    /// Deliver every released event to the sessions of its band whose
    /// filters match it.
    pub async fn dispatch(
        &self,
        sessions: &[Arc<Session>],
        released: Vec<(CommitmentLevel, LedgerEvent)>,
    ) {
        if released.is_empty() {
            return;
        }
        let targets: Vec<Target> = sessions
            .iter()
            .filter(|s| !s.is_closed())
            .map(|s| (Arc::clone(s), s.filter()))
            .collect();
        if targets.is_empty() {
            return;
        }

        for (level, event) in released {
            for (index, updates) in self.match_event(&targets, level, &event) {
                let session = &targets[index].0;
                for update in updates {
                    let kind = update.update.kind();
                    match session.queue().send(update, self.send_grace).await {
                        Ok(()) => self.metrics.update_sent(kind),
                        Err(reason) => {
                            self.drop_session(session, reason);
                            break;
                        }
                    }
                }
            }
        }
    }

    fn match_event(
        &self,
        targets: &[Target],
        level: CommitmentLevel,
        event: &LedgerEvent,
    ) -> Vec<(usize, Vec<FilteredUpdate>)> {
        let eval = |(index, (session, filter)): (usize, &Target)| {
            if filter.commitment() != level || session.is_closed() {
                return None;
            }
            let updates = filter.get_updates(event);
            (!updates.is_empty()).then_some((index, updates))
        };
        if targets.len() >= self.parallel_match_threshold {
            targets.par_iter().enumerate().filter_map(&eval).collect()
        } else {
            targets.iter().enumerate().filter_map(&eval).collect()
        }
    }

    fn drop_session(&self, session: &Session, reason: CloseReason) {
        if self.registry.remove(session.id()).is_none() {
            return;
        }
        match reason {
            CloseReason::ResourceExhausted => {
                warn!(session = %session.id(), "session queue full, dropping session");
                self.metrics.session_dropped_backpressure();
            }
            other => {
                info!(session = %session.id(), reason = %other, "session closed");
                self.metrics.session_closed(other.label());
            }
        }
    }
}
