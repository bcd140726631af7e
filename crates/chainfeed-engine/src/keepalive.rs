//! Server-initiated keepalive pings.

use chainfeed_core::FilteredUpdate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::session::Session;

/// Spawn a task that pings `session` every `interval` through the control
/// lane. The task ends when the session closes.
pub fn spawn_keepalive(session: Arc<Session>, interval: Duration) -> JoinHandle<()> {
    let mut closed = session.queue().closed();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if session.queue().send_control(FilteredUpdate::ping()).is_err() {
                        break;
                    }
                }
                changed = closed.changed() => {
                    if changed.is_err() || closed.borrow().is_some() {
                        break;
                    }
                }
            }
        }
        debug!(session = %session.id(), "keepalive stopped");
    })
}
