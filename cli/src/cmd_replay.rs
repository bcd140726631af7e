//! `chainfeed replay`: run a recorded event file through one session.

use anyhow::{bail, Context, Result};
use chainfeed_core::{FilteredUpdate, UpdateOneof};
use chainfeed_engine::{FeedEngine, JsonLinesSource, SessionError, SessionHandle};
use chainfeed_filter::SubscribeRequest;
use chainfeed_observability::FeedMetrics;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

pub async fn run(
    events: &Path,
    request: &Path,
    config: Option<&Path>,
    summary: bool,
    stats: bool,
) -> Result<()> {
    if !events.is_file() {
        bail!("event file '{}' not found", events.display());
    }
    let mut config = crate::load_config(config)?;
    // Keepalive pings would only interleave with the replayed output.
    config.ping_interval_ms = 0;
    let request: SubscribeRequest = crate::load(request)?;

    let meter = opentelemetry::global::meter("chainfeed");
    let engine = Arc::new(FeedEngine::with_recorder(
        config,
        Arc::new(FeedMetrics::new(&meter)),
    ));
    let session = engine
        .subscribe(&request)
        .context("subscribe request rejected")?;
    info!(session = %session.id(), "replaying");

    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_updates(session, done_rx, summary));

    engine
        .run_source(Arc::new(JsonLinesSource::new(events)))
        .await
        .context("replay failed")?;
    // Every released update is queued by now.
    let _ = done_tx.send(());
    let printed = printer.await.context("printer task panicked")??;

    if stats {
        let m = engine.metrics();
        eprintln!("updates printed:          {printed}");
        eprintln!("events received:          {}", m.events_received);
        eprintln!("events malformed:         {}", m.events_malformed);
        eprintln!("startup accounts skipped: {}", m.startup_accounts_skipped);
        eprintln!("stale account updates:    {}", m.stale_account_updates);
        eprintln!("slots force-evicted:      {}", m.slots_force_evicted);
        eprintln!("late events held back:    {}", m.late_events);
        eprintln!("updates sent:             {}", m.updates_sent);
    }
    Ok(())
}

/// Print updates until `done` fires, then drain whatever is still queued.
async fn print_updates(
    mut session: SessionHandle,
    mut done: oneshot::Receiver<()>,
    summary: bool,
) -> Result<u64> {
    let mut printed = 0u64;
    loop {
        tokio::select! {
            biased;
            update = session.recv() => {
                print_update(&update.map_err(closed)?, summary)?;
                printed += 1;
            }
            _ = &mut done => break,
        }
    }
    while let Some(update) = session.try_recv().map_err(closed)? {
        print_update(&update, summary)?;
        printed += 1;
    }
    Ok(printed)
}

fn closed(e: SessionError) -> anyhow::Error {
    if e.is_resource_exhausted() {
        anyhow::anyhow!("{e} (raise queue_capacity or send_grace_ms)")
    } else {
        e.into()
    }
}

fn print_update(update: &FilteredUpdate, summary: bool) -> Result<()> {
    if !summary {
        println!("{}", serde_json::to_string(update)?);
        return Ok(());
    }
    let detail = match &update.update {
        UpdateOneof::Account(a) => format!("account {} slot={} lamports={}", a.pubkey, a.slot, a.lamports),
        UpdateOneof::Slot(s) => format!("slot {} {}", s.slot, s.status),
        UpdateOneof::Transaction(t) => format!("transaction {} slot={}", t.transaction.signature, t.slot),
        UpdateOneof::TransactionStatus(t) => format!("transaction_status {} slot={}", t.signature, t.slot),
        UpdateOneof::Block(b) => format!("block {} slot={}", b.meta.blockhash, b.meta.slot),
        UpdateOneof::BlockMeta(m) => format!("block_meta {} slot={}", m.blockhash, m.slot),
        UpdateOneof::Entry(e) => format!("entry slot={} index={}", e.slot, e.index),
        UpdateOneof::Ping => "ping".to_string(),
        UpdateOneof::Pong { id } => format!("pong {id}"),
    };
    println!("[{}] {detail}", update.filters.join(","));
    Ok(())
}
