//! Commitment gate.
//!
//! Holds normalized events per slot and releases them to each commitment
//! band once the slot reaches that level:
//!
//! ```text
//! event ──► processed band (immediately)
//!       └─► slot buffer ──(slot confirmed)──► confirmed band
//!                       └─(slot finalized)──► finalized band
//! ```
//!
//! Each slot moves `Processed → Confirmed → Finalized`, or to `Dead` from
//! any level below `Confirmed`. Dead slot content is never released above
//! the processed band. Slots that neither finalize nor die within
//! `max_slot_lag` newer slots or `max_slot_age` are force-evicted.
//!
//! Slot order never goes down within the confirmed and finalized bands.
//! Content for a slot older than one a band has already released is held
//! back from that band and reported in [`GateOutput::late`]. The processed
//! band follows source arrival order.

use chainfeed_core::{CommitmentLevel, LedgerEvent, Pubkey, Slot, SlotStatus, SlotUpdate};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::EngineConfig;

/// Reason attached to synthetic dead statuses for force-evicted slots.
pub const FORCE_EVICTED_REASON: &str = "slot force-evicted before finalization";

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub max_slot_lag: u64,
    pub max_slot_age: Duration,
    pub emit_synthetic_dead: bool,
}

impl From<&EngineConfig> for GateConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            max_slot_lag: cfg.max_slot_lag,
            max_slot_age: cfg.max_slot_age(),
            emit_synthetic_dead: cfg.emit_synthetic_dead,
        }
    }
}

/// Everything one gate step produced.
#[derive(Debug, Default)]
pub struct GateOutput {
    /// Events to dispatch, each tagged with the band it is released to.
    /// Order within a band is delivery order.
    pub released: Vec<(CommitmentLevel, LedgerEvent)>,
    /// Account updates dropped for a non-increasing write version.
    pub stale_dropped: u64,
    /// Slots evicted before reaching a terminal status.
    pub force_evicted: Vec<Slot>,
    /// One entry per event held back from a band that had moved past its slot.
    pub late: Vec<CommitmentLevel>,
}

impl GateOutput {
    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
            && self.stale_dropped == 0
            && self.force_evicted.is_empty()
            && self.late.is_empty()
    }

    fn release(&mut self, cursor: &mut BandCursor, level: CommitmentLevel, event: LedgerEvent) {
        let slot = event.slot();
        if cursor.admit(level, slot) {
            self.released.push((level, event));
        } else {
            debug!(slot, ?level, kind = %event.kind(), "late event held back from band");
            self.late.push(level);
        }
    }
}

/// Highest slot released so far to the confirmed and finalized bands.
#[derive(Debug, Default)]
struct BandCursor {
    high: [Option<Slot>; 2],
}

impl BandCursor {
    /// Whether `slot` can go out on `level` without moving the band
    /// backwards. Advances the band when it can.
    fn admit(&mut self, level: CommitmentLevel, slot: Slot) -> bool {
        if level == CommitmentLevel::Processed {
            return true;
        }
        let high = &mut self.high[level.index() - 1];
        if high.is_some_and(|newest| slot < newest) {
            return false;
        }
        *high = Some(slot);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    /// Waiting for the slot to reach this level.
    Pending,
    Released,
    /// No live session needed this level when the slot was buffered.
    Skipped,
}

#[derive(Debug)]
struct SlotEntry {
    parent: Option<Slot>,
    level: Option<CommitmentLevel>,
    dead: bool,
    /// Ladder statuses already delivered as events.
    reported: [bool; 3],
    /// Confirmed and finalized band states; processed is always released.
    bands: [Band; 2],
    events: Vec<LedgerEvent>,
    write_versions: HashMap<Pubkey, u64>,
    created: Instant,
}

impl SlotEntry {
    fn new(now: Instant) -> Self {
        Self {
            parent: None,
            level: None,
            dead: false,
            reported: [false; 3],
            bands: [Band::Pending; 2],
            events: Vec::new(),
            write_versions: HashMap::new(),
            created: now,
        }
    }

    fn band(&self, level: CommitmentLevel) -> Band {
        match level {
            CommitmentLevel::Processed => Band::Released,
            other => self.bands[other.index() - 1],
        }
    }

    fn set_band(&mut self, level: CommitmentLevel, band: Band) {
        if level != CommitmentLevel::Processed {
            self.bands[level.index() - 1] = band;
        }
    }

    fn has_pending(&self) -> bool {
        self.bands.contains(&Band::Pending)
    }

    /// Skip bands no live session needs and drop the buffer once nothing is
    /// pending.
    fn trim(&mut self, max_required: CommitmentLevel) {
        for level in [CommitmentLevel::Confirmed, CommitmentLevel::Finalized] {
            if level > max_required && self.band(level) == Band::Pending {
                self.set_band(level, Band::Skipped);
            }
        }
        if !self.has_pending() {
            self.events = Vec::new();
        }
    }

    fn is_terminal(&self) -> bool {
        self.dead || self.level == Some(CommitmentLevel::Finalized)
    }
}

pub struct CommitmentGate {
    config: GateConfig,
    slots: BTreeMap<Slot, SlotEntry>,
    newest: Option<Slot>,
    cursor: BandCursor,
}

impl CommitmentGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            slots: BTreeMap::new(),
            newest: None,
            cursor: BandCursor::default(),
        }
    }

    /// Number of slots currently tracked.
    pub fn tracked_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn newest_slot(&self) -> Option<Slot> {
        self.newest
    }

    /// Oldest slot still tracked. Older slots are outside the gate window.
    pub fn oldest_slot(&self) -> Option<Slot> {
        self.slots.keys().next().copied()
    }

    fn horizon(&self) -> Slot {
        self.newest
            .map_or(0, |newest| newest.saturating_sub(self.config.max_slot_lag))
    }

    /// Feed one event. `max_required` is the highest commitment any live
    /// session currently asks for.
    pub fn push(
        &mut self,
        event: LedgerEvent,
        now: Instant,
        max_required: CommitmentLevel,
    ) -> GateOutput {
        let mut out = GateOutput::default();
        let slot = event.slot();

        if slot < self.horizon() && !self.slots.contains_key(&slot) {
            debug!(slot, kind = %event.kind(), "event behind gate window, processed band only");
            out.released.push((CommitmentLevel::Processed, event));
            return out;
        }
        self.newest = Some(self.newest.map_or(slot, |n| n.max(slot)));

        let entry = self.slots.entry(slot).or_insert_with(|| SlotEntry::new(now));
        if entry.dead {
            debug!(slot, kind = %event.kind(), "event for dead slot dropped");
            return out;
        }

        if let LedgerEvent::Account(account) = &event {
            match entry.write_versions.get(&account.pubkey) {
                Some(&last) if account.write_version <= last => {
                    out.stale_dropped += 1;
                    return out;
                }
                _ => {
                    entry.write_versions.insert(account.pubkey, account.write_version);
                }
            }
        }

        let status = match &event {
            LedgerEvent::Slot(update) => Some(update.clone()),
            _ => None,
        };
        match status {
            Some(update) => {
                if update.parent.is_some() {
                    entry.parent = update.parent;
                }
                self.on_status(update, event, &mut out);
            }
            None => Self::accept(entry, &mut self.cursor, event, &mut out),
        }

        if let Some(entry) = self.slots.get_mut(&slot) {
            entry.trim(max_required);
        }
        self.evict(now, &mut out);
        out
    }

    /// Force-evict expired slots without a new event. Called periodically by
    /// the engine so a stalled feed still reports gaps.
    pub fn tick(&mut self, now: Instant) -> GateOutput {
        let mut out = GateOutput::default();
        self.evict(now, &mut out);
        out
    }

    /// Release `event` to the processed band and every band the slot has
    /// already reached; buffer it for pending bands.
    fn accept(
        entry: &mut SlotEntry,
        cursor: &mut BandCursor,
        event: LedgerEvent,
        out: &mut GateOutput,
    ) {
        out.released.push((CommitmentLevel::Processed, event.clone()));
        for level in [CommitmentLevel::Confirmed, CommitmentLevel::Finalized] {
            if entry.band(level) == Band::Released {
                out.release(cursor, level, event.clone());
            }
        }
        if entry.has_pending() {
            entry.events.push(event);
        }
    }

    fn on_status(&mut self, update: SlotUpdate, event: LedgerEvent, out: &mut GateOutput) {
        let slot = update.slot;
        let Some(entry) = self.slots.get_mut(&slot) else {
            return;
        };

        if update.status == SlotStatus::Dead {
            if entry.level >= Some(CommitmentLevel::Confirmed) {
                debug!(slot, level = ?entry.level, "dead status after confirmation ignored");
                return;
            }
            entry.dead = true;
            entry.events = Vec::new();
            entry.bands = [Band::Skipped; 2];
            out.released.push((CommitmentLevel::Processed, event));
            return;
        }

        let Some(level) = update.status.commitment() else {
            Self::accept(entry, &mut self.cursor, event, out);
            return;
        };

        if entry.reported[level.index()] || entry.level > Some(level) {
            debug!(slot, status = %update.status, level = ?entry.level, "slot status regression ignored");
            return;
        }
        entry.reported[level.index()] = true;
        Self::accept(entry, &mut self.cursor, event, out);

        if entry.level < Some(level) {
            self.raise(slot, level, out);
        }
    }

    /// Raise `slot` and its buffered ancestors to `level`, releasing each
    /// newly reached band in ascending slot order.
    fn raise(&mut self, slot: Slot, level: CommitmentLevel, out: &mut GateOutput) {
        let mut chain = vec![slot];
        let mut cursor = self.slots.get(&slot).and_then(|e| e.parent);
        while let Some(parent) = cursor {
            match self.slots.get(&parent) {
                Some(entry) if !entry.dead && entry.level < Some(level) => {
                    chain.push(parent);
                    cursor = entry.parent;
                }
                _ => break,
            }
        }

        for slot in chain.into_iter().rev() {
            let Some(entry) = self.slots.get_mut(&slot) else {
                continue;
            };
            entry.level = Some(level);
            for band in [CommitmentLevel::Confirmed, CommitmentLevel::Finalized] {
                if band > level || entry.band(band) != Band::Pending {
                    continue;
                }
                for event in &entry.events {
                    out.release(&mut self.cursor, band, event.clone());
                }
                entry.set_band(band, Band::Released);
            }
            if !entry.has_pending() {
                entry.events = Vec::new();
            }
        }
    }

    fn evict(&mut self, now: Instant, out: &mut GateOutput) {
        let horizon = self.horizon();
        let expired: Vec<Slot> = self
            .slots
            .iter()
            .filter(|(slot, entry)| {
                **slot < horizon
                    || (!entry.is_terminal()
                        && now.saturating_duration_since(entry.created) > self.config.max_slot_age)
            })
            .map(|(slot, _)| *slot)
            .collect();

        for slot in expired {
            let Some(entry) = self.slots.remove(&slot) else {
                continue;
            };
            if entry.is_terminal() {
                continue;
            }
            warn!(slot, level = ?entry.level, "slot force-evicted before finalization");
            out.force_evicted.push(slot);
            if self.config.emit_synthetic_dead {
                let dead = LedgerEvent::Slot(SlotUpdate {
                    slot,
                    parent: entry.parent,
                    status: SlotStatus::Dead,
                    dead_error: Some(FORCE_EVICTED_REASON.to_string()),
                });
                for level in CommitmentLevel::ALL {
                    if entry.band(level) == Band::Released {
                        out.release(&mut self.cursor, level, dead.clone());
                    }
                }
            }
        }
    }
}
