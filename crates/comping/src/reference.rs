//! Reference performances chunked into fixed-length windows.
//!
//! A reference is prepared once per load for either soloing or salsa
//! playback. Preparation inserts silent dummy notes so that every window has
//! something anchoring its edges, and (for soloing) records the first and
//! last sounding pitch of each window. Both preparations are idempotent.

use midi_codec::{sort_by_tick_and_kind, Event, MidiFile};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sanitize::sanitize_events;
use crate::{Error, Result};

/// Window length used by the soloing x32 references, in eighth notes.
pub const SOLOING_WINDOW_EIGHTHS: u64 = 32;
/// Window length of salsa 2-3 references, in eighth notes.
pub const SALSA_WINDOW_EIGHTHS: u64 = 16;
/// Salsa references are exactly this many windows long.
pub const SALSA_WINDOWS: usize = 4;

/// First and last sounding pitch of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAnchor {
    pub first: u8,
    pub last: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReference {
    pub ppq: u16,
    pub tick_per_eighth: u64,
    pub win_eighths: u64,
    pub win_ticks: u64,
    pub windows_per_file: usize,
    pub bars_per_file: u64,
    /// Selection history is keyed per variant, e.g. "x32".
    pub variant: String,
    pub events: Vec<Event>,
    /// One entry per window once prepared for soloing.
    pub anchors: Vec<Option<WindowAnchor>>,
    soloing_ready: bool,
    salsa_ready: bool,
}

impl WindowReference {
    pub fn new(ppq: u16, events: Vec<Event>, win_eighths: u64, windows_per_file: usize) -> Self {
        let tick_per_eighth = (ppq / 2) as u64;
        Self {
            ppq,
            tick_per_eighth,
            win_eighths,
            win_ticks: win_eighths * tick_per_eighth,
            windows_per_file,
            bars_per_file: windows_per_file as u64 * win_eighths / 8,
            variant: "x32".to_string(),
            events,
            anchors: Vec::new(),
            soloing_ready: false,
            salsa_ready: false,
        }
    }

    /// Build from a parsed file: tracks are merged and sanitized, and the
    /// window count is the file length rounded to whole windows.
    pub fn from_midi(file: &MidiFile, win_eighths: u64) -> Self {
        let tick_per_eighth = (file.ppq / 2) as u64;
        let win_ticks = win_eighths * tick_per_eighth;
        let windows = if win_ticks == 0 {
            1
        } else {
            ((file.end_tick() + win_ticks / 2) / win_ticks).max(1) as usize
        };

        let events = sanitize_events(&file.merged_events());
        Self::new(file.ppq, events, win_eighths, windows)
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn is_soloing_ready(&self) -> bool {
        self.soloing_ready
    }

    pub fn is_salsa_ready(&self) -> bool {
        self.salsa_ready
    }

    /// Tick span `[start, end)` of window `index`.
    pub fn window_span(&self, index: usize) -> (u64, u64) {
        let start = index as u64 * self.win_ticks;
        (start, start + self.win_ticks)
    }

    /// Ticks from `tick` to the first sounding note-on at or after it.
    pub fn first_note_on_from(&self, tick: u64) -> Option<u64> {
        self.events
            .iter()
            .filter(|e| !e.dummy && e.is_note_on() && e.tick >= tick)
            .map(|e| e.tick - tick)
            .min()
    }

    /// Anchor every window's first and last eighth with a note.
    ///
    /// Windows without a note-on in their first (last) eighth get a silent
    /// dummy pair covering that eighth. Per-window anchors are recorded.
    pub fn prepare_soloing(mut self) -> Self {
        if self.soloing_ready {
            return self;
        }

        let eighth = self.tick_per_eighth;
        let mut sounding: Vec<&Event> = self.events.iter().filter(|e| !e.dummy).collect();
        sounding.sort_by_key(|e| e.tick);
        let anchors = (0..self.windows_per_file)
            .map(|w| {
                let (start, end) = self.window_span(w);
                window_anchor(&sounding, start, end)
            })
            .collect();
        self.anchors = anchors;

        let mut dummies = Vec::new();
        for w in 0..self.windows_per_file {
            let (start, end) = self.window_span(w);
            let tail = end.saturating_sub(eighth);
            let (mut has_first, mut has_last) = (false, false);
            for e in self
                .events
                .iter()
                .filter(|e| e.is_note_on() && e.tick >= start && e.tick < end)
            {
                has_first |= e.tick < start + eighth;
                has_last |= e.tick >= tail;
            }

            if !has_first {
                dummies.extend(Event::dummy_pair(start, start + eighth));
            }
            if !has_last {
                dummies.extend(Event::dummy_pair(tail, end));
            }
        }

        debug!(
            windows = self.windows_per_file,
            dummies = dummies.len() / 2,
            anchored = self.anchors.iter().filter(|a| a.is_some()).count(),
            "prepared soloing reference"
        );

        self.events.extend(dummies);
        sort_by_tick_and_kind(&mut self.events);
        self.soloing_ready = true;
        self
    }

    /// Fill silence at window edges for salsa 2-3 playback.
    ///
    /// Fails unless the reference is exactly [`SALSA_WINDOWS`] windows long.
    pub fn prepare_salsa(mut self) -> Result<Self> {
        if self.windows_per_file != SALSA_WINDOWS {
            return Err(Error::SalsaWindowCount {
                found: self.windows_per_file,
            });
        }
        if self.salsa_ready {
            return Ok(self);
        }

        let mut dummies = Vec::new();
        for w in 0..self.windows_per_file {
            let (start, end) = self.window_span(w);
            let ticks: Vec<u64> = self
                .events
                .iter()
                .filter(|e| !e.dummy && e.tick >= start && e.tick < end)
                .map(|e| e.tick)
                .collect();

            let (Some(&earliest), Some(&latest)) = (ticks.iter().min(), ticks.iter().max()) else {
                dummies.extend(Event::dummy_pair(start, end));
                continue;
            };

            if earliest > start {
                dummies.extend(Event::dummy_pair(start, earliest.min(end)));
            }
            if latest < end {
                dummies.extend(Event::dummy_pair(latest.max(start), end));
            }
        }

        debug!(dummies = dummies.len() / 2, "prepared salsa reference");

        self.events.extend(dummies);
        sort_by_tick_and_kind(&mut self.events);
        self.salsa_ready = true;
        Ok(self)
    }
}

/// First and last sounding pitch in `[start, end)`.
///
/// `sounding` holds the non-dummy events sorted by tick. Falls back to
/// note-offs in `[start, end]` when the window has no note-on, so a note-off
/// on the boundary anchors both neighbours.
fn window_anchor(sounding: &[&Event], start: u64, end: u64) -> Option<WindowAnchor> {
    let lo = sounding.partition_point(|e| e.tick < start);
    let hi = sounding.partition_point(|e| e.tick <= end);
    let span = &sounding[lo..hi];

    let note_ons: Vec<&Event> = span
        .iter()
        .copied()
        .filter(|e| e.is_note_on() && e.tick < end)
        .collect();

    let picked: Vec<&Event> = if note_ons.is_empty() {
        span.iter().copied().filter(|e| e.is_note_off()).collect()
    } else {
        note_ons
    };

    Some(WindowAnchor {
        first: picked.first()?.pitch(),
        last: picked.last()?.pitch(),
    })
}

pub fn prepare_soloing_reference(reference: WindowReference) -> WindowReference {
    reference.prepare_soloing()
}

pub fn prepare_salsa_reference(reference: WindowReference) -> Result<WindowReference> {
    reference.prepare_salsa()
}
