//! Choosing which window of a soloing reference plays under a segment.
//!
//! Randomness and the pick among candidate windows are injected so that
//! callers (and tests) control both. [`SeededRandom`] and [`HistoryPolicy`]
//! are the stock implementations.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::reference::WindowReference;
use crate::segment::Segment;

/// Windows are always chosen so that four bars remain playable.
const TAIL_BARS: u64 = 4;
const EIGHTHS_PER_BAR: u64 = 8;
/// Candidate windows may start up to this many bars before the segment.
const LOOKBACK_BARS: u64 = 3;

/// Source of uniform integers.
pub trait RandomSource {
    /// A value in `0..max`. `max` is never zero.
    fn below(&mut self, max: u64) -> u64;
}

/// Reproducible [`RandomSource`] backed by `oorandom`.
#[derive(Debug, Clone)]
pub struct SeededRandom(oorandom::Rand64);

impl SeededRandom {
    pub fn new(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }
}

impl RandomSource for SeededRandom {
    fn below(&mut self, max: u64) -> u64 {
        if max <= 1 {
            return 0;
        }
        self.0.rand_range(0..max)
    }
}

/// A window that could play under a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCandidate {
    /// Stable identifier, `bar-N`.
    pub id: String,
    pub window_start_eighth: u64,
    pub window_index: u64,
    /// 1 when a note sounds inside the span the segment would play.
    pub score: u8,
    pub start_eighth_for_window: u64,
}

/// Decides which candidate is played.
pub trait WindowPolicy {
    /// Index into `candidates`, or `None` to fall back to the plain wrap.
    fn pick(&mut self, key: &str, candidates: &[WindowCandidate]) -> Option<usize>;
}

/// Always the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCandidate;

impl WindowPolicy for FirstCandidate {
    fn pick(&mut self, _key: &str, candidates: &[WindowCandidate]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Avoids replaying the same window for a key too soon.
///
/// Remembers the last `depth` picks per key and chooses uniformly among the
/// candidates not in that list, or among all of them when every candidate
/// was used recently.
#[derive(Debug, Clone)]
pub struct HistoryPolicy {
    depth: usize,
    rng: SeededRandom,
    recent: HashMap<String, VecDeque<String>>,
}

impl HistoryPolicy {
    pub fn new(depth: usize, seed: u128) -> Self {
        Self {
            depth,
            rng: SeededRandom::new(seed),
            recent: HashMap::new(),
        }
    }

    pub fn recent(&self, key: &str) -> impl Iterator<Item = &str> {
        self.recent
            .get(key)
            .into_iter()
            .flat_map(|ids| ids.iter().map(String::as_str))
    }
}

impl WindowPolicy for HistoryPolicy {
    fn pick(&mut self, key: &str, candidates: &[WindowCandidate]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let history = self.recent.entry(key.to_string()).or_default();
        let fresh: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !history.contains(&c.id))
            .map(|(i, _)| i)
            .collect();

        let pool: Vec<usize> = if fresh.is_empty() {
            (0..candidates.len()).collect()
        } else {
            fresh
        };
        let index = pool[self.rng.below(pool.len() as u64) as usize];

        if self.depth > 0 {
            history.push_back(candidates[index].id.clone());
            while history.len() > self.depth {
                history.pop_front();
            }
        }

        trace!(key, id = %candidates[index].id, pool = pool.len(), "picked window");
        Some(index)
    }
}

/// Where in the reference a segment plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSelection {
    pub window_start_eighth: u64,
    pub window_index: u64,
    pub start_eighth_for_window: u64,
    /// Id of the picked candidate; `None` for the plain wrap.
    pub candidate: Option<String>,
}

impl From<WindowCandidate> for WindowSelection {
    fn from(c: WindowCandidate) -> Self {
        Self {
            window_start_eighth: c.window_start_eighth,
            window_index: c.window_index,
            start_eighth_for_window: c.start_eighth_for_window,
            candidate: Some(c.id),
        }
    }
}

/// Pick the reference window that accompanies `segment`.
///
/// Segments past the last playable bar are wrapped back into the reference
/// at a random offset. Candidate windows start on bar lines up to three
/// bars before the segment, and those with a note sounding within the
/// segment's span are preferred. The policy sees them under the key
/// `"{quality}_{variant}"`.
pub fn select_soloing_x32_window(
    reference: &WindowReference,
    segment: &Segment,
    quality_key: &str,
    rng: &mut dyn RandomSource,
    policy: &mut dyn WindowPolicy,
) -> WindowSelection {
    let win_eighths = reference.win_eighths;
    let tick_per_eighth = reference.tick_per_eighth;
    let seg_start = segment.start_eighth as u64;

    if win_eighths == 0 {
        return wrap_window(reference, seg_start / EIGHTHS_PER_BAR);
    }

    let max_start_bar = reference.bars_per_file.saturating_sub(TAIL_BARS);

    let mut start = seg_start;
    if seg_start > max_start_bar * EIGHTHS_PER_BAR {
        let loop_eighths = (max_start_bar + 1) * EIGHTHS_PER_BAR;
        start = (seg_start + rng.below(loop_eighths)) % loop_eighths;
    }

    let seg_bar = start / EIGHTHS_PER_BAR;
    let min_bar = seg_bar.saturating_sub(LOOKBACK_BARS);
    let max_bar = max_start_bar.min(seg_bar);

    let mut candidates = Vec::new();
    for bar in min_bar..=max_bar {
        let window_start = bar * EIGHTHS_PER_BAR;
        let offset = start - window_start;
        if offset >= win_eighths {
            continue;
        }

        let offset_ticks = offset * tick_per_eighth;
        let remaining = reference.win_ticks.saturating_sub(offset_ticks);
        let span = (segment.dur_eighth as u64 * tick_per_eighth).min(remaining);
        let sounding = reference
            .first_note_on_from(window_start * tick_per_eighth)
            .is_some_and(|horizon| horizon < offset_ticks + span);

        candidates.push(WindowCandidate {
            id: format!("bar-{bar}"),
            window_start_eighth: window_start,
            window_index: window_start / win_eighths,
            score: u8::from(sounding),
            start_eighth_for_window: start,
        });
    }

    let viable: Vec<WindowCandidate> = candidates.iter().filter(|c| c.score > 0).cloned().collect();
    let pool = if viable.is_empty() { candidates } else { viable };

    let quality = if quality_key.is_empty() { "?" } else { quality_key };
    let key = format!("{quality}_{}", reference.variant);

    debug!(
        key = %key,
        seg_start,
        effective_start = start,
        candidates = pool.len(),
        "selecting soloing window"
    );

    match policy.pick(&key, &pool) {
        Some(index) if index < pool.len() => pool[index].clone().into(),
        _ => wrap_window(reference, seg_bar),
    }
}

fn wrap_window(reference: &WindowReference, seg_bar: u64) -> WindowSelection {
    let windows = reference.windows_per_file.max(1) as u64;
    let window_index = seg_bar % windows;
    WindowSelection {
        window_start_eighth: window_index * reference.win_eighths,
        window_index,
        start_eighth_for_window: seg_bar * EIGHTHS_PER_BAR,
        candidate: None,
    }
}
