use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use midi_codec::Event;
use tracing::debug;

/// Default hard cap for [`drop_long_notes_and_sustain`], in eighth notes.
pub const DEFAULT_TRIM_MAX_EIGHTHS: u32 = 4;

const SUSTAIN_PEDAL: u8 = 64;

/// A note is an outlier once it is this many times longer than its target.
const OUTLIER_RATIO: f64 = 1.75;

#[derive(Debug, Clone, Copy)]
struct MatchedNote {
    duration: u64,
    on_tick: u64,
    off_index: usize,
}

/// Strip sustain pedal messages and trim abnormally long notes.
///
/// Notes are paired first-in-first-out per (channel, pitch); note-ons that
/// never get a note-off are dropped. Each note is compared with the average
/// of the "short" notes of its chord (same onset tick), or of the whole
/// stream for single notes. A note longer than that target is trimmed back
/// to it when it is more than 1.75x the target or longer than
/// `tick_per_eighth * max_eighths`.
///
/// The output keeps the input order; only note-off ticks change.
pub fn drop_long_notes_and_sustain(
    events: &[Event],
    tick_per_eighth: u64,
    max_eighths: u32,
) -> Vec<Event> {
    if events.is_empty() || tick_per_eighth == 0 {
        return events.to_vec();
    }

    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by(|&a, &b| {
        events[a]
            .tick
            .cmp(&events[b].tick)
            .then_with(|| events[a].sort_order().total_cmp(&events[b].sort_order()))
    });

    let mut active: HashMap<(u8, u8), VecDeque<usize>> = HashMap::new();
    let mut removed: HashSet<usize> = HashSet::new();
    let mut notes: Vec<MatchedNote> = Vec::new();
    let mut sustain = 0usize;

    for &index in &order {
        let event = &events[index];

        if event.is_controller(SUSTAIN_PEDAL) {
            removed.insert(index);
            sustain += 1;
        } else if event.is_note_on() {
            active.entry(event.voice_key()).or_default().push_back(index);
        } else if event.is_note_off() {
            if let Some(on_index) = active
                .get_mut(&event.voice_key())
                .and_then(|queue| queue.pop_front())
            {
                let on_tick = events[on_index].tick;
                notes.push(MatchedNote {
                    duration: event.tick.saturating_sub(on_tick),
                    on_tick,
                    off_index: index,
                });
            }
        }
    }

    let unmatched: Vec<usize> = active.into_values().flatten().collect();
    removed.extend(unmatched.iter().copied());

    let trimmed = trim_targets(&notes, tick_per_eighth, max_eighths);

    debug!(
        sustain,
        unmatched = unmatched.len(),
        trimmed = trimmed.len(),
        "dropped long notes and sustain"
    );

    events
        .iter()
        .enumerate()
        .filter(|(index, _)| !removed.contains(index))
        .map(|(index, event)| match trimmed.get(&index) {
            Some(&tick) => Event {
                tick,
                ..event.clone()
            },
            None => event.clone(),
        })
        .collect()
}

/// Average of the short pool of `sorted` durations (ascending, non-empty).
///
/// Exactly three durations use the two shortest; otherwise the two longest
/// are excluded, keeping at least one.
fn short_average(sorted: &[u64]) -> f64 {
    let pool = if sorted.len() == 3 {
        &sorted[..2]
    } else {
        &sorted[..sorted.len().saturating_sub(2).max(1)]
    };
    pool.iter().sum::<u64>() as f64 / pool.len() as f64
}

/// Map of note-off index to its trimmed tick.
fn trim_targets(notes: &[MatchedNote], tick_per_eighth: u64, max_eighths: u32) -> HashMap<usize, u64> {
    let mut trimmed = HashMap::new();
    if notes.is_empty() {
        return trimmed;
    }

    let hard_limit = tick_per_eighth * max_eighths.max(1) as u64;

    let mut all: Vec<u64> = notes.iter().map(|n| n.duration).collect();
    all.sort_unstable();
    let global_average = short_average(&all);

    let mut chords: BTreeMap<u64, Vec<MatchedNote>> = BTreeMap::new();
    for note in notes {
        chords.entry(note.on_tick).or_default().push(*note);
    }

    for chord in chords.values() {
        let mut durations: Vec<u64> = chord.iter().map(|n| n.duration).collect();
        durations.sort_unstable();

        let reference = if chord.len() > 1 {
            short_average(&durations)
        } else {
            global_average
        };
        let target = reference.max(tick_per_eighth as f64).min(hard_limit as f64);

        for note in chord {
            let duration = note.duration as f64;
            if duration <= target {
                continue;
            }
            let outlier = duration > target * OUTLIER_RATIO;
            let over_limit = note.duration > hard_limit;
            if !outlier && !over_limit {
                continue;
            }

            let desired = (note.on_tick + 1).max((note.on_tick as f64 + target).round() as u64);
            let capped = desired.min(note.on_tick + hard_limit);
            trimmed.insert(note.off_index, capped);
        }
    }

    trimmed
}
