use std::collections::{BTreeMap, HashMap};

use midi_codec::{sort_by_tick_and_order, Event};
use tracing::debug;

/// Order given to forced note-offs when the superseding note-on has none.
const DEFAULT_FORCED_OFF_ORDER: f64 = 3.0;
/// Order of the note-offs closing voices still open at end-of-stream.
const CLEANUP_OFF_ORDER: f64 = 5.0;

/// All Notes Off, Reset All Controllers, All Sound Off.
const RESET_CONTROLLERS: [u8; 3] = [120, 121, 123];

/// Remove overlap artifacts and close dangling notes.
///
/// 1. Note-offs sharing an `origin_id` are moved to the tick of the group's
///    canonical note-off (lowest order, then lowest tick), so duplicated
///    voices release together.
/// 2. A note-on for an already sounding (channel, pitch) first force-closes
///    the open voices at the same tick; only one voice per key stays open.
/// 3. Keys still sounding at the end get note-offs one tick after the last
///    observed event.
pub fn sanitize_events(events: &[Event]) -> Vec<Event> {
    let mut sorted = events.to_vec();
    sort_by_tick_and_order(&mut sorted);
    align_derived_note_offs(&mut sorted);
    sort_by_tick_and_order(&mut sorted);

    let mut active: BTreeMap<(u8, u8), usize> = BTreeMap::new();
    let mut cleaned = Vec::with_capacity(sorted.len());
    let mut last_tick = 0u64;
    let mut forced = 0usize;

    for event in &sorted {
        let event = event.masked();
        last_tick = last_tick.max(event.tick);

        if RESET_CONTROLLERS.iter().any(|&cc| event.is_controller(cc)) {
            active.clear();
        } else if event.is_note_on() {
            let open = active.insert(event.voice_key(), 1).unwrap_or(0);
            if open > 0 {
                let order = event
                    .order
                    .map(|o| (o - 1.0).max(0.0))
                    .unwrap_or(DEFAULT_FORCED_OFF_ORDER);
                for _ in 0..open {
                    cleaned.push(
                        Event::note_off(event.tick, event.channel(), event.pitch()).with_order(order),
                    );
                }
                forced += open;
            }
        } else if event.is_note_off() {
            if let Some(count) = active.get_mut(&event.voice_key()) {
                *count = count.saturating_sub(1);
            }
        }

        cleaned.push(event);
    }

    let cleanup_tick = last_tick + 1;
    let mut dangling = 0usize;
    for (&(channel, pitch), &count) in &active {
        for _ in 0..count {
            cleaned.push(Event::note_off(cleanup_tick, channel, pitch).with_order(CLEANUP_OFF_ORDER));
        }
        dangling += count;
    }

    debug!(
        input = events.len(),
        output = cleaned.len(),
        forced,
        dangling,
        "sanitized events"
    );

    cleaned
}

/// Rewrite every note-off of an origin group to the group's canonical tick.
fn align_derived_note_offs(events: &mut [Event]) {
    // origin -> (order, tick) of the canonical note-off
    let mut canonical: HashMap<&str, (f64, u64)> = HashMap::new();

    for event in events.iter() {
        let Some(origin) = event.origin_id.as_deref() else {
            continue;
        };
        if !event.is_note_off() {
            continue;
        }

        let candidate = (event.sort_order(), event.tick);
        canonical
            .entry(origin)
            .and_modify(|best| {
                if candidate.0 < best.0 || (candidate.0 == best.0 && candidate.1 < best.1) {
                    *best = candidate;
                }
            })
            .or_insert(candidate);
    }

    if canonical.is_empty() {
        return;
    }

    let ticks: HashMap<String, u64> = canonical
        .into_iter()
        .map(|(origin, (_, tick))| (origin.to_string(), tick))
        .collect();

    for event in events.iter_mut() {
        if !event.is_note_off() {
            continue;
        }
        if let Some(&tick) = event.origin_id.as_ref().and_then(|o| ticks.get(o)) {
            event.tick = tick;
        }
    }
}
