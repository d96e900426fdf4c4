use std::collections::{BTreeMap, VecDeque};

use midi_codec::{sort_by_tick_and_order, Event};
use tracing::debug;

/// Default cap for [`enforce_max_note_length`], in eighth notes.
pub const DEFAULT_MAX_EIGHTHS: u32 = 3;

const SYNTHETIC_OFF_ORDER: f64 = 3.0;

struct Pending {
    deadline: u64,
    order: Option<f64>,
}

/// Cap every note at `tick_per_eighth * max_eighths` ticks.
///
/// Note-offs are only ever pulled earlier, never pushed later. Notes without
/// a note-off get one at the later of the last observed tick and their
/// deadline. The result is sorted by (tick, order).
pub fn enforce_max_note_length(
    events: &[Event],
    tick_per_eighth: u64,
    max_eighths: u32,
) -> Vec<Event> {
    if events.is_empty() {
        return Vec::new();
    }

    let max_duration = tick_per_eighth * max_eighths.max(1) as u64;

    let mut sorted = events.to_vec();
    sort_by_tick_and_order(&mut sorted);

    let mut active: BTreeMap<(u8, u8), VecDeque<Pending>> = BTreeMap::new();
    let mut out = Vec::with_capacity(sorted.len());
    let mut last_tick = 0u64;
    let mut truncated = 0usize;

    for event in sorted {
        let mut event = event.masked();
        last_tick = last_tick.max(event.tick);

        if event.is_note_on() {
            active.entry(event.voice_key()).or_default().push_back(Pending {
                deadline: event.tick + max_duration,
                order: event.order,
            });
        } else if event.is_note_off() {
            event.d2 = 0;
            let key = event.voice_key();
            if let Some(queue) = active.get_mut(&key) {
                if let Some(pending) = queue.pop_front() {
                    if pending.deadline < event.tick {
                        event.tick = pending.deadline;
                        truncated += 1;
                    }
                    last_tick = last_tick.max(event.tick);
                }
                if queue.is_empty() {
                    active.remove(&key);
                }
            }
        }

        out.push(event);
    }

    let mut synthesized = 0usize;
    for ((channel, pitch), queue) in active {
        for pending in queue {
            let tick = last_tick.max(pending.deadline);
            let order = pending.order.unwrap_or(SYNTHETIC_OFF_ORDER);
            out.push(Event::note_off(tick, channel, pitch).with_order(order));
            synthesized += 1;
        }
    }

    sort_by_tick_and_order(&mut out);

    debug!(
        max_duration,
        truncated, synthesized, "enforced maximum note length"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn off_ticks(events: &[Event]) -> Vec<u64> {
        events.iter().filter(|e| e.is_note_off()).map(|e| e.tick).collect()
    }

    #[test]
    fn truncates_and_synthesizes() {
        let tick_per_eighth = 60;
        let events = vec![
            Event::note_on(0, 0, 60, 100).with_order(1.0),
            Event::note_off(400, 0, 60).with_order(1.0),
            Event::note_on(480, 0, 62, 100).with_order(1.0),
        ];

        let limited = enforce_max_note_length(&events, tick_per_eighth, 3);

        assert_eq!(off_ticks(&limited), vec![180, 480 + tick_per_eighth * 3]);
        let synthetic = limited.last().unwrap();
        assert_eq!(synthetic.d1, 62);
        assert_eq!(synthetic.order, Some(1.0));
    }

    #[test]
    fn short_notes_are_untouched() {
        let events = vec![Event::note_on(0, 0, 60, 100), Event::note_off(100, 0, 60)];
        let limited = enforce_max_note_length(&events, 60, 3);
        assert_eq!(limited, events);
    }

    #[test]
    fn stacked_voices_resolve_oldest_first() {
        let events = vec![
            Event::note_on(0, 0, 60, 100),
            Event::note_on(100, 0, 60, 100),
            Event::note_off(500, 0, 60),
            Event::note_off(500, 0, 60),
        ];

        let limited = enforce_max_note_length(&events, 100, 2);

        // deadlines 200 and 300
        assert_eq!(off_ticks(&limited), vec![200, 300]);
    }

    #[test]
    fn synthetic_off_waits_for_last_observed_tick() {
        let events = vec![
            Event::note_on(0, 1, 60, 100),
            Event::control_change(1000, 1, 7, 90),
        ];

        let limited = enforce_max_note_length(&events, 60, 3);
        let off = limited.iter().find(|e| e.is_note_off()).unwrap();

        assert_eq!(off.tick, 1000);
        assert_eq!(off.ch, 1);
        assert_eq!(off.order, Some(SYNTHETIC_OFF_ORDER));
    }

    #[test]
    fn velocity_zero_release_is_normalized() {
        let events = vec![Event::note_on(0, 0, 60, 100), Event::note_on(500, 0, 60, 0)];
        let limited = enforce_max_note_length(&events, 60, 3);
        assert_eq!(limited[1].tick, 180);
        assert_eq!(limited[1].status, 0x90);
        assert_eq!(limited[1].d2, 0);
    }

    #[test]
    fn unmatched_note_off_passes_through() {
        let events = vec![
            Event::note_off(50, 0, 62),
            Event::note_on(100, 0, 60, 100),
            Event::note_off(150, 0, 60),
        ];
        let limited = enforce_max_note_length(&events, 60, 3);
        assert_eq!(limited, events);
    }

    #[test]
    fn zero_max_eighths_means_one() {
        let events = vec![Event::note_on(0, 0, 60, 100), Event::note_off(500, 0, 60)];
        let limited = enforce_max_note_length(&events, 60, 0);
        assert_eq!(off_ticks(&limited), vec![60]);
    }
}
