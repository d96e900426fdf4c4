use midi_codec::Event;
use tracing::debug;

/// Keep only note-ons with velocity and note-off equivalents, in order.
///
/// Controllers, pitch bend, pressure, program changes and everything else
/// are dropped. Kept events have masked pitch and velocity.
pub fn disable_unsupported_midi_messages(events: &[Event]) -> Vec<Event> {
    let allowed: Vec<Event> = events
        .iter()
        .filter(|e| e.is_note_on() || e.is_note_off())
        .map(Event::masked)
        .collect();

    debug!(
        dropped = events.len() - allowed.len(),
        kept = allowed.len(),
        "filtered unsupported MIDI messages"
    );

    allowed
}
