use serde::{Deserialize, Serialize};

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;

/// A single channel message at an absolute tick.
///
/// `order` breaks ties between events on the same tick (missing sorts as 0).
/// `origin_id` groups events derived from one source note, and `dummy`
/// marks silent anchor notes that are not part of the performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub tick: u64,
    pub status: u8,
    pub ch: u8,
    pub d1: u8,
    pub d2: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dummy: bool,
}

impl Event {
    /// Build an event from a raw status byte; channel and data bytes are masked.
    pub fn new(tick: u64, status: u8, d1: u8, d2: u8) -> Self {
        Self {
            tick,
            status,
            ch: status & 0x0F,
            d1: d1 & 0x7F,
            d2: d2 & 0x7F,
            order: None,
            origin_id: None,
            dummy: false,
        }
    }

    pub fn note_on(tick: u64, channel: u8, pitch: u8, velocity: u8) -> Self {
        Self::new(tick, NOTE_ON | (channel & 0x0F), pitch, velocity)
    }

    pub fn note_off(tick: u64, channel: u8, pitch: u8) -> Self {
        Self::new(tick, NOTE_OFF | (channel & 0x0F), pitch, 0)
    }

    pub fn control_change(tick: u64, channel: u8, controller: u8, value: u8) -> Self {
        Self::new(tick, CONTROL_CHANGE | (channel & 0x0F), controller, value)
    }

    /// Silent note-on/note-off pair on pitch 0 spanning `[on_tick, off_tick]`.
    pub fn dummy_pair(on_tick: u64, off_tick: u64) -> [Self; 2] {
        let mut on = Self::new(on_tick, NOTE_ON, 0, 0);
        let mut off = Self::new(off_tick, NOTE_OFF, 0, 0);
        on.dummy = true;
        off.dummy = true;
        [on, off]
    }

    pub fn with_order(mut self, order: f64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_origin(mut self, origin_id: impl Into<String>) -> Self {
        self.origin_id = Some(origin_id.into());
        self
    }

    /// High nibble of the status byte.
    pub fn kind(&self) -> u8 {
        self.status & 0xF0
    }

    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    pub fn pitch(&self) -> u8 {
        self.d1 & 0x7F
    }

    pub fn velocity(&self) -> u8 {
        self.d2 & 0x7F
    }

    /// Tie-break order, with a missing order sorting as 0.
    pub fn sort_order(&self) -> f64 {
        self.order.unwrap_or(0.0)
    }

    pub fn is_note_on(&self) -> bool {
        self.kind() == NOTE_ON && self.velocity() > 0
    }

    /// Note-off, or the equivalent velocity-0 note-on.
    pub fn is_note_off(&self) -> bool {
        self.kind() == NOTE_OFF || (self.kind() == NOTE_ON && self.velocity() == 0)
    }

    pub fn is_controller(&self, controller: u8) -> bool {
        self.kind() == CONTROL_CHANGE && self.d1 & 0x7F == controller
    }

    /// Program change and channel pressure carry a single data byte.
    pub fn has_single_data_byte(&self) -> bool {
        matches!(self.kind(), PROGRAM_CHANGE | CHANNEL_PRESSURE)
    }

    /// Composite (channel, pitch) key used for per-voice tracking.
    pub fn voice_key(&self) -> (u8, u8) {
        (self.channel(), self.pitch())
    }

    /// Copy with data bytes masked to 7 bits and `ch` synced to the status.
    pub fn masked(&self) -> Self {
        Self {
            ch: self.channel(),
            d1: self.d1 & 0x7F,
            d2: self.d2 & 0x7F,
            ..self.clone()
        }
    }
}

/// Stable sort by (tick, order), missing order as 0.
pub fn sort_by_tick_and_order(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.tick
            .cmp(&b.tick)
            .then_with(|| a.sort_order().total_cmp(&b.sort_order()))
    });
}

/// Stable sort by (tick, status high nibble) so note-offs precede note-ons.
pub fn sort_by_tick_and_kind(events: &mut [Event]) {
    events.sort_by(|a, b| a.tick.cmp(&b.tick).then_with(|| a.kind().cmp(&b.kind())));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: Option<String>,
    pub events: Vec<Event>,
    pub end_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiFile {
    pub format: u16,
    pub ppq: u16,
    pub tracks: Vec<Track>,
}

impl MidiFile {
    /// Last tick of the longest track.
    pub fn end_tick(&self) -> u64 {
        self.tracks.iter().map(|t| t.end_tick).max().unwrap_or(0)
    }

    /// All tracks' events merged into one list, stable by tick.
    pub fn merged_events(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .tracks
            .iter()
            .flat_map(|t| t.events.iter().cloned())
            .collect();
        events.sort_by_key(|e| e.tick);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_predicates() {
        assert!(Event::note_on(0, 0, 60, 100).is_note_on());
        assert!(!Event::note_on(0, 0, 60, 0).is_note_on());
        assert!(Event::note_on(0, 0, 60, 0).is_note_off());
        assert!(Event::note_off(0, 3, 60).is_note_off());
        assert!(Event::control_change(0, 0, 64, 127).is_controller(64));
        assert!(!Event::control_change(0, 0, 64, 127).is_note_off());
    }

    #[test]
    fn constructor_masks_data_and_derives_channel() {
        let e = Event::new(5, 0x93, 0xC0, 0xFF);
        assert_eq!(e.ch, 3);
        assert_eq!(e.d1, 0x40);
        assert_eq!(e.d2, 0x7F);
    }

    #[test]
    fn sort_places_missing_order_as_zero() {
        let mut events = vec![
            Event::note_on(10, 0, 62, 90).with_order(1.0),
            Event::note_on(10, 0, 60, 90),
            Event::note_on(0, 0, 64, 90).with_order(5.0),
        ];
        sort_by_tick_and_order(&mut events);
        let pitches: Vec<u8> = events.iter().map(|e| e.d1).collect();
        assert_eq!(pitches, vec![64, 60, 62]);
    }

    #[test]
    fn kind_sort_puts_offs_first() {
        let mut events = vec![Event::note_on(0, 0, 1, 1), Event::note_off(0, 0, 2)];
        sort_by_tick_and_kind(&mut events);
        assert!(events[0].is_note_off());
    }

    #[test]
    fn merged_events_interleave_tracks() {
        let file = MidiFile {
            format: 1,
            ppq: 480,
            tracks: vec![
                Track {
                    name: None,
                    events: vec![Event::note_on(0, 0, 60, 90), Event::note_off(480, 0, 60)],
                    end_tick: 480,
                },
                Track {
                    name: Some("b".into()),
                    events: vec![Event::note_on(240, 1, 64, 90)],
                    end_tick: 960,
                },
            ],
        };
        let ticks: Vec<u64> = file.merged_events().iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 240, 480]);
        assert_eq!(file.end_tick(), 960);
    }
}
