//! Serialize a flat event list as a single-track Standard MIDI File.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bytes::{push_var_len, MAX_VAR_LEN};
use crate::event::{sort_by_tick_and_order, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Written as its log2 exponent, so powers of two only.
    pub denominator: u8,
}

/// Fixed meta events prepended to the written track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterOptions {
    /// Track name meta event. Default: "generated".
    pub track_name: String,
    /// Tempo in BPM. Default: 120.
    pub bpm: f64,
    /// Default: 4/4.
    pub time_signature: TimeSignature,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            track_name: "generated".to_string(),
            bpm: 120.0,
            time_signature: TimeSignature {
                numerator: 4,
                denominator: 4,
            },
        }
    }
}

/// Write `events` as a format 0 file with the default track header.
pub fn build_midi_file(ppq: u16, events: &[Event]) -> Vec<u8> {
    build_midi_file_with(ppq, events, &WriterOptions::default())
}

/// Write `events` as a format 0 file.
///
/// Events are sorted by (tick, order). Status bytes are only written when
/// they change (running status). Data bytes are masked to 7 bits.
pub fn build_midi_file_with(ppq: u16, events: &[Event], options: &WriterOptions) -> Vec<u8> {
    let mut track = Vec::new();

    push_meta(&mut track, 0x03, options.track_name.as_bytes());
    push_meta(&mut track, 0x51, &tempo_bytes(options.bpm));
    let ts = options.time_signature;
    let denom_pow = ts.denominator.max(1).ilog2() as u8;
    push_meta(&mut track, 0x58, &[ts.numerator, denom_pow, 24, 8]);

    let mut sorted = events.to_vec();
    sort_by_tick_and_order(&mut sorted);

    let mut running: Option<u8> = None;
    let mut last_tick = 0u64;
    let mut skipped = 0usize;

    for event in &sorted {
        let status = event.status | 0x80;
        if status >= 0xF0 {
            skipped += 1;
            continue;
        }

        // Oversized gaps are clamped; later deltas count from the emitted tick.
        let delta = event.tick.saturating_sub(last_tick).min(MAX_VAR_LEN as u64);
        last_tick += delta;
        push_var_len(&mut track, delta as u32);

        if running != Some(status) {
            track.push(status);
            running = Some(status);
        }

        track.push(event.d1 & 0x7F);
        if !matches!(status & 0xF0, 0xC0 | 0xD0) {
            track.push(event.d2 & 0x7F);
        }
    }

    if skipped > 0 {
        warn!(skipped, "skipped system messages while writing MIDI");
    }

    push_meta(&mut track, 0x2F, &[]);

    debug!(
        ppq,
        events = sorted.len() - skipped,
        bytes = track.len(),
        "built MIDI track"
    );

    assemble(ppq, &track)
}

/// Microseconds per quarter note as 24-bit big-endian.
fn tempo_bytes(bpm: f64) -> [u8; 3] {
    let usec = if bpm > 0.0 {
        (60_000_000.0 / bpm).round().clamp(1.0, 0xFF_FFFF as f64) as u32
    } else {
        500_000
    };
    [(usec >> 16) as u8, (usec >> 8) as u8, usec as u8]
}

fn push_meta(track: &mut Vec<u8>, kind: u8, data: &[u8]) {
    push_var_len(track, 0);
    track.push(0xFF);
    track.push(kind);
    push_var_len(track, data.len() as u32);
    track.extend_from_slice(data);
}

fn assemble(ppq: u16, track: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(22 + track.len());

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // format 0
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    buf.extend_from_slice(b"MTrk");
    buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
    buf.extend_from_slice(track);

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_midi;
    use midly::Smf;
    use pretty_assertions::assert_eq;

    fn two_notes() -> Vec<Event> {
        vec![
            Event::note_on(0, 0, 60, 100).with_order(1.0),
            Event::note_off(120, 0, 60).with_order(1.0),
        ]
    }

    #[test]
    fn round_trip_single_note() {
        let bytes = build_midi_file(120, &two_notes());
        let file = parse_midi(&bytes).unwrap();

        assert_eq!(file.format, 0);
        assert_eq!(file.ppq, 120);
        assert_eq!(file.tracks.len(), 1);
        assert_eq!(file.tracks[0].name.as_deref(), Some("generated"));

        let got: Vec<(u64, u8, u8)> = file.tracks[0]
            .events
            .iter()
            .map(|e| (e.tick, e.status, e.d1))
            .collect();
        assert_eq!(got, vec![(0, 0x90, 60), (120, 0x80, 60)]);
    }

    #[test]
    fn header_and_meta_layout() {
        let bytes = build_midi_file(480, &[]);
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[8..14], &[0, 0, 0, 1, 0x01, 0xE0]);
        assert_eq!(&bytes[14..18], b"MTrk");

        let track = &bytes[22..];
        // name
        assert_eq!(&track[..4], &[0x00, 0xFF, 0x03, 9]);
        assert_eq!(&track[4..13], b"generated");
        // tempo 500000 us
        assert_eq!(&track[13..20], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        // 4/4, 24 clocks, 8 32nds
        assert_eq!(&track[20..28], &[0x00, 0xFF, 0x58, 0x04, 4, 2, 24, 8]);
        // end of track
        assert_eq!(&track[28..], &[0x00, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn running_status_omits_repeated_status() {
        let events = vec![
            Event::note_on(0, 0, 60, 100),
            Event::note_on(0, 0, 64, 100),
            Event::note_on(10, 0, 60, 0),
        ];
        let bytes = build_midi_file(96, &events);
        let track = &bytes[22..];
        let body = &track[28..track.len() - 4];
        assert_eq!(body, &[0x00, 0x90, 60, 100, 0x00, 64, 100, 0x0A, 60, 0]);
    }

    #[test]
    fn sorts_by_tick_then_order() {
        let events = vec![
            Event::note_off(10, 0, 62).with_order(2.0),
            Event::note_on(10, 0, 64, 90).with_order(1.0),
            Event::note_on(0, 0, 62, 90),
        ];
        let file = parse_midi(&build_midi_file(96, &events)).unwrap();
        let got: Vec<(u64, u8)> = file.tracks[0].events.iter().map(|e| (e.tick, e.d1)).collect();
        assert_eq!(got, vec![(0, 62), (10, 64), (10, 62)]);
    }

    #[test]
    fn clamped_gap_keeps_later_spacing() {
        let max = MAX_VAR_LEN as u64;
        let events = vec![
            Event::note_on(0, 0, 60, 90),
            Event::note_off(max + 10, 0, 60),
            Event::note_on(max + 30, 0, 62, 90),
        ];
        let file = parse_midi(&build_midi_file(96, &events)).unwrap();
        let ticks: Vec<u64> = file.tracks[0].events.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, max, max + 20]);
    }

    #[test]
    fn single_data_byte_messages_omit_d2() {
        let events = vec![Event::new(0, 0xC1, 7, 99), Event::new(0, 0xD1, 50, 99)];
        let file = parse_midi(&build_midi_file(96, &events)).unwrap();
        assert_eq!(
            file.tracks[0].events,
            vec![Event::new(0, 0xC1, 7, 0), Event::new(0, 0xD1, 50, 0)]
        );
    }

    #[test]
    fn masks_data_bytes_and_skips_system_messages() {
        let mut wild = Event::note_on(0, 0, 60, 100);
        wild.d1 = 0xBC;
        wild.d2 = 0xFF;
        let sysex = Event {
            status: 0xF0,
            ..Event::note_on(5, 0, 0, 0)
        };
        let file = parse_midi(&build_midi_file(96, &[wild, sysex])).unwrap();
        assert_eq!(file.tracks[0].events, vec![Event::new(0, 0x90, 0x3C, 0x7F)]);
    }

    #[test]
    fn custom_tempo_and_meter() {
        let options = WriterOptions {
            track_name: "comp".into(),
            bpm: 90.0,
            time_signature: TimeSignature {
                numerator: 6,
                denominator: 8,
            },
        };
        let bytes = build_midi_file_with(480, &two_notes(), &options);
        let smf = Smf::parse(&bytes).expect("generated MIDI should be valid");

        let mut tempo = None;
        let mut signature = None;
        for event in &smf.tracks[0] {
            match event.kind {
                midly::TrackEventKind::Meta(midly::MetaMessage::Tempo(t)) => tempo = Some(t.as_int()),
                midly::TrackEventKind::Meta(midly::MetaMessage::TimeSignature(n, d, c, b)) => {
                    signature = Some((n, d, c, b))
                }
                _ => {}
            }
        }
        assert_eq!(tempo, Some(666_667));
        assert_eq!(signature, Some((6, 3, 24, 8)));
    }

    #[test]
    fn midly_accepts_output() {
        let bytes = build_midi_file(120, &two_notes());
        let smf = Smf::parse(&bytes).expect("valid SMF");
        assert_eq!(smf.header.format, midly::Format::SingleTrack);
        assert_eq!(smf.tracks.len(), 1);

        let note_ons = smf.tracks[0]
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    midly::TrackEventKind::Midi {
                        message: midly::MidiMessage::NoteOn { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(note_ons, 1);
    }
}
