//! Writer output re-parsed by the reader reproduces the written events.

use midi_codec::{build_midi_file, parse_midi, Event};
use pretty_assertions::assert_eq;

fn fingerprint(events: &[Event]) -> Vec<(u64, u8, u8, u8, u8)> {
    events
        .iter()
        .map(|e| (e.tick, e.status, e.ch, e.d1, e.d2))
        .collect()
}

#[test]
fn two_note_file_parses_back() {
    let events = vec![Event::new(0, 0x90, 60, 100), Event::new(120, 0x80, 60, 0)];

    let file = parse_midi(&build_midi_file(120, &events)).unwrap();

    assert_eq!(file.format, 0);
    assert_eq!(file.tracks.len(), 1);
    assert_eq!(file.tracks[0].events.len(), 2);
    assert_eq!(fingerprint(&file.tracks[0].events), fingerprint(&events));
    assert_eq!(file.tracks[0].end_tick, 120);
}

#[test]
fn mixed_channel_messages_survive() {
    let events = vec![
        Event::new(0, 0xC3, 24, 0),
        Event::new(0, 0x93, 48, 80),
        Event::new(0, 0xB3, 7, 100),
        Event::new(30, 0xE3, 0x00, 0x40),
        Event::new(30, 0xD3, 90, 0),
        Event::new(200_000, 0x83, 48, 64),
        Event::new(200_000, 0x9F, 72, 1),
        Event::new(200_001, 0x9F, 72, 0),
    ];

    let file = parse_midi(&build_midi_file(960, &events)).unwrap();

    assert_eq!(file.ppq, 960);
    assert_eq!(fingerprint(&file.tracks[0].events), fingerprint(&events));
}

#[test]
fn unsorted_input_is_written_in_time_order() {
    let events = vec![
        Event::note_off(480, 2, 67),
        Event::note_on(0, 2, 67, 90),
        Event::note_on(240, 2, 71, 90),
        Event::note_off(480, 2, 71),
    ];

    let file = parse_midi(&build_midi_file(480, &events)).unwrap();

    let ticks: Vec<u64> = file.tracks[0].events.iter().map(|e| e.tick).collect();
    assert_eq!(ticks, vec![0, 240, 480, 480]);
}
