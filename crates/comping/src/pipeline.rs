use midi_codec::{build_midi_file_with, parse_midi, Event, WriterOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::filter::disable_unsupported_midi_messages;
use crate::limit::{enforce_max_note_length, DEFAULT_MAX_EIGHTHS};
use crate::sanitize::sanitize_events;
use crate::trim::{drop_long_notes_and_sustain, DEFAULT_TRIM_MAX_EIGHTHS};

/// Order given to parsed events, so that forced note-offs (order - 1) sort
/// ahead of the note-on that superseded them.
const PARSED_EVENT_ORDER: f64 = 3.0;

/// Which normalization stages run, and their caps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Length cap for every note, in eighths. Default: 3.
    pub max_eighths: u32,
    /// Hard cap used by the outlier trimmer, in eighths. Default: 4.
    pub trim_max_eighths: u32,
    /// Run the duration limiter. Default: true.
    pub limit_lengths: bool,
    /// Run the outlier trimmer. Default: true.
    pub trim_outliers: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_eighths: DEFAULT_MAX_EIGHTHS,
            trim_max_eighths: DEFAULT_TRIM_MAX_EIGHTHS,
            limit_lengths: true,
            trim_outliers: true,
        }
    }
}

/// Sanitize → limit → trim → filter.
pub fn normalize_events(
    events: &[Event],
    tick_per_eighth: u64,
    options: &PipelineOptions,
) -> Vec<Event> {
    let mut events = sanitize_events(events);

    if options.limit_lengths {
        events = enforce_max_note_length(&events, tick_per_eighth, options.max_eighths);
    }
    if options.trim_outliers {
        events = drop_long_notes_and_sustain(&events, tick_per_eighth, options.trim_max_eighths);
    }

    let events = disable_unsupported_midi_messages(&events);
    debug!(events = events.len(), tick_per_eighth, "normalized events");
    events
}

/// Normalize `events` and write them as a format 0 file.
pub fn render_midi(ppq: u16, events: &[Event], options: &PipelineOptions) -> Vec<u8> {
    render_midi_with(ppq, events, options, &WriterOptions::default())
}

pub fn render_midi_with(
    ppq: u16,
    events: &[Event],
    options: &PipelineOptions,
    writer: &WriterOptions,
) -> Vec<u8> {
    let tick_per_eighth = (ppq / 2) as u64;
    let normalized = normalize_events(events, tick_per_eighth, options);
    build_midi_file_with(ppq, &normalized, writer)
}

/// Parse a file, merge its tracks, normalize and write it back out.
pub fn normalize_midi(bytes: &[u8], options: &PipelineOptions) -> crate::Result<Vec<u8>> {
    let file = parse_midi(bytes)?;
    let events: Vec<Event> = file
        .merged_events()
        .into_iter()
        .map(|event| match event.order {
            Some(_) => event,
            None => event.with_order(PARSED_EVENT_ORDER),
        })
        .collect();
    info!(
        format = file.format,
        ppq = file.ppq,
        tracks = file.tracks.len(),
        events = events.len(),
        "normalizing MIDI file"
    );
    Ok(render_midi(file.ppq, &events, options))
}
