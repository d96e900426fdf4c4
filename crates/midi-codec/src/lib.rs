//! Standard MIDI File codec over a flat, tick-stamped event model.
//!
//! Reading produces a [`MidiFile`] whose tracks hold absolute-tick
//! [`Event`]s. Writing takes any flat event list and serializes it as a
//! single-track format 0 file.
//!
//! ```
//! use midi_codec::{build_midi_file, parse_midi, Event};
//!
//! let events = vec![Event::note_on(0, 0, 60, 100), Event::note_off(120, 0, 60)];
//! let bytes = build_midi_file(120, &events);
//! let file = parse_midi(&bytes).unwrap();
//! assert_eq!(file.tracks[0].events.len(), 2);
//! ```

pub mod bytes;
pub mod event;
pub mod reader;
pub mod writer;

pub use bytes::{read_var_len, write_var_len, MAX_VAR_LEN};
pub use event::{sort_by_tick_and_kind, sort_by_tick_and_order, Event, MidiFile, Track};
pub use reader::{parse_midi, parse_track};
pub use writer::{build_midi_file, build_midi_file_with, TimeSignature, WriterOptions};

/// Errors from decoding Standard MIDI Files.
///
/// All of them are fatal to the file being parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("bad chunk tag at offset {offset}: expected {expected:?}, found {found:?}")]
    BadChunkTag {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("SMPTE timecode division {0:#06x} is not supported")]
    SmpteDivision(u16),

    #[error("running status used at offset {offset} before any status byte")]
    InvalidRunningStatus { offset: usize },

    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("unsupported status byte {status:#04x} at offset {offset}")]
    UnsupportedStatus { status: u8, offset: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
