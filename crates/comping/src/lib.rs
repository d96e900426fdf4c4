//! Normalization and windowing of MIDI performances for comping/soloing.
//!
//! The normalization stages are pure functions over flat event lists:
//!
//! ```text
//! sanitize_events → enforce_max_note_length → drop_long_notes_and_sustain
//!                 → disable_unsupported_midi_messages
//! ```
//!
//! [`pipeline`] strings them together. Reference performances are chunked
//! into fixed windows by [`reference`], whose anchors drive
//! [`selector`] and [`transpose`]. [`segment`] realigns chord timelines.

pub mod filter;
pub mod limit;
pub mod pipeline;
pub mod reference;
pub mod sanitize;
pub mod segment;
pub mod selector;
pub mod transpose;
pub mod trim;

pub use filter::disable_unsupported_midi_messages;
pub use limit::enforce_max_note_length;
pub use pipeline::{normalize_events, normalize_midi, render_midi, PipelineOptions};
pub use reference::{
    prepare_salsa_reference, prepare_soloing_reference, WindowAnchor, WindowReference,
};
pub use sanitize::sanitize_events;
pub use segment::{adjust_salsa_segments, Segment};
pub use selector::{
    select_soloing_x32_window, FirstCandidate, HistoryPolicy, RandomSource, SeededRandom,
    WindowCandidate, WindowPolicy, WindowSelection,
};
pub use transpose::{adjust_soloing_window_transpose, TransposeLimit};
pub use trim::drop_long_notes_and_sustain;

/// Errors from comping operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI decode error: {0}")]
    Midi(#[from] midi_codec::Error),

    #[error("salsa 2-3 references need exactly 4 windows (64 eighth notes), found {found}")]
    SalsaWindowCount { found: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
