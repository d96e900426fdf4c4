//! Standard MIDI File parsing into absolute-tick tracks.

use tracing::{debug, trace};

use crate::bytes::{expect_tag, read_u16, read_u32, read_var_len};
use crate::event::{Event, MidiFile, Track};
use crate::{Error, Result};

const META: u8 = 0xFF;
const SYSEX: u8 = 0xF0;
const SYSEX_ESCAPE: u8 = 0xF7;
const META_TRACK_NAME: u8 = 0x03;

fn byte_at(buf: &[u8], pos: usize) -> Result<u8> {
    buf.get(pos)
        .copied()
        .ok_or(Error::UnexpectedEof { offset: pos })
}

fn slice_at(buf: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    buf.get(pos..pos + len).ok_or(Error::UnexpectedEof {
        offset: buf.len().min(pos + len),
    })
}

/// Parse a complete Standard MIDI File.
///
/// Only metrical (PPQ) division is supported. Each `MTrk` chunk is sliced to
/// its declared length and parsed independently.
pub fn parse_midi(bytes: &[u8]) -> Result<MidiFile> {
    expect_tag(bytes, 0, b"MThd")?;
    let header_len = read_u32(bytes, 4)? as usize;
    let format = read_u16(bytes, 8)?;
    let ntrks = read_u16(bytes, 10)?;
    let division = read_u16(bytes, 12)?;

    if division & 0x8000 != 0 {
        return Err(Error::SmpteDivision(division));
    }
    let ppq = division;

    let mut pos = 8 + header_len;
    let mut tracks = Vec::with_capacity(ntrks as usize);

    for index in 0..ntrks {
        expect_tag(bytes, pos, b"MTrk")?;
        let len = read_u32(bytes, pos + 4)? as usize;
        let start = pos + 8;
        let data = slice_at(bytes, start, len)?;

        let track = parse_track(data)?;
        trace!(
            index,
            events = track.events.len(),
            end_tick = track.end_tick,
            "parsed track"
        );
        tracks.push(track);
        pos = start + len;
    }

    debug!(format, ppq, tracks = tracks.len(), "parsed MIDI file");

    Ok(MidiFile {
        format,
        ppq,
        tracks,
    })
}

/// Parse the payload of one `MTrk` chunk.
///
/// Offsets in errors are relative to the start of the payload.
pub fn parse_track(bytes: &[u8]) -> Result<Track> {
    let mut pos = 0;
    let mut tick: u64 = 0;
    let mut running_status: Option<u8> = None;
    let mut name = None;
    let mut events = Vec::new();

    while pos < bytes.len() {
        let (delta, next) = read_var_len(bytes, pos)?;
        pos = next;
        tick += delta as u64;

        let status_offset = pos;
        let mut status = byte_at(bytes, pos)?;
        pos += 1;

        if status < 0x80 {
            // Data byte: reuse the previous status and re-read this byte as data.
            status = running_status.ok_or(Error::InvalidRunningStatus {
                offset: status_offset,
            })?;
            pos -= 1;
        }

        match status {
            META => {
                let kind = byte_at(bytes, pos)?;
                let (len, next) = read_var_len(bytes, pos + 1)?;
                let payload = slice_at(bytes, next, len as usize)?;
                pos = next + len as usize;

                if kind == META_TRACK_NAME {
                    name = Some(String::from_utf8_lossy(payload).trim().to_string());
                }
            }
            SYSEX | SYSEX_ESCAPE => {
                let (len, next) = read_var_len(bytes, pos)?;
                slice_at(bytes, next, len as usize)?;
                pos = next + len as usize;
                running_status = None;
            }
            0xF1..=0xFE => {
                return Err(Error::UnsupportedStatus {
                    status,
                    offset: status_offset,
                });
            }
            _ => {
                running_status = Some(status);
                let kind = status & 0xF0;
                let d1 = byte_at(bytes, pos)?;
                pos += 1;
                let d2 = if kind == 0xC0 || kind == 0xD0 {
                    0
                } else {
                    let d2 = byte_at(bytes, pos)?;
                    pos += 1;
                    d2
                };
                events.push(Event::new(tick, status, d1, d2));
            }
        }
    }

    Ok(Track {
        name,
        events,
        end_tick: tick,
    })
}
