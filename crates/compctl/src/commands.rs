//! Subcommand implementations.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use compconf::{CompingConfig, PipelineConfig};
use comping::{
    adjust_soloing_window_transpose, normalize_midi, select_soloing_x32_window, HistoryPolicy,
    PipelineOptions, SeededRandom, Segment, TransposeLimit, WindowAnchor, WindowReference,
};
use midi_codec::{parse_midi, MidiFile};
use serde::Serialize;
use tracing::info;

use crate::Mode;

fn read_midi(path: &Path) -> Result<MidiFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_midi(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

fn pipeline_options(config: &PipelineConfig) -> PipelineOptions {
    PipelineOptions {
        max_eighths: config.max_eighths,
        trim_max_eighths: config.trim_max_eighths,
        limit_lengths: config.limit_lengths,
        trim_outliers: config.trim_outliers,
    }
}

#[derive(Debug, Serialize)]
struct FileSummary {
    format: u16,
    ppq: u16,
    end_tick: u64,
    tracks: Vec<TrackSummary>,
}

#[derive(Debug, Serialize)]
struct TrackSummary {
    index: usize,
    name: Option<String>,
    events: usize,
    notes: usize,
    end_tick: u64,
}

pub fn inspect(path: &Path, json: bool) -> Result<()> {
    let file = read_midi(path)?;

    let summary = FileSummary {
        format: file.format,
        ppq: file.ppq,
        end_tick: file.end_tick(),
        tracks: file
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| TrackSummary {
                index,
                name: track.name.clone(),
                events: track.events.len(),
                notes: track.events.iter().filter(|e| e.is_note_on()).count(),
                end_tick: track.end_tick,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("format: {}", summary.format);
    println!("ppq: {}", summary.ppq);
    println!("end tick: {}", summary.end_tick);
    println!("tracks: {}", summary.tracks.len());
    for track in &summary.tracks {
        println!(
            "  [{}] {:<16} events={} notes={} end={}",
            track.index,
            track.name.as_deref().unwrap_or("-"),
            track.events,
            track.notes,
            track.end_tick
        );
    }
    Ok(())
}

pub fn normalize(config: &CompingConfig, input: &Path, output: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let normalized = normalize_midi(&bytes, &pipeline_options(&config.pipeline))
        .with_context(|| format!("Failed to normalize {}", input.display()))?;

    std::fs::write(output, &normalized)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        bytes = normalized.len(),
        "wrote normalized file"
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct AnchorReport {
    mode: &'static str,
    variant: String,
    ppq: u16,
    tick_per_eighth: u64,
    win_eighths: u64,
    windows_per_file: usize,
    bars_per_file: u64,
    dummies: usize,
    windows: Vec<WindowReport>,
}

#[derive(Debug, Serialize)]
struct WindowReport {
    index: usize,
    start_tick: u64,
    end_tick: u64,
    anchor: Option<WindowAnchor>,
}

pub fn anchors(
    config: &CompingConfig,
    path: &Path,
    mode: Mode,
    window_eighths: Option<u64>,
) -> Result<()> {
    let file = read_midi(path)?;

    let (label, reference) = match mode {
        Mode::Soloing => {
            let win = window_eighths.unwrap_or(config.reference.window_eighths);
            ("soloing", WindowReference::from_midi(&file, win).prepare_soloing())
        }
        Mode::Salsa => {
            let win = window_eighths.unwrap_or(config.reference.salsa_window_eighths);
            let reference = WindowReference::from_midi(&file, win)
                .with_variant("salsa")
                .prepare_salsa()
                .with_context(|| format!("{} is not a salsa reference", path.display()))?;
            ("salsa", reference)
        }
    };

    let report = AnchorReport {
        mode: label,
        variant: reference.variant.clone(),
        ppq: reference.ppq,
        tick_per_eighth: reference.tick_per_eighth,
        win_eighths: reference.win_eighths,
        windows_per_file: reference.windows_per_file,
        bars_per_file: reference.bars_per_file,
        dummies: reference.events.iter().filter(|e| e.dummy).count() / 2,
        windows: (0..reference.windows_per_file)
            .map(|index| {
                let (start_tick, end_tick) = reference.window_span(index);
                WindowReport {
                    index,
                    start_tick,
                    end_tick,
                    anchor: reference.anchors.get(index).copied().flatten(),
                }
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Parse `"Cmaj7:8,Dm7:8"` into back-to-back segments.
fn parse_chords(chords: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut start = 0u32;

    for item in chords.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((token, dur)) = item.split_once(':') else {
            bail!("chord {item:?} needs a length, e.g. {item}:8");
        };
        let dur: u32 = dur
            .trim()
            .parse()
            .with_context(|| format!("bad length in chord {item:?}"))?;
        if dur == 0 {
            bail!("chord {item:?} has zero length");
        }

        segments.push(Segment {
            start_eighth: start,
            dur_eighth: dur,
            token: token.to_string(),
            quality: chord_quality(token).to_string(),
            ref_variant: "x32".to_string(),
            transpose: 0,
        });
        start += dur;
    }

    if segments.is_empty() {
        bail!("no chords given");
    }
    Ok(segments)
}

/// Everything after the root and its accidental: "F#m7" -> "m7".
fn chord_quality(token: &str) -> &str {
    let mut chars = token.char_indices().skip(1);
    match chars.next() {
        Some((i, '#' | 'b')) => &token[i + 1..],
        Some((i, _)) => &token[i..],
        None => "",
    }
}

#[derive(Debug, Serialize)]
struct Placement {
    token: String,
    quality: String,
    start_eighth: u32,
    dur_eighth: u32,
    window_start_eighth: u64,
    window_index: u64,
    start_eighth_for_window: u64,
    candidate: Option<String>,
    transpose: i32,
}

pub fn select(
    config: &CompingConfig,
    path: &Path,
    chords: &str,
    seed: Option<u64>,
    window_eighths: Option<u64>,
) -> Result<()> {
    let segments = parse_chords(chords)?;
    let file = read_midi(path)?;
    let win = window_eighths.unwrap_or(config.reference.window_eighths);
    let reference = WindowReference::from_midi(&file, win).prepare_soloing();

    let seed = seed.or(config.reference.seed).unwrap_or_else(clock_seed);
    info!(seed, segments = segments.len(), "selecting windows");

    let mut rng = SeededRandom::new(seed as u128);
    let mut policy = HistoryPolicy::new(config.reference.history_depth, ((seed as u128) << 64) | 1);
    let limit = TransposeLimit::for_variant(&reference.variant);

    let mut prev_last: Option<u8> = None;
    let mut placements = Vec::with_capacity(segments.len());
    for segment in &segments {
        let selection = select_soloing_x32_window(&reference, segment, &segment.quality, &mut rng, &mut policy);
        let anchor = reference
            .anchors
            .get(selection.window_index as usize)
            .copied()
            .flatten();

        let transpose = adjust_soloing_window_transpose(prev_last, anchor.map(|a| a.first), 0, limit);
        prev_last = anchor.map(|a| (a.last as i32 + transpose).clamp(0, 127) as u8);

        placements.push(Placement {
            token: segment.token.clone(),
            quality: segment.quality.clone(),
            start_eighth: segment.start_eighth,
            dur_eighth: segment.dur_eighth,
            window_start_eighth: selection.window_start_eighth,
            window_index: selection.window_index,
            start_eighth_for_window: selection.start_eighth_for_window,
            candidate: selection.candidate,
            transpose,
        });
    }

    println!("{}", serde_json::to_string_pretty(&placements)?);
    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
