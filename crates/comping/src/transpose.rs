use serde::{Deserialize, Serialize};

/// Largest leap allowed between consecutive windows, in semitones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransposeLimit {
    /// 11 semitones, used by the soloing variants.
    MajorSeventh,
    /// 17 semitones, used by the salsa variant.
    Eleventh,
}

impl TransposeLimit {
    pub fn max_interval(self) -> i32 {
        match self {
            TransposeLimit::MajorSeventh => 11,
            TransposeLimit::Eleventh => 17,
        }
    }

    /// Limit for a reference variant name.
    pub fn for_variant(variant: &str) -> Self {
        if variant.starts_with("salsa") {
            TransposeLimit::Eleventh
        } else {
            TransposeLimit::MajorSeventh
        }
    }
}

/// Shift `base` by whole octaves so the next window starts close to where
/// the previous one ended.
///
/// Returns `base` unchanged when either pitch is unknown. Otherwise the
/// octave shift with the fewest octaves that keeps the leap within `limit`
/// wins; between equally short shifts the smaller total transpose is used.
pub fn adjust_soloing_window_transpose(
    prev_last: Option<u8>,
    next_first: Option<u8>,
    base: i32,
    limit: TransposeLimit,
) -> i32 {
    let (Some(prev), Some(next)) = (prev_last, next_first) else {
        return base;
    };

    let max = limit.max_interval();
    let leap = next as i32 + base - prev as i32;
    let nearest = -(leap as f64 / 12.0).round() as i32;

    (nearest - 2..=nearest + 2)
        .filter(|k| (leap + 12 * k).abs() <= max)
        .min_by_key(|k| (k.abs(), (base + 12 * k).abs()))
        .map_or(base, |k| base + 12 * k)
}
