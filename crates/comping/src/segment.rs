use serde::{Deserialize, Serialize};

use crate::reference::SALSA_WINDOW_EIGHTHS;

/// One chord (or phrase) of the generated timeline, in eighth notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_eighth: u32,
    pub dur_eighth: u32,
    pub token: String,
    pub quality: String,
    pub ref_variant: String,
    pub transpose: i32,
}

/// Anticipate chord changes the way salsa 2-3 clave phrasing does.
///
/// Every segment after time zero moves one eighth earlier, or two when it
/// starts on a 16-eighth window boundary. Starts stay strictly increasing
/// and durations are recomputed from the new starts, the last one filling
/// up to `total_eighth`.
pub fn adjust_salsa_segments(segments: &mut [Segment], total_eighth: u32) {
    if segments.is_empty() {
        return;
    }

    let window = SALSA_WINDOW_EIGHTHS as u32;
    for i in 0..segments.len() {
        let start = segments[i].start_eighth;
        if start == 0 {
            continue;
        }

        let shift = if start % window == 0 { 2 } else { 1 };
        let mut shifted = start.saturating_sub(shift);

        if i > 0 && shifted <= segments[i - 1].start_eighth {
            shifted = segments[i - 1].start_eighth + 1;
        }
        segments[i].start_eighth = shifted;
    }

    for i in 0..segments.len() - 1 {
        segments[i].dur_eighth = segments[i + 1]
            .start_eighth
            .saturating_sub(segments[i].start_eighth);
    }
    if let Some(last) = segments.last_mut() {
        last.dur_eighth = total_eighth.saturating_sub(last.start_eighth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segments(starts: &[u32]) -> Vec<Segment> {
        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| Segment {
                start_eighth: start,
                dur_eighth: 4,
                token: format!("A{}", i + 1),
                quality: "A".into(),
                ref_variant: "1".into(),
                transpose: 0,
            })
            .collect()
    }

    fn starts(segments: &[Segment]) -> Vec<u32> {
        segments.iter().map(|s| s.start_eighth).collect()
    }

    fn durations(segments: &[Segment]) -> Vec<u32> {
        segments.iter().map(|s| s.dur_eighth).collect()
    }

    #[test]
    fn clave_anticipation() {
        let mut segs = segments(&[0, 4, 8, 12, 16]);

        adjust_salsa_segments(&mut segs, 24);

        assert_eq!(starts(&segs), vec![0, 3, 7, 11, 14]);
        assert_eq!(durations(&segs), vec![3, 4, 4, 3, 10]);
        assert_eq!(segs[4].token, "A5");
    }

    #[test]
    fn collisions_snap_after_predecessor() {
        let mut segs = segments(&[0, 1, 2, 16, 17]);

        adjust_salsa_segments(&mut segs, 32);

        // 1 -> 0 collides with 0 -> 1; 2 -> 1 collides -> 2; 16 -> 14; 17 -> 16
        assert_eq!(starts(&segs), vec![0, 1, 2, 14, 16]);
        assert_eq!(durations(&segs), vec![1, 1, 12, 2, 16]);
    }

    #[test]
    fn last_duration_saturates() {
        let mut segs = segments(&[0, 40]);
        adjust_salsa_segments(&mut segs, 16);
        assert_eq!(durations(&segs), vec![39, 0]);
    }

    #[test]
    fn empty_is_noop() {
        let mut segs: Vec<Segment> = Vec::new();
        adjust_salsa_segments(&mut segs, 24);
        assert!(segs.is_empty());
    }
}
