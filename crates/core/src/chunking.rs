//! Chunk scheduling for windowed frame generation.
//!
//! Splits a pose-frame sequence of arbitrary length into overlapping,
//! bounded-size windows so each inference call stays within a fixed
//! memory/compute envelope. Pure functions only; no owned state.

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default number of pose frames per inference window.
pub const DEFAULT_WINDOW: usize = 16;
/// Default number of frames shared between consecutive windows.
pub const DEFAULT_OVERLAP: usize = 4;

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A contiguous `[start, end)` range over the pose-frame sequence.
///
/// `overlap` is the number of leading frames shared with the previous
/// chunk; it is always 0 for the first chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub overlap: usize,
}

impl Chunk {
    /// Number of pose frames covered by this chunk.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a window/overlap pair.
///
/// - `window` must be positive.
/// - `overlap` must be strictly smaller than `window`.
/// - `2 * overlap` must not exceed `window`, otherwise a chunk would share
///   frames with a non-adjacent chunk.
pub fn validate_window(window: usize, overlap: usize) -> Result<(), CoreError> {
    if window == 0 {
        return Err(CoreError::InvalidWindow(
            "window size must be greater than 0".to_string(),
        ));
    }
    if overlap >= window {
        return Err(CoreError::InvalidWindow(format!(
            "overlap ({overlap}) must be smaller than window size ({window})"
        )));
    }
    if overlap * 2 > window {
        return Err(CoreError::InvalidWindow(format!(
            "overlap ({overlap}) must not exceed half the window size ({window})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Split `total` pose frames into overlapping windows.
///
/// Chunk `i > 0` starts at `previous.end - overlap`. The final chunk shrinks
/// to the remaining frames; nothing is padded. When `total <= window` a
/// single chunk covers everything. `total == 0` yields an empty plan.
pub fn plan_chunks(total: usize, window: usize, overlap: usize) -> Result<Vec<Chunk>, CoreError> {
    validate_window(window, overlap)?;

    let mut chunks = Vec::new();
    if total == 0 {
        return Ok(chunks);
    }

    let mut start = 0;
    let mut end = window.min(total);
    chunks.push(Chunk {
        index: 0,
        start,
        end,
        overlap: 0,
    });

    while end < total {
        start = end - overlap;
        end = (start + window).min(total);
        chunks.push(Chunk {
            index: chunks.len(),
            start,
            end,
            overlap,
        });
    }

    Ok(chunks)
}

/// Number of output frames after all chunks are cross-faded together.
pub fn stitched_len(chunks: &[Chunk]) -> usize {
    chunks.iter().map(|c| c.len() - c.overlap).sum()
}

/// Upper bound on pose frames consumed for a requested clip duration.
///
/// Durations of zero seconds still consume at least one frame.
pub fn frame_budget(duration_secs: u32, fps: u32) -> usize {
    (duration_secs.max(1) as usize) * (fps.max(1) as usize)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(chunks: &[Chunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start, c.end)).collect()
    }

    // -- plan_chunks --

    #[test]
    fn forty_frames_window_sixteen_overlap_four() {
        let chunks = plan_chunks(40, 16, 4).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 16), (12, 28), (24, 40)]);
        assert_eq!(chunks[0].overlap, 0);
        assert_eq!(chunks[1].overlap, 4);
        assert_eq!(chunks[2].overlap, 4);
        assert_eq!(stitched_len(&chunks), 40);
    }

    #[test]
    fn final_chunk_shrinks_to_remainder() {
        let chunks = plan_chunks(30, 16, 4).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 16), (12, 28), (24, 30)]);
        assert_eq!(chunks[2].len(), 6);
    }

    #[test]
    fn single_chunk_when_total_fits_window() {
        let chunks = plan_chunks(10, 16, 4).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 10)]);
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn single_chunk_when_total_equals_window() {
        let chunks = plan_chunks(16, 16, 4).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 16)]);
    }

    #[test]
    fn empty_sequence_yields_empty_plan() {
        assert!(plan_chunks(0, 16, 4).unwrap().is_empty());
    }

    #[test]
    fn zero_overlap_tiles_without_sharing() {
        let chunks = plan_chunks(10, 4, 0).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn indices_are_sequential() {
        let chunks = plan_chunks(100, 16, 4).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    // -- validation --

    #[test]
    fn zero_window_rejected() {
        assert!(matches!(
            plan_chunks(10, 0, 0),
            Err(CoreError::InvalidWindow(_))
        ));
    }

    #[test]
    fn overlap_equal_to_window_rejected() {
        assert!(matches!(
            plan_chunks(10, 4, 4),
            Err(CoreError::InvalidWindow(_))
        ));
    }

    #[test]
    fn overlap_above_half_window_rejected() {
        assert!(matches!(
            validate_window(16, 9),
            Err(CoreError::InvalidWindow(_))
        ));
        assert!(validate_window(16, 8).is_ok());
    }

    // -- coverage property --

    #[test]
    fn chunks_cover_range_without_gaps_or_distant_sharing() {
        for total in 0..80 {
            for window in 1..20 {
                for overlap in 0..=window / 2 {
                    if overlap >= window {
                        continue;
                    }
                    let chunks = plan_chunks(total, window, overlap).unwrap();
                    if total == 0 {
                        assert!(chunks.is_empty());
                        continue;
                    }

                    assert_eq!(chunks.first().unwrap().start, 0);
                    assert_eq!(chunks.last().unwrap().end, total);
                    assert_eq!(stitched_len(&chunks), total);

                    for pair in chunks.windows(2) {
                        assert_eq!(pair[1].start, pair[0].end - overlap);
                        assert!(pair[1].end > pair[0].end, "plan must make progress");
                        assert!(pair[1].len() > pair[1].overlap);
                    }
                    for i in 0..chunks.len() {
                        assert!(chunks[i].len() <= window);
                        for j in (i + 2)..chunks.len() {
                            assert!(
                                chunks[i].end <= chunks[j].start,
                                "non-adjacent chunks {i} and {j} share frames \
                                 (total={total}, window={window}, overlap={overlap})"
                            );
                        }
                    }
                }
            }
        }
    }

    // -- frame_budget --

    #[test]
    fn budget_scales_with_duration() {
        assert_eq!(frame_budget(5, 25), 125);
        assert_eq!(frame_budget(2, 25), 50);
    }

    #[test]
    fn budget_never_zero() {
        assert_eq!(frame_budget(0, 25), 25);
        assert_eq!(frame_budget(3, 0), 3);
    }
}
