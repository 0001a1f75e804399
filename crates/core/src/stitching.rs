//! Cross-fade stitching of independently generated chunks.
//!
//! Consecutive chunks share `overlap` frames. The stitcher replaces each
//! shared pair with a linear blend that ramps from the earlier chunk to the
//! later one, so the seam between windows is not visible as a hard cut.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Blend
// ---------------------------------------------------------------------------

/// A value that can be linearly interpolated with another of the same kind.
///
/// `alpha = 0.0` must reproduce `self`, `alpha = 1.0` must reproduce `other`.
pub trait Blend: Sized {
    fn blend(&self, other: &Self, alpha: f64) -> Result<Self, CoreError>;
}

impl Blend for f64 {
    fn blend(&self, other: &Self, alpha: f64) -> Result<Self, CoreError> {
        Ok(self * (1.0 - alpha) + other * alpha)
    }
}

// ---------------------------------------------------------------------------
// Alpha schedule
// ---------------------------------------------------------------------------

/// Alpha used for a single-frame overlap (an unweighted cross-over).
pub const SINGLE_FRAME_ALPHA: f64 = 0.5;

/// Blend weight for position `i` of an `overlap`-frame transition.
///
/// - `overlap >= 2`: `i / (overlap - 1)`, so the first blended frame is the
///   earlier chunk and the last is the later chunk.
/// - `overlap == 1`: [`SINGLE_FRAME_ALPHA`].
pub fn blend_alpha(i: usize, overlap: usize) -> f64 {
    if overlap <= 1 {
        SINGLE_FRAME_ALPHA
    } else {
        i as f64 / (overlap - 1) as f64
    }
}

// ---------------------------------------------------------------------------
// Stitching
// ---------------------------------------------------------------------------

/// Merge `b` onto the end of `a`, cross-fading the `overlap` shared frames.
///
/// The result has `a.len() + b.len() - overlap` frames. An empty `a` is the
/// identity: `b` is returned unchanged. `overlap` may not exceed the length
/// of either side.
pub fn stitch<T: Blend>(mut a: Vec<T>, b: Vec<T>, overlap: usize) -> Result<Vec<T>, CoreError> {
    if a.is_empty() {
        return Ok(b);
    }
    if overlap > a.len() || overlap > b.len() {
        return Err(CoreError::Validation(format!(
            "overlap {overlap} exceeds chunk lengths ({} and {})",
            a.len(),
            b.len()
        )));
    }

    let tail_a = a.split_off(a.len() - overlap);
    let mut b = b.into_iter();

    let mut out = a;
    out.reserve(tail_a.len() + b.len());

    for (i, tail) in tail_a.iter().enumerate() {
        // `b` has at least `overlap` items, checked above.
        let Some(head) = b.next() else { break };
        out.push(tail.blend(&head, blend_alpha(i, overlap))?);
    }
    out.extend(b);

    Ok(out)
}

/// Left-fold [`stitch`] over generated chunks in order.
///
/// Each item carries the overlap it shares with its predecessor; the first
/// item's overlap is ignored.
pub fn stitch_chunks<T, I>(chunks: I) -> Result<Vec<T>, CoreError>
where
    T: Blend,
    I: IntoIterator<Item = (Vec<T>, usize)>,
{
    chunks
        .into_iter()
        .try_fold(Vec::new(), |acc, (frames, overlap)| stitch(acc, frames, overlap))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
