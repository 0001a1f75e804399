//! Output resolution parsing.
//!
//! Accepts either a named portrait preset (`1080p`, `720p`, `480p`) or an
//! explicit `WIDTHxHEIGHT` string.

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Default resolution label for new jobs.
pub const DEFAULT_RESOLUTION: &str = "1080p";

/// Portrait presets (9:16) keyed by label.
pub const PRESETS: &[(&str, (u32, u32))] = &[
    ("1080p", (576, 1024)),
    ("720p", (432, 768)),
    ("480p", (288, 512)),
];

/// Maximum dimension (width or height) accepted for generation.
const MAX_DIMENSION: u32 = 4096;

/* --------------------------------------------------------------------------
Parsing
-------------------------------------------------------------------------- */

/// Resolve a resolution label into `(width, height)` in pixels.
pub fn parse_resolution(label: &str) -> Result<(u32, u32), CoreError> {
    let label = label.trim();
    if let Some((_, dims)) = PRESETS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
    {
        return Ok(*dims);
    }

    let (w, h) = label
        .split_once(['x', 'X'])
        .ok_or_else(|| unknown_resolution(label))?;
    let width: u32 = w.trim().parse().map_err(|_| unknown_resolution(label))?;
    let height: u32 = h.trim().parse().map_err(|_| unknown_resolution(label))?;

    validate_dimensions(width, height)?;
    Ok((width, height))
}

/// Dimensions must be positive, even (for yuv420p encoding) and bounded.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Width and height must be greater than 0".to_string(),
        ));
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(CoreError::Validation(format!(
            "Width and height must be even (got {width}x{height})"
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CoreError::Validation(format!(
            "Dimensions must not exceed {MAX_DIMENSION}px (got {width}x{height})"
        )));
    }
    Ok(())
}

fn unknown_resolution(label: &str) -> CoreError {
    let presets: Vec<&str> = PRESETS.iter().map(|(name, _)| *name).collect();
    CoreError::Validation(format!(
        "Unknown resolution '{label}'. Use WIDTHxHEIGHT or one of: {}",
        presets.join(", ")
    ))
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
