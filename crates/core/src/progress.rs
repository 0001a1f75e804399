//! Stage-to-progress mapping.
//!
//! Translates the orchestrator's current stage (and, while generating, the
//! completed-chunk ratio) into an integer percentage. Values are chosen so
//! that walking the stages in order never decreases the percentage.

use crate::job::JobStage;

pub const PROGRESS_QUEUED: u8 = 0;
pub const PROGRESS_INITIALIZING: u8 = 5;
pub const PROGRESS_EXTRACTING: u8 = 10;
pub const PROGRESS_EXTRACTED: u8 = 20;
pub const PROGRESS_GENERATING_END: u8 = 90;
pub const PROGRESS_ENHANCING: u8 = 90;
pub const PROGRESS_ENHANCED: u8 = 95;
pub const PROGRESS_FINALIZING: u8 = 97;
pub const PROGRESS_COMPLETED: u8 = 100;

/// Progress reported on entering `stage`.
///
/// `Failed` has no percentage of its own; callers keep the last value.
pub fn stage_entry_progress(stage: JobStage) -> Option<u8> {
    match stage {
        JobStage::Queued => Some(PROGRESS_QUEUED),
        JobStage::Initializing => Some(PROGRESS_INITIALIZING),
        JobStage::ExtractingPose => Some(PROGRESS_EXTRACTING),
        JobStage::GeneratingAnimation => Some(PROGRESS_EXTRACTED),
        JobStage::Enhancing => Some(PROGRESS_ENHANCING),
        JobStage::Finalizing => Some(PROGRESS_FINALIZING),
        JobStage::Completed => Some(PROGRESS_COMPLETED),
        JobStage::Failed => None,
    }
}

/// Progress while generating, after `completed` of `total` chunks are done.
///
/// Scales linearly across `[PROGRESS_EXTRACTED, PROGRESS_GENERATING_END]`.
pub fn generation_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_GENERATING_END;
    }
    let completed = completed.min(total);
    let span = (PROGRESS_GENERATING_END - PROGRESS_EXTRACTED) as usize;
    PROGRESS_EXTRACTED + (span * completed / total) as u8
}
