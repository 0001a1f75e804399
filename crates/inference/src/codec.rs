//! Wire helpers for moving frames to and from the model server and FFmpeg.
//!
//! Still images travel as PNG; frame sequences travel as tightly packed
//! RGB24, one frame after another.

use motionweave_core::frame::{rgb_len, Frame};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("raw frame buffer of {len} bytes is not a whole number of {width}x{height} RGB frames")]
    Misaligned { len: usize, width: u32, height: u32 },

    #[error("frame sequence is empty")]
    Empty,

    #[error("frame {index} is {actual_w}x{actual_h}, expected {width}x{height}")]
    MixedSizes {
        index: usize,
        width: u32,
        height: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("image codec error: {0}")]
    Image(String),
}

/// Split a concatenated RGB24 stream into frames of `width` x `height`.
pub fn split_rgb_frames(bytes: &[u8], width: u32, height: u32) -> Result<Vec<Frame>, CodecError> {
    let frame_len = rgb_len(width, height);
    if frame_len == 0 || bytes.len() % frame_len != 0 {
        return Err(CodecError::Misaligned {
            len: bytes.len(),
            width,
            height,
        });
    }

    bytes
        .chunks_exact(frame_len)
        .map(|chunk| {
            Frame::from_rgb(width, height, chunk.to_vec())
                .map_err(|e| CodecError::Image(e.to_string()))
        })
        .collect()
}

/// Size shared by every frame in the sequence.
pub fn uniform_size(frames: &[Frame]) -> Result<(u32, u32), CodecError> {
    let first = frames.first().ok_or(CodecError::Empty)?;
    let (width, height) = first.dimensions();

    for (index, frame) in frames.iter().enumerate().skip(1) {
        let (actual_w, actual_h) = frame.dimensions();
        if (actual_w, actual_h) != (width, height) {
            return Err(CodecError::MixedSizes {
                index,
                width,
                height,
                actual_w,
                actual_h,
            });
        }
    }
    Ok((width, height))
}

pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    frame.to_png().map_err(|e| CodecError::Image(e.to_string()))
}

pub fn decode_image(bytes: &[u8]) -> Result<Frame, CodecError> {
    Frame::decode(bytes).map_err(|e| CodecError::Image(e.to_string()))
}

/// Multipart field name for the pose map at `position` within a window.
pub fn pose_part_name(position: usize) -> String {
    format!("pose_{position:03}")
}
