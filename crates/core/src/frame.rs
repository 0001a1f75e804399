//! RGB frame buffers exchanged between the pipeline and its capabilities.

use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::error::CoreError;
use crate::stitching::Blend;

/// A single 8-bit RGB video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an existing RGB image.
    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from a tightly packed RGB24 buffer.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CoreError> {
        let expected = rgb_len(width, height);
        if pixels.len() != expected {
            return Err(CoreError::Validation(format!(
                "RGB buffer for {width}x{height} must be {expected} bytes, got {}",
                pixels.len()
            )));
        }
        RgbImage::from_raw(width, height, pixels)
            .map(Self::from_image)
            .ok_or_else(|| CoreError::Internal("RGB buffer rejected by image crate".into()))
    }

    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from_image(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Raw RGB24 bytes, row-major.
    pub fn as_rgb(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_rgb(self) -> Vec<u8> {
        self.image.into_raw()
    }

    /// Resize to exactly `width` x `height` (no aspect preservation).
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self::from_image(image::imageops::resize(
            &self.image,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| CoreError::Internal(format!("PNG encode failed: {e}")))?;
        Ok(buf.into_inner())
    }

    /// Decode any supported still-image format (PNG, JPEG, WebP).
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| CoreError::Validation(format!("image decode failed: {e}")))?;
        Ok(Self::from_image(image.to_rgb8()))
    }
}

impl Blend for Frame {
    fn blend(&self, other: &Self, alpha: f64) -> Result<Self, CoreError> {
        if self.dimensions() != other.dimensions() {
            let (aw, ah) = self.dimensions();
            let (bw, bh) = other.dimensions();
            return Err(CoreError::Validation(format!(
                "cannot blend {aw}x{ah} frame with {bw}x{bh} frame"
            )));
        }

        let alpha = alpha.clamp(0.0, 1.0);
        let pixels = self
            .as_rgb()
            .iter()
            .zip(other.as_rgb())
            .map(|(&a, &b)| (a as f64 * (1.0 - alpha) + b as f64 * alpha).round() as u8)
            .collect();

        Self::from_rgb(self.width(), self.height(), pixels)
    }
}

/// Pose map extracted from one driving-video frame.
///
/// `index` is the source frame's position in the driving video; pose frames
/// are produced in that order and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    pub index: usize,
    pub map: Frame,
}

/// Byte length of a packed RGB24 frame.
pub fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}
