//! Image source: decoding, RGB frames, and face crops.

use crate::types::BoundingBox;
use image::{DynamicImage, RgbImage};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("image dimensions are zero")]
    ZeroDimensions,
}

/// A decoded RGB image, the input both ONNX models consume.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: RgbImage,
}

impl Frame {
    pub fn new(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// RGB pixel at (x, y), or `None` outside the frame.
    pub fn pixel(&self, x: i64, y: i64) -> Option<[u8; 3]> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        self.pixels.get_pixel_checked(x, y).map(|p| p.0)
    }
}

/// Read and decode an image file, sniffing the format from its contents.
pub fn load_image(path: &Path) -> Result<DynamicImage, FrameError> {
    let bytes = std::fs::read(path).map_err(|source| FrameError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_image(&bytes)
}

/// Decode an in-memory image buffer.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, FrameError> {
    let image = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(FrameError::ZeroDimensions);
    }
    tracing::debug!(width = image.width(), height = image.height(), "image decoded");
    Ok(image)
}

/// Integer pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Smallest integer rectangle covering `face`, clamped to the image.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn from_bounding_box(face: &BoundingBox, image_width: u32, image_height: u32) -> Option<Self> {
        if !(face.x.is_finite() && face.y.is_finite() && face.width.is_finite() && face.height.is_finite()) {
            return None;
        }

        let x0 = face.x.floor().clamp(0.0, image_width as f32) as u32;
        let y0 = face.y.floor().clamp(0.0, image_height as f32) as u32;
        let x1 = (face.x + face.width).ceil().clamp(0.0, image_width as f32) as u32;
        let y1 = (face.y + face.height).ceil().clamp(0.0, image_height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Extract the detected face region from the source image.
pub fn crop_face(image: &DynamicImage, face: &BoundingBox) -> Option<DynamicImage> {
    let region = CropRegion::from_bounding_box(face, image.width(), image.height())?;
    Some(image.crop_imm(region.x, region.y, region.width, region.height))
}
