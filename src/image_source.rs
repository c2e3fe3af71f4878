//! Turning image files into frames the board accepts.
use std::path::Path;

use image::imageops::{self, FilterType};

use crate::serial::{FrameError, ImageBuffer, ImageShape};

#[derive(Debug, thiserror::Error)]
pub enum ImageSourceError {
    #[error("failed to load image {0}: {1}")]
    Load(String, image::ImageError),
    #[error("only RGB targets are supported, got {0} channels")]
    UnsupportedChannels(u8),
    #[error(transparent)]
    Shape(#[from] FrameError),
}

/// Decode `path`, convert to RGB and resize to `shape` (bilinear).
pub fn load_image(path: &Path, shape: ImageShape) -> Result<ImageBuffer, ImageSourceError> {
    if shape.channels != 3 {
        return Err(ImageSourceError::UnsupportedChannels(shape.channels));
    }

    let decoded = image::open(path).map_err(|e| ImageSourceError::Load(path.display().to_string(), e))?;
    log::debug!("Loaded {} ({}x{})", path.display(), decoded.width(), decoded.height());

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, shape.width as u32, shape.height as u32, FilterType::Triangle);
    Ok(ImageBuffer::new(shape, resized.into_raw())?)
}

/// Deterministic gradient used when no image is available.
pub fn test_pattern(shape: ImageShape) -> ImageBuffer {
    let (width, height, channels) = (shape.width as usize, shape.height as usize, shape.channels as usize);
    let mut pixels = Vec::with_capacity(shape.byte_len());
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let value = match c % 3 {
                    0 => x * 255 / width.max(1),
                    1 => y * 255 / height.max(1),
                    _ => (x + y) * 255 / (width + height).max(1),
                };
                pixels.push(value as u8);
            }
        }
    }
    // Length is width*height*channels by construction
    ImageBuffer::from_parts(shape, pixels)
}
