//! Wire frame sent to the classifier board.
//!
//! ```text
//! offset 0: width    (uint16, little-endian)
//! offset 2: height   (uint16, little-endian)
//! offset 4: channels (uint8)
//! offset 5: pixel bytes, row-major, width*height*channels long
//! ```
//!
//! The firmware reads exactly 5 header bytes and then blocks until the full
//! pixel payload has arrived, so nothing else may be interleaved.

use serde::{Deserialize, Serialize};

/// Header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// Input shape of the model flashed on the board.
pub const MODEL_WIDTH: u16 = 96;
pub const MODEL_HEIGHT: u16 = 96;
pub const MODEL_CHANNELS: u8 = 3;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid buffer shape: expected {expected} bytes for {width}x{height}x{channels}, got {actual}")]
    InvalidBufferShape {
        width: u16,
        height: u16,
        channels: u8,
        expected: usize,
        actual: usize,
    },
}

/// Image dimensions as they appear in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub width: u16,
    pub height: u16,
    pub channels: u8,
}

impl ImageShape {
    pub fn new(width: u16, height: u16, channels: u8) -> Self {
        Self { width, height, channels }
    }

    /// Number of pixel bytes a buffer of this shape must hold.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    pub fn to_header_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[0..2].copy_from_slice(&self.width.to_le_bytes());
        header[2..4].copy_from_slice(&self.height.to_le_bytes());
        header[4] = self.channels;
        header
    }

    fn check(&self, pixels: &[u8]) -> Result<(), FrameError> {
        let expected = self.byte_len();
        if pixels.len() != expected {
            return Err(FrameError::InvalidBufferShape {
                width: self.width,
                height: self.height,
                channels: self.channels,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(())
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::new(MODEL_WIDTH, MODEL_HEIGHT, MODEL_CHANNELS)
    }
}

/// Row-major pixel data whose length always matches its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    shape: ImageShape,
    pixels: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(shape: ImageShape, pixels: Vec<u8>) -> Result<Self, FrameError> {
        shape.check(&pixels)?;
        Ok(Self { shape, pixels })
    }

    /// For callers that build `pixels` from `shape` themselves.
    pub(crate) fn from_parts(shape: ImageShape, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), shape.byte_len());
        Self { shape, pixels }
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Build the frame for `pixels`: 5 header bytes followed by the pixels.
pub fn encode(width: u16, height: u16, channels: u8, pixels: &[u8]) -> Result<Vec<u8>, FrameError> {
    let shape = ImageShape::new(width, height, channels);
    shape.check(pixels)?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + pixels.len());
    frame.extend_from_slice(&shape.to_header_bytes());
    frame.extend_from_slice(pixels);
    Ok(frame)
}

/// Same as [`encode`] for an already validated buffer.
pub fn encode_buffer(buffer: &ImageBuffer) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + buffer.pixels.len());
    frame.extend_from_slice(&buffer.shape.to_header_bytes());
    frame.extend_from_slice(&buffer.pixels);
    frame
}
