//! Decoded video frames.
//!
//! A `Frame` lives for exactly one trip through the relay loop: the stream
//! produces it, the pipeline normalizes it and (maybe) runs the landmarker on
//! it, then it is dropped. Nothing retains frames.

use anyhow::{anyhow, Result};
use std::time::Instant;

use crate::ingest::normalize::{flip_horizontal, resize_nearest};

/// Working size every frame is normalized to before classification.
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Packed RGB24 frame tagged with its arrival instant.
///
/// Pixel bytes are private; collaborators borrow them through `pixels()`.
/// There is no `Clone`: a frame is moved, never copied.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    arrived_at: Instant,
}

impl Frame {
    /// Wrap a packed RGB24 buffer. Fails if the length does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, arrived_at: Instant) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            arrived_at,
        })
    }

    pub fn arrived_at(&self) -> Instant {
        self.arrived_at
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Resize to `width`x`height`, keeping the arrival instant.
    ///
    /// Returns the frame unchanged when it already has the requested size.
    pub fn resized(self, width: u32, height: u32) -> Result<Self> {
        if self.width == width && self.height == height {
            return Ok(self);
        }
        let data = resize_nearest(&self.data, self.width, self.height, width, height)?;
        Frame::new(data, width, height, self.arrived_at)
    }

    /// Mirror left to right, as a selfie camera would show it.
    pub fn mirrored(mut self) -> Result<Self> {
        flip_horizontal(&mut self.data, self.width, self.height)?;
        Ok(self)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("arrived_at", &self.arrived_at)
            .finish_non_exhaustive()
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(3))
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))
}
