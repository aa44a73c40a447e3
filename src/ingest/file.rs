//! Still-image frame source.
//!
//! `ImageFileSource` walks a fixed list of local image files and yields one
//! frame per file, then reports end of stream. Used for one-shot probing of
//! stills rather than live relaying.
//!
//! Paths starting with `stub://` yield a synthetic frame instead of decoding,
//! so the probe path can be exercised without image fixtures. Real files need
//! the `ingest-image` feature.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Instant;

use super::FrameStream;
use crate::frame::{Frame, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};

/// Configuration for a still-image source.
#[derive(Clone, Debug, Default)]
pub struct ImageFileConfig {
    /// Local image paths (JPEG or PNG), read in order.
    pub paths: Vec<PathBuf>,
}

pub struct ImageFileSource {
    config: ImageFileConfig,
    next: usize,
    open: bool,
}

impl ImageFileSource {
    pub fn new(config: ImageFileConfig) -> Result<Self> {
        for path in &config.paths {
            let text = path.to_string_lossy();
            if !is_local_file_path(&text) {
                return Err(anyhow!(
                    "image ingestion only supports local paths (got {})",
                    text
                ));
            }
        }
        Ok(Self {
            config,
            next: 0,
            open: false,
        })
    }

    /// Path of the frame most recently returned by `read_frame`.
    pub fn current_path(&self) -> Option<&PathBuf> {
        self.next.checked_sub(1).and_then(|i| self.config.paths.get(i))
    }

    pub fn remaining(&self) -> usize {
        self.config.paths.len().saturating_sub(self.next)
    }
}

impl FrameStream for ImageFileSource {
    fn describe(&self) -> String {
        format!("images ({} files)", self.config.paths.len())
    }

    fn open(&mut self) -> Result<()> {
        if self.config.paths.is_empty() {
            return Err(anyhow!("no image paths configured"));
        }
        self.open = true;
        self.next = 0;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(anyhow!("image source not open"));
        }
        let path = self
            .config
            .paths
            .get(self.next)
            .cloned()
            .ok_or_else(|| anyhow!("no more images"))?;
        self.next += 1;

        let arrived_at = Instant::now();
        if path.to_string_lossy().starts_with("stub://") {
            let pixels = vec![128u8; (DEFAULT_FRAME_WIDTH * DEFAULT_FRAME_HEIGHT * 3) as usize];
            return Frame::new(pixels, DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT, arrived_at);
        }
        decode_image(&path, arrived_at)
    }

    fn release(&mut self) {
        self.open = false;
    }
}

#[cfg(feature = "ingest-image")]
fn decode_image(path: &std::path::Path, arrived_at: Instant) -> Result<Frame> {
    use anyhow::Context;

    let image = image::open(path)
        .with_context(|| format!("decode image {}", path.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    Frame::new(image.into_raw(), width, height, arrived_at)
}

#[cfg(not(feature = "ingest-image"))]
fn decode_image(path: &std::path::Path, _arrived_at: Instant) -> Result<Frame> {
    Err(anyhow!(
        "decoding {} requires the ingest-image feature",
        path.display()
    ))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
