//! Live stream source.
//!
//! `StreamSource` picks its backend from the URL:
//! - `stub://...`: synthetic frames, with optional scripted failures
//! - anything else: GStreamer `uridecodebin` (feature `rtsp-gstreamer`)
//!
//! Synthetic query parameters:
//! - `fail_opens=N`: the first N `open` calls fail
//! - `frames=M`: each connection ends after M frames (0 = never)
//! - `fps=F`: pace frames at F per second (0 = as fast as asked)

use anyhow::{anyhow, Context, Result};
use std::time::{Duration, Instant};
use url::Url;

#[cfg(feature = "rtsp-gstreamer")]
use super::gstreamer::GstreamerSource;
use super::FrameStream;
use crate::frame::{rgb_len, Frame, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};

const DEFAULT_SYNTHETIC_FPS: u32 = 25;

/// Configuration for a live stream source.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Stream URL (e.g., "rtmp://10.0.0.5:1935/stream1", "rtsp://cam/stream", "stub://demo").
    pub url: String,
    /// Frame width for synthetic frames.
    pub width: u32,
    /// Frame height for synthetic frames.
    pub height: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

/// Live stream source.
pub struct StreamSource {
    backend: StreamBackend,
}

enum StreamBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "rtsp-gstreamer")]
    Gstreamer(GstreamerSource),
}

impl StreamSource {
    pub fn new(config: StreamConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: StreamBackend::Synthetic(SyntheticSource::new(config)?),
            })
        } else {
            #[cfg(feature = "rtsp-gstreamer")]
            {
                Ok(Self {
                    backend: StreamBackend::Gstreamer(GstreamerSource::new(config)?),
                })
            }
            #[cfg(not(feature = "rtsp-gstreamer"))]
            {
                anyhow::bail!(
                    "stream {} requires the rtsp-gstreamer feature",
                    config.url
                )
            }
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> StreamStats {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "rtsp-gstreamer")]
            StreamBackend::Gstreamer(source) => source.stats(),
        }
    }
}

impl FrameStream for StreamSource {
    fn describe(&self) -> String {
        self.stats().url
    }

    fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "rtsp-gstreamer")]
            StreamBackend::Gstreamer(source) => source.open(),
        }
    }

    fn read_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.read_frame(),
            #[cfg(feature = "rtsp-gstreamer")]
            StreamBackend::Gstreamer(source) => source.read_frame(),
        }
    }

    fn release(&mut self) {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "rtsp-gstreamer")]
            StreamBackend::Gstreamer(source) => source.release(),
        }
    }
}

/// Statistics for a stream source.
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticSource {
    config: StreamConfig,
    fail_opens: u32,
    frames_per_connection: u64,
    frame_interval: Duration,
    open: bool,
    open_calls: u32,
    frames_this_connection: u64,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    fn new(config: StreamConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse stub stream url")?;
        let mut fail_opens = 0;
        let mut frames_per_connection = 0;
        let mut fps = DEFAULT_SYNTHETIC_FPS;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "fail_opens" => fail_opens = value.parse().context("invalid fail_opens")?,
                "frames" => frames_per_connection = value.parse().context("invalid frames")?,
                "fps" => fps = value.parse().context("invalid fps")?,
                other => return Err(anyhow!("unknown stub stream parameter '{}'", other)),
            }
        }
        let frame_interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis((1000 / fps as u64).max(1))
        };
        Ok(Self {
            config,
            fail_opens,
            frames_per_connection,
            frame_interval,
            open: false,
            open_calls: 0,
            frames_this_connection: 0,
            frame_count: 0,
            last_frame_at: None,
        })
    }

    fn open(&mut self) -> Result<()> {
        self.open_calls += 1;
        if self.open_calls <= self.fail_opens {
            return Err(anyhow!(
                "synthetic stream {} refused connection ({}/{})",
                self.config.url,
                self.open_calls,
                self.fail_opens
            ));
        }
        self.open = true;
        self.frames_this_connection = 0;
        log::info!("StreamSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(anyhow!("synthetic stream not open"));
        }
        if self.frames_per_connection > 0
            && self.frames_this_connection >= self.frames_per_connection
        {
            return Err(anyhow!("synthetic stream ended"));
        }

        if let Some(last) = self.last_frame_at {
            let due = last + self.frame_interval;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        let pixels = self.generate_synthetic_pixels()?;
        self.frame_count += 1;
        self.frames_this_connection += 1;
        let now = Instant::now();
        self.last_frame_at = Some(now);

        Frame::new(pixels, self.config.width, self.config.height, now)
    }

    fn release(&mut self) {
        self.open = false;
    }

    /// Moving diagonal gradient, so consecutive frames differ.
    fn generate_synthetic_pixels(&self) -> Result<Vec<u8>> {
        let mut pixels = vec![0u8; rgb_len(self.config.width, self.config.height)?];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        Ok(pixels)
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}
