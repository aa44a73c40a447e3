//! GStreamer-backed live source.
//!
//! Pipeline: `uridecodebin uri=<url> ! videoconvert ! video/x-raw,format=RGB ! appsink`.
//! `uridecodebin` covers rtsp://, rtmp://, http(s):// and file:// upstreams.
//! A pipeline is built on every `open` and torn down on `release`, so a
//! reconnect always starts from a clean decoder.

use anyhow::{anyhow, Context, Result};
use gstreamer::prelude::*;
use std::time::Instant;

use super::stream::{StreamConfig, StreamStats};
use crate::frame::Frame;

const OPEN_TIMEOUT_SECS: u64 = 10;
const FRAME_TIMEOUT_MS: u64 = 5_000;

pub(crate) struct GstreamerSource {
    config: StreamConfig,
    pipeline: Option<(gstreamer::Pipeline, gstreamer_app::AppSink)>,
    frame_count: u64,
}

impl GstreamerSource {
    pub(crate) fn new(config: StreamConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;
        Ok(Self {
            config,
            pipeline: None,
            frame_count: 0,
        })
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        self.release();

        let description = format!(
            "uridecodebin uri={} ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            self.config.url
        );
        let pipeline = gstreamer::parse::launch(&description)
            .context("build stream pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("stream pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        if let Err(err) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(anyhow!("set stream pipeline to Playing: {}", err));
        }

        let (result, _, _) = pipeline.state(gstreamer::ClockTime::from_seconds(OPEN_TIMEOUT_SECS));
        if let Err(err) = result {
            let detail = drain_bus_error(&pipeline).unwrap_or_else(|| err.to_string());
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(anyhow!("stream {} did not start: {}", self.config.url, detail));
        }

        log::info!("StreamSource: connected to {}", self.config.url);
        self.pipeline = Some((pipeline, appsink));
        Ok(())
    }

    pub(crate) fn read_frame(&mut self) -> Result<Frame> {
        let (pipeline, appsink) = self
            .pipeline
            .as_ref()
            .ok_or_else(|| anyhow!("stream not open"))?;

        if let Some(detail) = drain_bus_error(pipeline) {
            return Err(anyhow!(detail));
        }

        let sample = appsink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(FRAME_TIMEOUT_MS))
            .ok_or_else(|| {
                if appsink.is_eos() {
                    anyhow!("stream reached end of stream")
                } else {
                    anyhow!("stream stalled")
                }
            })?;
        let arrived_at = Instant::now();
        let (pixels, width, height) = sample_to_pixels(&sample)?;
        self.frame_count += 1;

        Frame::new(pixels, width, height, arrived_at)
    }

    pub(crate) fn release(&mut self) {
        if let Some((pipeline, _)) = self.pipeline.take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
        }
    }

    pub(crate) fn stats(&self) -> StreamStats {
        StreamStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

impl Drop for GstreamerSource {
    fn drop(&mut self) {
        self.release();
    }
}

fn drain_bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(message) = bus.pop() {
        use gstreamer::MessageView;
        match message.view() {
            MessageView::Error(err) => {
                return Some(format!(
                    "gstreamer error from {:?}: {}",
                    err.src().map(|s| s.path_string()),
                    err.error()
                ));
            }
            MessageView::Eos(..) => return Some("gstreamer reached EOS".to_string()),
            _ => {}
        }
    }
    None
}

fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("stream sample missing buffer")?;
    let caps = sample.caps().context("stream sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse stream caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map stream buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data.get(..len).context("stream buffer is truncated")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("stream buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
