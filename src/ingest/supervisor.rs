//! Reconnect state machine around a `FrameStream`.
//!
//! Two states, no terminal one:
//!
//! ```text
//! Disconnected --open ok-----> Connected
//! Disconnected --open fails--> Disconnected   (after reconnect_delay)
//! Connected    --read fails--> Disconnected   (stream released)
//! ```
//!
//! The loop only ends when the `Interrupt` fires. It is checked before every
//! step, and reconnect delays wait on it.

use std::time::{Duration, Instant};

use super::FrameStream;
use crate::error::RelayError;
use crate::frame::Frame;
use crate::shutdown::Interrupt;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const FPS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    Disconnected,
    Connected,
}

/// Result of one supervisor step.
#[derive(Debug)]
pub enum Step {
    Connected,
    Frame(Frame),
    /// Open failed; the reconnect delay has already elapsed.
    Unavailable(RelayError),
    /// Read failed; the stream was released.
    Disconnected(RelayError),
    Stopped,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub open_attempts: u64,
    pub connects: u64,
    pub disconnects: u64,
    pub frames: u64,
}

pub struct StreamSupervisor<S: FrameStream> {
    stream: S,
    state: SourceState,
    reconnect_delay: Duration,
    fps: FpsMeter,
    stats: SupervisorStats,
}

impl<S: FrameStream> StreamSupervisor<S> {
    pub fn new(stream: S, reconnect_delay: Duration) -> Self {
        Self {
            stream,
            state: SourceState::Disconnected,
            reconnect_delay,
            fps: FpsMeter::new(),
            stats: SupervisorStats::default(),
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Advance the state machine by one transition or one frame.
    pub fn step(&mut self, interrupt: &dyn Interrupt) -> Step {
        if interrupt.is_triggered() {
            self.stop();
            return Step::Stopped;
        }

        match self.state {
            SourceState::Disconnected => {
                self.stats.open_attempts += 1;
                match self.stream.open() {
                    Ok(()) => {
                        self.state = SourceState::Connected;
                        self.stats.connects += 1;
                        self.fps.reset();
                        Step::Connected
                    }
                    Err(err) => {
                        let failure = RelayError::stream_unavailable(&self.stream.describe(), &err);
                        log::info!(
                            "{}; retrying in {:.1}s",
                            failure,
                            self.reconnect_delay.as_secs_f64()
                        );
                        if !interrupt.wait(self.reconnect_delay) {
                            return Step::Stopped;
                        }
                        Step::Unavailable(failure)
                    }
                }
            }
            SourceState::Connected => match self.stream.read_frame() {
                Ok(frame) => {
                    self.stats.frames += 1;
                    if let Some(fps) = self.fps.tick(frame.arrived_at()) {
                        log::debug!("observed fps: {:.2}", fps);
                    }
                    Step::Frame(frame)
                }
                Err(err) => {
                    let failure = RelayError::frame_read(&self.stream.describe(), &err);
                    log::info!("{}; reconnecting", failure);
                    self.stream.release();
                    self.state = SourceState::Disconnected;
                    self.stats.disconnects += 1;
                    Step::Disconnected(failure)
                }
            },
        }
    }

    /// Run until interrupted, handing every frame to `on_frame` in arrival order.
    pub fn run<F>(&mut self, interrupt: &dyn Interrupt, mut on_frame: F) -> SupervisorStats
    where
        F: FnMut(Frame),
    {
        loop {
            match self.step(interrupt) {
                Step::Frame(frame) => on_frame(frame),
                Step::Stopped => break,
                Step::Connected | Step::Unavailable(_) | Step::Disconnected(_) => {}
            }
        }
        log::info!(
            "stream supervisor stopped: opens={} connects={} disconnects={} frames={}",
            self.stats.open_attempts,
            self.stats.connects,
            self.stats.disconnects,
            self.stats.frames
        );
        self.stats.clone()
    }

    fn stop(&mut self) {
        if self.state == SourceState::Connected {
            self.stream.release();
            self.state = SourceState::Disconnected;
        }
    }
}

/// Frames-per-second over rolling one-second windows. Observability only.
#[derive(Debug)]
pub struct FpsMeter {
    window_start: Option<Instant>,
    frames: u32,
    last: Option<f64>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
            last: None,
        }
    }

    /// Count a frame. Returns the fps figure when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed < FPS_WINDOW {
            return None;
        }
        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.window_start = Some(now);
        self.frames = 0;
        self.last = Some(fps);
        Some(fps)
    }

    /// Most recent completed window.
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    fn reset(&mut self) {
        self.window_start = None;
        self.frames = 0;
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}
