//! Frame ingestion.
//!
//! - `StreamSource`: live upstream (RTSP/RTMP/HTTP/file URIs via GStreamer,
//!   `stub://` synthetic frames for tests and demos)
//! - `ImageFileSource`: still images for one-shot probing
//! - `StreamSupervisor`: the reconnect state machine wrapped around any
//!   `FrameStream`, plus the fps meter
//!
//! The ingestion layer never retains frames. Each frame is handed to the
//! caller and forgotten.

use anyhow::Result;

use crate::frame::Frame;

pub mod file;
#[cfg(feature = "rtsp-gstreamer")]
pub(crate) mod gstreamer;
pub(crate) mod normalize;
pub mod stream;
pub mod supervisor;

pub use file::{ImageFileConfig, ImageFileSource};
pub use stream::{StreamConfig, StreamSource, StreamStats};
pub use supervisor::{FpsMeter, SourceState, Step, StreamSupervisor, SupervisorStats};

/// A stream that can be opened, read frame by frame, and released.
///
/// `open` failing means the upstream is unavailable right now. `read_frame`
/// failing (end of stream or decode error) means the connection is gone; the
/// caller releases and reopens.
pub trait FrameStream {
    /// Source description for log lines (usually the URI).
    fn describe(&self) -> String;

    fn open(&mut self) -> Result<()>;

    fn read_frame(&mut self) -> Result<Frame>;

    /// Drop any open connection. Safe to call when already released.
    fn release(&mut self);
}
