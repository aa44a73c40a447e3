//! Gesture relay
//!
//! Turns a live video stream into a debounced hand-gesture signal and pushes
//! each confirmed gesture to a remote consumer.
//!
//! # Architecture
//!
//! One sequential ingestion loop, with two local recovery loops hanging off it:
//!
//! 1. **Reconnect**: a failed open waits and retries; a failed read drops the
//!    connection and reopens. Neither ends the relay.
//! 2. **Retry**: each confirmed gesture is delivered on its own thread with a
//!    bounded attempt budget, then dropped. Ingestion never waits on it.
//!
//! Only an explicit shutdown request ends the relay.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (`StreamSource`, `ImageFileSource`) and the
//!   `StreamSupervisor` reconnect state machine
//! - `throttle`: processing-rate gate
//! - `detect`: hand landmarker and gesture classifier backends, feature
//!   normalization, label table
//! - `stabilizer`: temporal debouncer from per-frame labels to events
//! - `dispatch`: retrying delivery over WebSocket or MQTT
//! - `pipeline`: wiring, `run_relay`
//! - `config`: file + env configuration

pub mod config;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod shutdown;
pub mod stabilizer;
pub mod throttle;

pub use config::RelayConfig;
pub use dispatch::{DispatchOutcome, Dispatcher, RetryPolicy, Transport};
pub use error::RelayError;
pub use event::{GestureEvent, GestureObservation};
pub use frame::Frame;
pub use ingest::{FrameStream, StreamSupervisor};
pub use pipeline::{run_relay, FrameOutcome, GesturePipeline, RelayStats};
pub use shutdown::{Interrupt, ShutdownSignal};
pub use stabilizer::{GestureStabilizer, LowConfidencePolicy, StabilizerConfig};
pub use throttle::Throttle;
