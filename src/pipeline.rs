//! Relay loop wiring.
//!
//! ```text
//! StreamSupervisor -> normalize -> Throttle -> HandLandmarker -> HandFeatures
//!     -> GestureClassifier -> GestureStabilizer -> Dispatcher::spawn
//! ```
//!
//! Everything left of `Dispatcher::spawn` runs sequentially on the calling
//! thread, one frame at a time, in arrival order. Deliveries run detached.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::detect::{
    build_classifier, build_landmarker, label_name, GestureClassifier, HandFeatures,
    HandLandmarker,
};
use crate::dispatch::{transport_for_url, Dispatcher};
use crate::error::RelayError;
use crate::event::{GestureEvent, GestureObservation};
use crate::frame::Frame;
use crate::ingest::{FrameStream, StreamConfig, StreamSource, StreamSupervisor, SupervisorStats};
use crate::shutdown::{Interrupt, ShutdownSignal};
use crate::stabilizer::GestureStabilizer;
use crate::throttle::Throttle;

/// What happened to one frame.
#[derive(Debug, PartialEq)]
pub enum FrameOutcome {
    /// Arrived inside the processing interval; not classified.
    Throttled,
    /// Classified, no hand present. The streak was cleared.
    NoHand,
    /// Landmarking or classification failed. The streak is untouched.
    Rejected(RelayError),
    /// Hand classified; nothing fired.
    Observed(GestureObservation),
    /// Hand classified and a gesture fired; delivery was handed off.
    Fired(GestureEvent),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub throttled: u64,
    pub no_hand: u64,
    pub rejected: u64,
    pub observed: u64,
    pub fired: u64,
}

pub struct GesturePipeline {
    width: u32,
    height: u32,
    throttle: Throttle,
    landmarker: Box<dyn HandLandmarker>,
    classifier: Arc<dyn GestureClassifier>,
    stabilizer: GestureStabilizer,
    dispatcher: Dispatcher,
    stats: PipelineStats,
}

impl GesturePipeline {
    pub fn new(
        width: u32,
        height: u32,
        throttle: Throttle,
        landmarker: Box<dyn HandLandmarker>,
        classifier: Arc<dyn GestureClassifier>,
        stabilizer: GestureStabilizer,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            width,
            height,
            throttle,
            landmarker,
            classifier,
            stabilizer,
            dispatcher,
            stats: PipelineStats::default(),
        }
    }

    /// Build backends, stabilizer and dispatcher from config. The throttle is
    /// anchored now.
    pub fn from_config(config: &RelayConfig, shutdown: &ShutdownSignal) -> Result<Self> {
        let mut landmarker = build_landmarker(&config.backend).context("build landmarker")?;
        landmarker.warm_up().context("warm up landmarker")?;
        let classifier = build_classifier(&config.backend).context("build classifier")?;
        let transport = transport_for_url(&config.dispatch.consumer_url)?;
        let dispatcher =
            Dispatcher::new(transport, config.dispatch.retry).with_shutdown(shutdown.clone());
        let stabilizer = GestureStabilizer::new(config.stabilizer.clone())?;

        log::info!(
            "pipeline: landmarker={} classifier={} consumer={}",
            landmarker.name(),
            classifier.name(),
            dispatcher.endpoint()
        );

        Ok(Self::new(
            config.stream.width,
            config.stream.height,
            Throttle::new(config.process_interval, std::time::Instant::now()),
            landmarker,
            classifier,
            stabilizer,
            dispatcher,
        ))
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn stabilizer(&self) -> &GestureStabilizer {
        &self.stabilizer
    }

    /// Run one frame through the loop. The frame is dropped on return.
    pub fn handle_frame(&mut self, frame: Frame) -> FrameOutcome {
        self.stats.frames += 1;
        let outcome = self.process(frame);
        match &outcome {
            FrameOutcome::Throttled => self.stats.throttled += 1,
            FrameOutcome::NoHand => self.stats.no_hand += 1,
            FrameOutcome::Rejected(err) => {
                self.stats.rejected += 1;
                log::warn!("{}", err);
            }
            FrameOutcome::Observed(_) => self.stats.observed += 1,
            FrameOutcome::Fired(_) => self.stats.fired += 1,
        }
        outcome
    }

    fn process(&mut self, frame: Frame) -> FrameOutcome {
        let now = frame.arrived_at();
        let frame = match frame.resized(self.width, self.height) {
            Ok(frame) => frame,
            Err(err) => return FrameOutcome::Rejected(RelayError::classification(&err)),
        };

        if !self.throttle.should_process(now) {
            return FrameOutcome::Throttled;
        }

        let hands = match self.landmarker.detect(&frame) {
            Ok(hands) => hands,
            Err(err) => return FrameOutcome::Rejected(RelayError::classification(&err)),
        };
        drop(frame);

        let Some(hand) = hands.first() else {
            self.stabilizer.observe(&[], now);
            return FrameOutcome::NoHand;
        };

        let observation = match self.classify(hand, now) {
            Ok(observation) => observation,
            Err(err) => return FrameOutcome::Rejected(RelayError::classification(&err)),
        };
        log::debug!(
            "{} hand: {} ({:.2})",
            hand.handedness.as_str(),
            observation.label,
            observation.confidence
        );

        match self
            .stabilizer
            .observe(std::slice::from_ref(&observation), now)
        {
            Some(event) => {
                log::info!(
                    "gesture confirmed: {} (confidence {:.2})",
                    event.label(),
                    observation.confidence
                );
                if let Err(err) = self.dispatcher.spawn(event.clone()) {
                    log::error!("gesture '{}' dropped: {:#}", event.label(), err);
                }
                FrameOutcome::Fired(event)
            }
            None => FrameOutcome::Observed(observation),
        }
    }

    fn classify(
        &self,
        hand: &crate::detect::HandObservation,
        now: std::time::Instant,
    ) -> Result<GestureObservation> {
        let features = HandFeatures::from_observation(hand)?;
        let classification = self.classifier.classify(&features)?;
        let label = label_name(classification.label_index)?;
        Ok(GestureObservation::new(label, classification.confidence, now))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub stream: SupervisorStats,
    pub pipeline: PipelineStats,
}

/// Feed every frame the supervisor yields through the pipeline until interrupted.
pub fn drive<S: FrameStream>(
    supervisor: &mut StreamSupervisor<S>,
    pipeline: &mut GesturePipeline,
    interrupt: &dyn Interrupt,
) -> RelayStats {
    let stream = supervisor.run(interrupt, |frame| {
        pipeline.handle_frame(frame);
    });
    RelayStats {
        stream,
        pipeline: pipeline.stats().clone(),
    }
}

/// Run the relay described by `config` until `shutdown` is requested.
///
/// Only setup errors are returned; once running, every failure is recovered
/// locally.
pub fn run_relay(config: &RelayConfig, shutdown: &ShutdownSignal) -> Result<RelayStats> {
    let source = StreamSource::new(StreamConfig {
        url: config.stream.url.clone(),
        width: config.stream.width,
        height: config.stream.height,
    })?;
    let mut pipeline = GesturePipeline::from_config(config, shutdown)?;
    let mut supervisor = StreamSupervisor::new(source, config.stream.reconnect_delay);

    log::info!(
        "relaying {} -> {} (interval {:?}, K={}, cooldown {:?})",
        config.stream.url,
        config.dispatch.consumer_url,
        config.process_interval,
        config.stabilizer.confirm_frames,
        config.stabilizer.cooldown
    );
    let stats = drive(&mut supervisor, &mut pipeline, shutdown);
    log::info!(
        "relay stopped: frames={} processed={} fired={} rejected={}",
        stats.pipeline.frames,
        stats.pipeline.frames - stats.pipeline.throttled,
        stats.pipeline.fired,
        stats.pipeline.rejected
    );
    Ok(stats)
}
