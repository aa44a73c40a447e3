use anyhow::Result;

use super::features::HandFeatures;
use super::result::{Classification, HandObservation};
use crate::frame::Frame;

/// Hand-landmark extractor.
///
/// # Audit Boundary
///
/// Implementations receive a borrowed frame and must not retain pixels past
/// the `detect` call, write to disk, or make network requests.
pub trait HandLandmarker: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Zero or more hands found in the frame, in landmarker order.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Gesture classifier over normalized hand features.
///
/// Constructed once at startup and shared read-only.
pub trait GestureClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(&self, features: &HandFeatures) -> Result<Classification>;
}
