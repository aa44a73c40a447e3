//! Hand-pose adapter.
//!
//! A `HandLandmarker` turns a frame into hand landmarks, `HandFeatures`
//! normalizes one hand into the classifier's input space, and a
//! `GestureClassifier` maps that to an index into `GESTURE_LABELS`.

use anyhow::{anyhow, Result};

mod backend;
pub mod backends;
mod features;
mod registry;
mod result;

pub use backend::{GestureClassifier, HandLandmarker};
pub use backends::{canned_hand, LinearClassifier, StubClassifier, StubLandmarker};
pub use features::{HandFeatures, FEATURE_LEN};
pub use registry::{build_classifier, build_landmarker, BackendSettings};
pub use result::{Classification, Handedness, HandObservation, Landmark, LANDMARK_COUNT, WRIST};

/// Gesture names, indexed by classifier output.
pub const GESTURE_LABELS: [&str; 14] = [
    "one",
    "five",
    "fist",
    "ok",
    "heartSingle",
    "yearh",
    "three",
    "four",
    "six",
    "Iloveyou",
    "gun",
    "thumbUp",
    "nine",
    "pink",
];

/// Name for a classifier index. Out-of-range indices are an error.
pub fn label_name(index: usize) -> Result<&'static str> {
    GESTURE_LABELS
        .get(index)
        .copied()
        .ok_or_else(|| anyhow!("label index {} outside the {}-entry table", index, GESTURE_LABELS.len()))
}

/// Index for a gesture name.
pub fn label_index(name: &str) -> Result<usize> {
    GESTURE_LABELS
        .iter()
        .position(|label| *label == name)
        .ok_or_else(|| anyhow!("unknown gesture label '{}'", name))
}
