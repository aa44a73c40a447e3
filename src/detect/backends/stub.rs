use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::detect::backend::{GestureClassifier, HandLandmarker};
use crate::detect::features::HandFeatures;
use crate::detect::result::{
    Classification, Handedness, HandObservation, Landmark, LANDMARK_COUNT, WRIST,
};
use crate::frame::Frame;

/// Stub landmarker for tests and demos.
///
/// Replays a script of per-frame hand lists, one entry per `detect` call,
/// cycling when the script runs out. The default script is a single open
/// right hand on every frame.
pub struct StubLandmarker {
    script: Vec<Vec<HandObservation>>,
    cursor: usize,
}

impl StubLandmarker {
    pub fn new() -> Self {
        Self::scripted(vec![vec![canned_hand(0, Handedness::Right)]])
    }

    /// Replay `script` in order. An empty inner list is a frame with no hand.
    pub fn scripted(script: Vec<Vec<HandObservation>>) -> Self {
        Self { script, cursor: 0 }
    }

    /// `Some(handedness)` is one canned hand, `None` is an empty frame.
    pub fn from_presence(pattern: &[Option<Handedness>]) -> Self {
        Self::scripted(
            pattern
                .iter()
                .map(|hand| match hand {
                    Some(handedness) => vec![canned_hand(0, *handedness)],
                    None => Vec::new(),
                })
                .collect(),
        )
    }
}

impl Default for StubLandmarker {
    fn default() -> Self {
        Self::new()
    }
}

impl HandLandmarker for StubLandmarker {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<HandObservation>> {
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let hands = self.script[self.cursor % self.script.len()].clone();
        self.cursor += 1;
        Ok(hands)
    }
}

/// Open hand, fingers spread upward from the wrist.
pub fn canned_hand(hand_index: usize, handedness: Handedness) -> HandObservation {
    let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
    landmarks[WRIST] = Landmark::new(0.5, 0.8, 0.0);
    for (i, landmark) in landmarks.iter_mut().enumerate().skip(1) {
        let finger = (i - 1) / 4;
        let joint = ((i - 1) % 4 + 1) as f32;
        *landmark = Landmark::new(
            0.38 + finger as f32 * 0.06,
            0.8 - joint * 0.08,
            -0.01 * joint,
        );
    }
    HandObservation {
        hand_index,
        handedness,
        landmarks,
    }
}

/// Stub classifier for tests and demos.
///
/// Either answers a fixed classification for every input, or replays a
/// script of outcomes (cycling). A scripted `Err` surfaces as a
/// classification failure.
pub struct StubClassifier {
    script: Mutex<(Vec<std::result::Result<Classification, String>>, usize)>,
}

impl StubClassifier {
    pub fn fixed(label_index: usize, confidence: f32) -> Self {
        Self::scripted(vec![Ok(Classification {
            label_index,
            confidence,
        })])
    }

    pub fn scripted(script: Vec<std::result::Result<Classification, String>>) -> Self {
        Self {
            script: Mutex::new((script, 0)),
        }
    }
}

impl GestureClassifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&self, _features: &HandFeatures) -> Result<Classification> {
        let mut guard = self
            .script
            .lock()
            .map_err(|_| anyhow!("stub classifier lock poisoned"))?;
        let (script, cursor) = &mut *guard;
        if script.is_empty() {
            return Err(anyhow!("stub classifier has no script"));
        }
        let outcome = script[*cursor % script.len()].clone();
        *cursor += 1;
        outcome.map_err(|reason| anyhow!(reason))
    }
}
