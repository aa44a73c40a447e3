//! Values flowing from the classifier to the remote consumer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One accepted per-frame classification.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureObservation {
    pub label: String,
    /// Classifier confidence in 0..=1.
    pub confidence: f32,
    pub timestamp: Instant,
}

impl GestureObservation {
    pub fn new(label: impl Into<String>, confidence: f32, timestamp: Instant) -> Self {
        Self {
            label: label.into(),
            confidence,
            timestamp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Gesture,
}

/// Confirmed gesture, as sent to the consumer:
/// `{"type":"gesture","data":"<label>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: String,
}

impl GestureEvent {
    pub fn gesture(label: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Gesture,
            data: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.data
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize gesture event")
    }
}
