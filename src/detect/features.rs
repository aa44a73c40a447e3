use anyhow::{anyhow, Result};

use super::result::{Handedness, HandObservation, LANDMARK_COUNT, WRIST};

/// Length of the feature vector: (x, y) for each non-wrist landmark.
pub const FEATURE_LEN: usize = (LANDMARK_COUNT - 1) * 2;

/// Wrist-relative, mirror-normalized hand features.
///
/// Layout is `[x1, y1, x2, y2, ..., x20, y20]`. Right hands are mirrored onto
/// the left-hand frame by negating x, so one classifier serves both hands.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFeatures {
    values: [f32; FEATURE_LEN],
}

impl HandFeatures {
    pub fn from_observation(hand: &HandObservation) -> Result<Self> {
        let wrist = hand.landmarks[WRIST];
        let mirror = if hand.handedness == Handedness::Left {
            1.0
        } else {
            -1.0
        };

        let mut values = [0f32; FEATURE_LEN];
        for (i, landmark) in hand.landmarks.iter().skip(WRIST + 1).enumerate() {
            let dx = (landmark.x - wrist.x) * mirror;
            let dy = landmark.y - wrist.y;
            if !dx.is_finite() || !dy.is_finite() {
                return Err(anyhow!(
                    "landmark {} of hand {} is not finite",
                    i + 1,
                    hand.hand_index
                ));
            }
            values[i * 2] = dx;
            values[i * 2 + 1] = dy;
        }
        Ok(Self { values })
    }

    /// Wrap an already-normalized vector.
    pub fn from_values(values: [f32; FEATURE_LEN]) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::Landmark;

    fn hand(handedness: Handedness) -> HandObservation {
        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        landmarks[WRIST] = Landmark::new(0.5, 0.5, 0.0);
        for (i, landmark) in landmarks.iter_mut().enumerate().skip(1) {
            *landmark = Landmark::new(0.5 + i as f32 * 0.01, 0.5 - i as f32 * 0.02, 0.3);
        }
        HandObservation {
            hand_index: 0,
            handedness,
            landmarks,
        }
    }

    #[test]
    fn left_hand_is_wrist_relative_and_drops_z() -> Result<()> {
        let features = HandFeatures::from_observation(&hand(Handedness::Left))?;
        let values = features.as_slice();
        assert_eq!(values.len(), 40);
        assert!((values[0] - 0.01).abs() < 1e-6);
        assert!((values[1] + 0.02).abs() < 1e-6);
        assert!((values[38] - 0.20).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn right_hand_is_mirrored() -> Result<()> {
        let left = HandFeatures::from_observation(&hand(Handedness::Left))?;
        let right = HandFeatures::from_observation(&hand(Handedness::Right))?;
        for (l, r) in left.as_slice().chunks(2).zip(right.as_slice().chunks(2)) {
            assert!((l[0] + r[0]).abs() < 1e-6);
            assert!((l[1] - r[1]).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn non_finite_landmark_is_rejected() {
        let mut observation = hand(Handedness::Right);
        observation.landmarks[7].y = f32::NAN;
        let err = HandFeatures::from_observation(&observation).unwrap_err();
        assert!(err.to_string().contains("landmark 7"));
    }
}
