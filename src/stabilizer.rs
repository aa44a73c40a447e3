//! Temporal debouncer between per-frame classifications and fired events.
//!
//! A gesture fires once its label has filled the last `confirm_frames`
//! accepted observations, and then only if it differs from the last fired
//! label or the cooldown has elapsed since that firing. A frame with no hand
//! wipes the streak but not the firing record.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::event::{GestureEvent, GestureObservation};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.7;
pub const DEFAULT_CONFIRM_FRAMES: usize = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// What a below-threshold observation does to the streak.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LowConfidencePolicy {
    /// Ignore the observation; the streak survives.
    #[default]
    Hold,
    /// Treat it like an empty frame; the streak is cleared.
    Reset,
}

impl std::str::FromStr for LowConfidencePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "hold" => Ok(LowConfidencePolicy::Hold),
            "reset" => Ok(LowConfidencePolicy::Reset),
            other => Err(anyhow!(
                "unknown low-confidence policy '{}' (expected hold or reset)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StabilizerConfig {
    /// Observations below this confidence are not accepted.
    pub min_confidence: f32,
    /// Consecutive identical accepted labels needed to confirm (K, at least 1).
    pub confirm_frames: usize,
    /// Minimum spacing between two firings of the same label.
    pub cooldown: Duration,
    pub low_confidence: LowConfidencePolicy,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            confirm_frames: DEFAULT_CONFIRM_FRAMES,
            cooldown: DEFAULT_COOLDOWN,
            low_confidence: LowConfidencePolicy::Hold,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.confirm_frames == 0 {
            return Err(anyhow!("confirm_frames must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(anyhow!("min_confidence must be within 0..=1"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
struct LastFired {
    label: String,
    at: Instant,
}

pub struct GestureStabilizer {
    config: StabilizerConfig,
    history: VecDeque<String>,
    last_fired: Option<LastFired>,
}

impl GestureStabilizer {
    pub fn new(config: StabilizerConfig) -> Result<Self> {
        config.validate()?;
        let history = VecDeque::with_capacity(config.confirm_frames);
        Ok(Self {
            config,
            history,
            last_fired: None,
        })
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Current streak, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn last_fired(&self) -> Option<(&str, Instant)> {
        self.last_fired
            .as_ref()
            .map(|fired| (fired.label.as_str(), fired.at))
    }

    /// Feed one processed frame's observations. Only the first is considered.
    pub fn observe(
        &mut self,
        observations: &[GestureObservation],
        now: Instant,
    ) -> Option<GestureEvent> {
        let Some(observation) = observations.first() else {
            self.history.clear();
            return None;
        };

        // NaN confidence is never accepted.
        let accepted = observation.confidence >= self.config.min_confidence;
        if !accepted {
            if self.config.low_confidence == LowConfidencePolicy::Reset {
                self.history.clear();
            }
            return None;
        }

        let label = observation.label.as_str();
        self.history.push_back(label.to_string());
        while self.history.len() > self.config.confirm_frames {
            self.history.pop_front();
        }

        let confirmed = self.history.len() >= self.config.confirm_frames
            && self.history.iter().all(|seen| seen == label);
        if !confirmed {
            return None;
        }

        let may_fire = match &self.last_fired {
            None => true,
            Some(fired) => {
                fired.label != label
                    || now.saturating_duration_since(fired.at) >= self.config.cooldown
            }
        };
        if !may_fire {
            return None;
        }

        self.last_fired = Some(LastFired {
            label: label.to_string(),
            at: now,
        });
        Some(GestureEvent::gesture(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stabilizer(confirm_frames: usize, cooldown_ms: u64) -> GestureStabilizer {
        GestureStabilizer::new(StabilizerConfig {
            confirm_frames,
            cooldown: Duration::from_millis(cooldown_ms),
            ..StabilizerConfig::default()
        })
        .unwrap()
    }

    fn obs(label: &str, confidence: f32, at: Instant) -> Vec<GestureObservation> {
        vec![GestureObservation::new(label, confidence, at)]
    }

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn low_confidence_never_fires_and_keeps_history() {
        let start = Instant::now();
        let mut s = stabilizer(3, 2000);
        assert!(s.observe(&obs("fist", 0.9, start), start).is_none());
        assert!(s.observe(&obs("fist", 0.9, at(start, 100)), at(start, 100)).is_none());
        assert!(s.observe(&obs("fist", 0.69, at(start, 200)), at(start, 200)).is_none());
        assert!(s.observe(&obs("five", 0.1, at(start, 300)), at(start, 300)).is_none());
        assert_eq!(s.history().collect::<Vec<_>>(), vec!["fist", "fist"]);

        let event = s.observe(&obs("fist", 0.9, at(start, 400)), at(start, 400));
        assert_eq!(event, Some(GestureEvent::gesture("fist")));
    }

    #[test]
    fn reset_policy_clears_on_low_confidence() {
        let start = Instant::now();
        let mut s = GestureStabilizer::new(StabilizerConfig {
            low_confidence: LowConfidencePolicy::Reset,
            ..StabilizerConfig::default()
        })
        .unwrap();
        s.observe(&obs("fist", 0.9, start), start);
        s.observe(&obs("fist", 0.9, start), start);
        s.observe(&obs("fist", 0.2, start), start);
        assert_eq!(s.history().count(), 0);
        assert!(s.observe(&obs("fist", 0.9, start), start).is_none());
    }

    #[test]
    fn kth_identical_observation_fires_exactly_once() {
        let start = Instant::now();
        let mut s = stabilizer(3, 2000);
        let fired: Vec<_> = (0..3)
            .filter_map(|i| s.observe(&obs("ok", 0.95, at(start, i * 10)), at(start, i * 10)))
            .collect();
        assert_eq!(fired, vec![GestureEvent::gesture("ok")]);
        assert_eq!(s.last_fired().map(|(label, _)| label), Some("ok"));
    }

    #[test]
    fn same_label_blocked_inside_cooldown_allowed_at_boundary() {
        let start = Instant::now();
        let mut s = stabilizer(1, 2000);
        assert!(s.observe(&obs("gun", 0.9, start), start).is_some());
        assert!(s.observe(&obs("gun", 0.9, at(start, 1999)), at(start, 1999)).is_none());
        assert!(s.observe(&obs("gun", 0.9, at(start, 2000)), at(start, 2000)).is_some());
    }

    #[test]
    fn label_change_ignores_cooldown() {
        let start = Instant::now();
        let mut s = stabilizer(1, 2000);
        assert!(s.observe(&obs("one", 0.9, start), start).is_some());
        let event = s.observe(&obs("six", 0.9, at(start, 10)), at(start, 10));
        assert_eq!(event, Some(GestureEvent::gesture("six")));
    }

    #[test]
    fn empty_frame_clears_streak_but_not_last_fired() {
        let start = Instant::now();
        let mut s = stabilizer(2, 2000);
        s.observe(&obs("four", 0.9, start), start);
        assert!(s.observe(&[], at(start, 100)).is_none());
        assert_eq!(s.history().count(), 0);

        assert!(s.observe(&obs("four", 0.9, at(start, 200)), at(start, 200)).is_none());
        let event = s.observe(&obs("four", 0.9, at(start, 300)), at(start, 300));
        assert_eq!(event, Some(GestureEvent::gesture("four")));

        s.observe(&[], at(start, 400));
        assert_eq!(s.last_fired().map(|(label, _)| label), Some("four"));
    }

    #[test]
    fn mixed_window_does_not_confirm() {
        let start = Instant::now();
        let mut s = stabilizer(3, 0);
        for label in ["fist", "fist", "five", "fist"] {
            assert!(s.observe(&obs(label, 0.9, start), start).is_none());
        }
    }

    #[test]
    fn only_first_observation_counts() {
        let start = Instant::now();
        let mut s = stabilizer(1, 2000);
        let both = vec![
            GestureObservation::new("nine", 0.9, start),
            GestureObservation::new("pink", 0.99, start),
        ];
        assert_eq!(s.observe(&both, start), Some(GestureEvent::gesture("nine")));
    }

    #[test]
    fn fist_then_five_fires_both_with_k3() {
        let start = Instant::now();
        let mut s = stabilizer(3, 2000);
        let labels = ["fist", "fist", "fist", "five", "five", "five"];
        let fired: Vec<String> = labels
            .iter()
            .enumerate()
            .filter_map(|(i, label)| {
                let now = at(start, i as u64 * 500);
                s.observe(&obs(label, 0.9, now), now)
            })
            .map(|event| event.data)
            .collect();
        assert_eq!(fired, vec!["fist", "five"]);
    }

    #[test]
    fn steady_ok_fires_every_twenty_frames_at_ten_hz() {
        let start = Instant::now();
        let mut s = stabilizer(1, 2000);
        let fired_frames: Vec<u64> = (0..60u64)
            .filter(|i| {
                let now = at(start, i * 100);
                s.observe(&obs("ok", 0.9, now), now).is_some()
            })
            .collect();
        assert_eq!(fired_frames, vec![0, 20, 40]);
    }

    #[test]
    fn zero_confirm_frames_rejected() {
        let err = GestureStabilizer::new(StabilizerConfig {
            confirm_frames: 0,
            ..StabilizerConfig::default()
        })
        .err();
        assert!(err.is_some());
    }

    #[test]
    fn policy_parses_from_config_text() -> Result<()> {
        assert_eq!("reset".parse::<LowConfidencePolicy>()?, LowConfidencePolicy::Reset);
        assert!("drop".parse::<LowConfidencePolicy>().is_err());
        Ok(())
    }
}
