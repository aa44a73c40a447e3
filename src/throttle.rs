use std::time::{Duration, Instant};

pub const DEFAULT_PROCESS_INTERVAL: Duration = Duration::from_millis(500);

/// Rate gate in front of classification.
///
/// Admits at most one frame per `interval`. The clock starts at construction,
/// so the first admitted frame is the first one at least one interval after
/// startup. A zero interval admits every frame.
#[derive(Clone, Debug)]
pub struct Throttle {
    interval: Duration,
    last_processed_at: Instant,
}

impl Throttle {
    pub fn new(interval: Duration, anchor: Instant) -> Self {
        Self {
            interval,
            last_processed_at: anchor,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when `now` is at least one interval past the last admitted frame.
    /// Admitting moves the mark to `now`.
    pub fn should_process(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_processed_at) < self.interval {
            return false;
        }
        self.last_processed_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_once_per_interval() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(500), start);
        let admitted: Vec<u64> = (0..=20u64)
            .map(|i| i * 100)
            .filter(|ms| throttle.should_process(start + Duration::from_millis(*ms)))
            .collect();
        assert_eq!(admitted, vec![500, 1000, 1500, 2000]);
    }

    #[test]
    fn first_frame_waits_one_interval_from_anchor() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(500), start);
        assert!(!throttle.should_process(start));
        assert!(!throttle.should_process(start + Duration::from_millis(499)));
        assert!(throttle.should_process(start + Duration::from_millis(500)));
    }

    #[test]
    fn interval_is_measured_from_admitted_frame() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(500), start);
        assert!(throttle.should_process(start + Duration::from_millis(700)));
        assert!(!throttle.should_process(start + Duration::from_millis(1100)));
        assert!(throttle.should_process(start + Duration::from_millis(1200)));
    }

    #[test]
    fn zero_interval_admits_everything() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::ZERO, start);
        assert!(throttle.should_process(start));
        assert!(throttle.should_process(start));
    }
}
