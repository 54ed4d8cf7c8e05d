//! One-shot vertical auto-scaling
//!
//! Shortly after a session starts the vertical window is fitted to the
//! observed signal once, then left alone for the rest of the session.

use std::time::{Duration, Instant};

/// Default amplitude floor below which a fitted window is ignored
pub const DEFAULT_MINIMUM_DETECTED_PCM: f32 = -5_000_000.0;

/// Time between the first frame with data and the fit
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_millis(100);

/// Auto-scaling state for one session
#[derive(Clone, Debug)]
pub struct AutoScaler {
    locked: bool,
    observed_max: i32,
    observed_min: i32,
    first_frame: Option<Instant>,
    minimum_detected: f32,
    settle: Duration,
}

impl Default for AutoScaler {
    fn default() -> Self {
        Self::new(DEFAULT_MINIMUM_DETECTED_PCM, DEFAULT_SETTLE_TIME)
    }
}

impl AutoScaler {
    pub fn new(minimum_detected: f32, settle: Duration) -> Self {
        Self {
            locked: false,
            observed_max: 0,
            observed_min: 0,
            first_frame: None,
            minimum_detected,
            settle,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn observed(&self) -> (i32, i32) {
        (self.observed_max, self.observed_min)
    }

    /// Look at one frame's samples
    ///
    /// The first non-empty frame starts the settle timer. Once it has run
    /// out, the frame is scanned for its extremes. A frame whose maximum or
    /// minimum is exactly zero is skipped and the next one tried.
    ///
    /// # Returns
    /// The vertical window size to request, if the fit produced one. The
    /// scaler locks on any completed scan, whether or not it returns a size.
    pub fn observe(&mut self, samples: &[i16], now: Instant) -> Option<i32> {
        if self.locked || samples.is_empty() {
            return None;
        }

        let first = match self.first_frame {
            Some(first) => first,
            None => {
                self.first_frame = Some(now);
                return None;
            }
        };
        if now.saturating_duration_since(first) < self.settle {
            return None;
        }

        let (max, min) = samples.iter().fold((0i32, 0i32), |(max, min), &s| {
            (max.max(s as i32), min.min(s as i32))
        });
        self.observed_max = max;
        self.observed_min = min;

        // TODO: a signal that stays on one side of zero never locks; decide
        // whether it should fit to the one extreme it has.
        if max == 0 || min == 0 {
            log::trace!("Auto-scale skipped, one-sided frame ({}, {})", max, min);
            return None;
        }

        let new_range = 2 * max.abs().max(min.abs());
        self.locked = true;

        if (-new_range as f32) > self.minimum_detected {
            log::debug!("Scaling window to {} < y < {}", -new_range, new_range);
            Some(new_range * 2)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_starts_timer() {
        let mut scaler = AutoScaler::default();
        let t0 = Instant::now();
        assert_eq!(scaler.observe(&[3000, -1000], t0), None);
        assert!(!scaler.is_locked());

        // still settling
        assert_eq!(scaler.observe(&[3000, -1000], t0 + Duration::from_millis(50)), None);
        assert!(!scaler.is_locked());
    }

    #[test]
    fn test_fits_after_settle_time() {
        let mut scaler = AutoScaler::default();
        let t0 = Instant::now();
        scaler.observe(&[0, 0], t0);

        let samples = [100, 3000, -1000, 20];
        let size = scaler.observe(&samples, t0 + Duration::from_millis(150));
        assert_eq!(size, Some(12_000));
        assert!(scaler.is_locked());
        assert_eq!(scaler.observed(), (3000, -1000));
    }

    #[test]
    fn test_empty_frames_do_not_start_timer() {
        let mut scaler = AutoScaler::default();
        let t0 = Instant::now();
        scaler.observe(&[], t0);
        assert_eq!(scaler.observe(&[10, -10], t0 + Duration::from_secs(1)), None);
        assert!(!scaler.is_locked());
    }

    #[test]
    fn test_one_sided_frames_are_retried() {
        let mut scaler = AutoScaler::default();
        let t0 = Instant::now();
        scaler.observe(&[1], t0);

        let later = t0 + Duration::from_millis(200);
        assert_eq!(scaler.observe(&[0, 0, 0], later), None);
        assert_eq!(scaler.observe(&[5, 900], later), None);
        assert!(!scaler.is_locked());

        assert_eq!(scaler.observe(&[-500, 900], later), Some(3600));
        assert!(scaler.is_locked());
    }

    #[test]
    fn test_locks_once() {
        let mut scaler = AutoScaler::default();
        let t0 = Instant::now();
        scaler.observe(&[1], t0);
        let later = t0 + Duration::from_millis(200);
        assert!(scaler.observe(&[-500, 900], later).is_some());

        assert_eq!(scaler.observe(&[-30_000, 30_000], later), None);
        assert_eq!(scaler.observed(), (900, -500));
    }

    #[test]
    fn test_floor_blocks_fit_but_still_locks() {
        let mut scaler = AutoScaler::new(-1000.0, DEFAULT_SETTLE_TIME);
        let t0 = Instant::now();
        scaler.observe(&[1], t0);

        let size = scaler.observe(&[3000, -1000], t0 + Duration::from_millis(150));
        assert_eq!(size, None);
        assert!(scaler.is_locked());
    }
}
