use std::collections::VecDeque;
use std::fmt;

use crate::config::EngagementConfig;

/// Per-frame engagement verdict label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngagementStatus {
    Engaged,
    /// Disengaged with no face in frame.
    LookingAway,
    /// Disengaged with a face present (sustained closure).
    EyesClosed,
}

impl fmt::Display for EngagementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngagementStatus::Engaged => "Engaged",
            EngagementStatus::LookingAway => "Looking Away",
            EngagementStatus::EyesClosed => "Eyes Closed",
        };
        f.write_str(s)
    }
}

/// Temporal engagement state machine.
///
/// One instance per session, driven by a single-threaded per-frame loop:
/// `smooth` the raw EAR, `calibrate` until the threshold locks in, then
/// `detect` each frame and `update_threshold_dynamically` with the current
/// wall-clock second.
///
/// An EAR of exactly 0.0 is the "no face detected" sentinel throughout, not
/// a valid ratio.
pub struct EngagementDetector {
    config: EngagementConfig,
    fps: f64,
    ear_thresh: f64,
    /// Last `ear_smoothing_window` raw samples.
    ear_buffer: VecDeque<f64>,
    /// Last minute of smoothed samples, consumed by dynamic adjustment.
    ear_history: VecDeque<f64>,
    history_cap: usize,
    /// Consecutive low-EAR frames.
    counter: u32,
    /// Consecutive suspected-blink frames.
    blink_counter: u32,
    /// Consecutive no-face frames.
    lookdown_counter: u32,
    /// Disengaged frames over the whole session.
    total_disengaged: u64,
    calibration_ears: Vec<f64>,
    calibrated: bool,
    /// 1 = engaged, 0 = disengaged, one entry per post-calibration frame.
    timeline: Vec<u8>,
    /// Unix second of the last dynamic-adjustment attempt. None until the
    /// first call after calibration anchors the cadence.
    last_adjustment: Option<u64>,
}

impl EngagementDetector {
    pub fn new(config: EngagementConfig, fps: f64) -> Self {
        let history_cap = (fps * 60.0) as usize;
        Self {
            config,
            fps,
            ear_thresh: config.initial_ear_thresh,
            ear_buffer: VecDeque::with_capacity(config.ear_smoothing_window),
            ear_history: VecDeque::with_capacity(history_cap),
            history_cap,
            counter: 0,
            blink_counter: 0,
            lookdown_counter: 0,
            total_disengaged: 0,
            calibration_ears: Vec::new(),
            calibrated: false,
            timeline: Vec::new(),
            last_adjustment: None,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn ear_threshold(&self) -> f64 {
        self.ear_thresh
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Disengaged frame count so far. Always equals the number of zeros in
    /// the timeline.
    pub fn total_disengaged(&self) -> u64 {
        self.total_disengaged
    }

    /// Per-frame engagement record: 1 = engaged, 0 = disengaged.
    pub fn timeline(&self) -> &[u8] {
        &self.timeline
    }

    /// Fraction of the calibration accumulator filled, in [0, 1].
    pub fn calibration_progress(&self) -> f64 {
        let required = self.calibration_frames();
        if required == 0 {
            return 1.0;
        }
        (self.calibration_ears.len() as f64 / required as f64).min(1.0)
    }

    fn calibration_frames(&self) -> usize {
        (self.config.calibration_duration * self.fps) as usize
    }

    fn blink_frames(&self) -> u32 {
        (self.config.blink_duration * self.fps) as u32
    }

    fn disengaged_frames(&self) -> u32 {
        (self.config.disengaged_threshold * self.fps) as u32
    }

    /// Push a raw EAR sample into the smoothing window and return the mean
    /// of the window's current contents.
    pub fn smooth(&mut self, ear: f64) -> f64 {
        if self.ear_buffer.len() == self.config.ear_smoothing_window {
            self.ear_buffer.pop_front();
        }
        self.ear_buffer.push_back(ear);
        let sum: f64 = self.ear_buffer.iter().sum();
        sum / self.ear_buffer.len() as f64
    }

    /// Accumulate one calibration sample. Samples at or below 0.1 (no-face
    /// sentinel, degenerate geometry, near-closed eyes) are discarded.
    ///
    /// Returns true once the accumulator holds a full calibration window, at
    /// which point the threshold is set to 85% of the mean open-eye EAR,
    /// clamped to the configured bounds.
    pub fn calibrate(&mut self, ear: f64) -> bool {
        if ear > 0.1 {
            self.calibration_ears.push(ear);
        }

        if !self.calibration_ears.is_empty()
            && self.calibration_ears.len() >= self.calibration_frames()
        {
            let mean: f64 =
                self.calibration_ears.iter().sum::<f64>() / self.calibration_ears.len() as f64;
            self.ear_thresh =
                (mean * 0.85).clamp(self.config.min_ear_thresh, self.config.max_ear_thresh);
            self.calibrated = true;
            return true;
        }
        false
    }

    /// Blink heuristic: a sharp one-step drop, meaning the current smoothed
    /// EAR sits below 70% of the threshold while the previous raw buffered
    /// sample was above 90% of it. A blink's transient is fast; a sustained
    /// closure drifts down through the window instead.
    ///
    /// Returns false until the history buffer has a blink-duration's worth
    /// of samples, and with fewer than two samples in the smoothing window.
    pub fn is_blink(&self, ear: f64) -> bool {
        if self.ear_history.len() < self.blink_frames() as usize {
            return false;
        }
        if self.ear_buffer.len() < 2 {
            return false;
        }
        let prev = self.ear_buffer[self.ear_buffer.len() - 2];
        ear < self.ear_thresh * 0.7 && prev > self.ear_thresh * 0.9
    }

    /// Re-estimate the threshold from the last interval of history.
    ///
    /// Edge-triggered: fires when at least `dynamic_adjustment_interval`
    /// seconds have passed since the previous attempt (the first call
    /// anchors the cadence without firing). When firing, takes the most
    /// recent interval of smoothed samples, keeps those above 90% of the
    /// current threshold as open-eye evidence, and adopts 85% of their mean
    /// (clamped) only if it moves the threshold by more than 0.01.
    pub fn update_threshold_dynamically(&mut self, now: u64) {
        let Some(last) = self.last_adjustment else {
            self.last_adjustment = Some(now);
            return;
        };
        if now.saturating_sub(last) < self.config.dynamic_adjustment_interval {
            return;
        }
        self.last_adjustment = Some(now);

        let window = (self.fps * self.config.dynamic_adjustment_interval as f64) as usize;
        if self.ear_history.len() <= window {
            return;
        }

        let start = self.ear_history.len() - window;
        let open_floor = self.ear_thresh * 0.9;
        let recent: Vec<f64> = self
            .ear_history
            .iter()
            .skip(start)
            .copied()
            .filter(|&e| e > open_floor)
            .collect();

        if recent.is_empty() {
            return;
        }

        let mean: f64 = recent.iter().sum::<f64>() / recent.len() as f64;
        let candidate =
            (mean * 0.85).clamp(self.config.min_ear_thresh, self.config.max_ear_thresh);
        if (candidate - self.ear_thresh).abs() > 0.01 {
            self.ear_thresh = candidate;
        }
    }

    /// Classify one post-calibration frame.
    ///
    /// Three mutually exclusive paths: no face (lookdown counting), a
    /// suspected blink (suppressed until it outlasts a blink duration), or
    /// plain low/high EAR counting against the threshold. Counters are only
    /// reset on the branch that owns them; a no-face frame leaves the
    /// closure and blink counters untouched.
    pub fn detect(&mut self, ear: f64) -> (bool, EngagementStatus) {
        if self.ear_history.len() == self.history_cap && self.history_cap > 0 {
            self.ear_history.pop_front();
        }
        self.ear_history.push_back(ear);

        let disengaged = if ear == 0.0 {
            self.lookdown_counter += 1;
            self.lookdown_counter >= self.disengaged_frames()
        } else {
            self.lookdown_counter = 0;
            if self.is_blink(ear) {
                self.blink_counter += 1;
                self.blink_counter > self.blink_frames()
            } else {
                self.blink_counter = 0;
                if ear < self.ear_thresh {
                    self.counter += 1;
                } else {
                    self.counter = 0;
                }
                self.counter >= self.disengaged_frames()
            }
        };

        if disengaged {
            self.total_disengaged += 1;
        }
        self.timeline.push(if disengaged { 0 } else { 1 });

        let status = if !disengaged {
            EngagementStatus::Engaged
        } else if ear == 0.0 {
            EngagementStatus::LookingAway
        } else {
            EngagementStatus::EyesClosed
        };

        (disengaged, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const FPS: f64 = 10.0;

    fn detector() -> EngagementDetector {
        EngagementDetector::new(EngagementConfig::default(), FPS)
    }

    /// Feed a full calibration window of open-eye samples.
    fn calibrated_detector(open_ear: f64) -> EngagementDetector {
        let mut d = detector();
        while !d.calibrate(open_ear) {}
        d
    }

    /// Warm up the blink-history gate with open-eye frames.
    fn warmed(open_ear: f64) -> EngagementDetector {
        let mut d = calibrated_detector(open_ear);
        for _ in 0..10 {
            let s = d.smooth(open_ear);
            d.detect(s);
        }
        d
    }

    #[test]
    fn test_smooth_is_windowed_mean() {
        let mut d = detector();
        assert_relative_eq!(d.smooth(0.2), 0.2);
        assert_relative_eq!(d.smooth(0.4), 0.3);
        // Fill the window (size 5), then overflow: oldest drops out
        d.smooth(0.4);
        d.smooth(0.4);
        d.smooth(0.4);
        let m = d.smooth(0.4);
        assert_relative_eq!(m, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_calibration_requires_exact_sample_count() {
        let mut d = detector();
        let required = (7.0 * FPS) as usize;
        for i in 0..required - 1 {
            assert!(!d.calibrate(0.3), "not calibrated at sample {i}");
            // Interleave invalid samples; they must not count
            assert!(!d.calibrate(0.0));
            assert!(!d.calibrate(0.05));
        }
        assert!(d.calibrate(0.3));
        assert!(d.is_calibrated());
    }

    #[test]
    fn test_calibration_progress_tracks_valid_samples() {
        let mut d = detector();
        assert_relative_eq!(d.calibration_progress(), 0.0);
        for _ in 0..35 {
            d.calibrate(0.3);
            d.calibrate(0.0); // invalid samples contribute nothing
        }
        // 35 of the 70 required samples
        assert_relative_eq!(d.calibration_progress(), 0.5);
        while !d.calibrate(0.3) {}
        assert_relative_eq!(d.calibration_progress(), 1.0);
    }

    #[test]
    fn test_calibration_threshold_is_clamped() {
        // Mean 0.45 * 0.85 = 0.3825 > max 0.35
        let d = calibrated_detector(0.45);
        assert_relative_eq!(d.ear_threshold(), 0.35);

        // Mean 0.12 * 0.85 = 0.102 < min 0.15
        let d = calibrated_detector(0.12);
        assert_relative_eq!(d.ear_threshold(), 0.15);
    }

    #[test]
    fn test_calibration_threshold_85_percent_of_mean() {
        let d = calibrated_detector(0.3);
        assert_relative_eq!(d.ear_threshold(), 0.255, epsilon = 1e-12);
    }

    #[test]
    fn test_uncalibrated_threshold_never_trips() {
        // Before calibration the threshold is 1.0; any plausible EAR is
        // "below threshold", which is why detect is only called after
        // calibration. Verify the initial value survives construction.
        let d = detector();
        assert_relative_eq!(d.ear_threshold(), 1.0);
        assert!(!d.is_calibrated());
    }

    #[test]
    fn test_looking_away_after_threshold_frames() {
        let mut d = calibrated_detector(0.3);
        // DISENGAGED_THRESHOLD 1.5s * 10 fps = 15 frames
        for i in 0..14 {
            let (disengaged, status) = d.detect(0.0);
            assert!(!disengaged, "frame {i} should still be engaged");
            assert_eq!(status, EngagementStatus::Engaged);
        }
        let (disengaged, status) = d.detect(0.0);
        assert!(disengaged, "15th consecutive no-face frame");
        assert_eq!(status, EngagementStatus::LookingAway);
    }

    #[test]
    fn test_eyes_closed_after_sustained_low_ear() {
        let mut d = calibrated_detector(0.3);
        let low = d.ear_threshold() * 0.9; // below threshold, face present
        for _ in 0..14 {
            let (disengaged, _) = d.detect(low);
            assert!(!disengaged);
        }
        let (disengaged, status) = d.detect(low);
        assert!(disengaged);
        assert_eq!(status, EngagementStatus::EyesClosed);
    }

    #[test]
    fn test_counter_resets_on_recovery() {
        let mut d = calibrated_detector(0.3);
        let low = d.ear_threshold() * 0.9;
        for _ in 0..14 {
            d.detect(low);
        }
        // One open frame resets the closure counter
        let (disengaged, _) = d.detect(0.3);
        assert!(!disengaged);
        let (disengaged, _) = d.detect(low);
        assert!(!disengaged, "counter restarted from zero");
    }

    #[test]
    fn test_short_blink_suppressed() {
        let open = 0.3;
        let mut d = warmed(open);
        let t = d.ear_threshold();
        let dip = t * 0.6; // below 0.7*T

        // Raw buffer tail is `open` > 0.9*T, so the first dip frame is a blink
        assert!(d.is_blink(dip));
        // Blink lasting 2 frames (< 0.3s * 10fps = 3) never disengages
        for _ in 0..2 {
            let s = d.smooth(dip);
            // Pass the raw dip, not the smoothed value, to keep the
            // one-step-drop shape the heuristic looks for
            let (disengaged, _) = d.detect(if s < t * 0.7 { s } else { dip });
            assert!(!disengaged);
        }
        // Recovery
        let s = d.smooth(open);
        let (disengaged, _) = d.detect(s);
        assert!(!disengaged);
    }

    #[test]
    fn test_blink_requires_warm_history() {
        let mut d = calibrated_detector(0.3);
        let t = d.ear_threshold();
        d.smooth(0.3);
        d.smooth(t * 0.6);
        // No detect() calls yet, so history is empty
        assert!(!d.is_blink(t * 0.6));
    }

    #[test]
    fn test_blink_requires_two_buffered_samples() {
        let mut d = calibrated_detector(0.3);
        for _ in 0..10 {
            d.detect(0.3); // warm history without touching the raw buffer
        }
        let t = d.ear_threshold();
        d.smooth(t * 0.6); // single buffered sample
        assert!(!d.is_blink(t * 0.6));
    }

    #[test]
    fn test_no_face_leaves_sibling_counters_stale() {
        let mut d = calibrated_detector(0.3);
        let low = d.ear_threshold() * 0.9;
        for _ in 0..10 {
            d.detect(low);
        }
        // A no-face frame does not reset the closure counter...
        d.detect(0.0);
        // ...so five more low frames complete the original 15
        for _ in 0..4 {
            let (disengaged, _) = d.detect(low);
            assert!(!disengaged);
        }
        let (disengaged, _) = d.detect(low);
        assert!(disengaged, "closure counter survived the no-face frame");
    }

    #[test]
    fn test_total_disengaged_matches_timeline_zeros() {
        let mut d = calibrated_detector(0.3);
        let low = d.ear_threshold() * 0.9;
        for i in 0..200 {
            let ear = match i % 40 {
                0..=19 => 0.3,
                20..=34 => low,
                _ => 0.0,
            };
            d.detect(ear);
        }
        let zeros = d.timeline().iter().filter(|&&x| x == 0).count() as u64;
        assert_eq!(d.total_disengaged(), zeros);
        assert_eq!(d.timeline().len(), 200);
    }

    #[test]
    fn test_dynamic_adjustment_first_call_anchors_only() {
        let mut d = calibrated_detector(0.3);
        let before = d.ear_threshold();
        for _ in 0..400 {
            d.detect(0.34);
        }
        d.update_threshold_dynamically(1000);
        assert_relative_eq!(d.ear_threshold(), before);
    }

    #[test]
    fn test_dynamic_adjustment_fires_after_interval() {
        let mut d = calibrated_detector(0.24);
        // thresh = 0.24 * 0.85 = 0.204. Feed brighter-eyed samples.
        for _ in 0..400 {
            d.detect(0.32);
        }
        d.update_threshold_dynamically(1000);
        d.update_threshold_dynamically(1029); // 29s: not yet
        assert_relative_eq!(d.ear_threshold(), 0.204, epsilon = 1e-12);
        d.update_threshold_dynamically(1030);
        // mean 0.32 * 0.85 = 0.272, within clamp, change > 0.01
        assert_relative_eq!(d.ear_threshold(), 0.272, epsilon = 1e-12);
    }

    #[test]
    fn test_dynamic_adjustment_needs_full_window() {
        let mut d = calibrated_detector(0.24);
        // Only 100 samples < 10fps * 30s
        for _ in 0..100 {
            d.detect(0.32);
        }
        d.update_threshold_dynamically(1000);
        d.update_threshold_dynamically(1030);
        assert_relative_eq!(d.ear_threshold(), 0.204, epsilon = 1e-12);
    }

    #[test]
    fn test_dynamic_adjustment_ignores_small_changes() {
        let mut d = calibrated_detector(0.3);
        let t = d.ear_threshold(); // 0.255
        // Samples whose filtered mean lands within 0.01 of the threshold:
        // 0.30588 * 0.85 ≈ 0.260
        for _ in 0..400 {
            d.detect(0.30588);
        }
        d.update_threshold_dynamically(1000);
        d.update_threshold_dynamically(1030);
        assert_relative_eq!(d.ear_threshold(), t, epsilon = 1e-12);
    }

    #[test]
    fn test_dynamic_adjustment_skips_closed_samples() {
        let mut d = calibrated_detector(0.24);
        let t = d.ear_threshold();
        // Everything at or below 0.9*T is excluded; with nothing open the
        // threshold must not move
        for _ in 0..400 {
            d.detect(t * 0.5);
        }
        d.update_threshold_dynamically(1000);
        d.update_threshold_dynamically(1030);
        assert_relative_eq!(d.ear_threshold(), t, epsilon = 1e-12);
    }

    #[test]
    fn test_dynamic_adjustment_stays_clamped() {
        let mut d = calibrated_detector(0.3);
        for _ in 0..400 {
            d.detect(0.48);
        }
        d.update_threshold_dynamically(1000);
        d.update_threshold_dynamically(1030);
        assert_relative_eq!(d.ear_threshold(), 0.35, epsilon = 1e-12);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(EngagementStatus::Engaged.to_string(), "Engaged");
        assert_eq!(EngagementStatus::LookingAway.to_string(), "Looking Away");
        assert_eq!(EngagementStatus::EyesClosed.to_string(), "Eyes Closed");
    }

    proptest! {
        /// Smoothed output always lies within [min, max] of the last
        /// window's worth of inputs.
        #[test]
        fn prop_smooth_bounded_by_window(ears in prop::collection::vec(0.0f64..0.5, 1..100)) {
            let mut d = detector();
            let w = EngagementConfig::default().ear_smoothing_window;
            for (i, &e) in ears.iter().enumerate() {
                let smoothed = d.smooth(e);
                let window = &ears[i.saturating_sub(w - 1)..=i];
                let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(smoothed >= lo - 1e-9 && smoothed <= hi + 1e-9);
            }
        }

        /// For any input sequence, disengaged frame count equals the zeros
        /// in the timeline.
        #[test]
        fn prop_total_disengaged_counts_timeline_zeros(
            ears in prop::collection::vec(prop_oneof![Just(0.0f64), 0.05f64..0.45], 0..300)
        ) {
            let mut d = calibrated_detector(0.3);
            for &e in &ears {
                d.detect(e);
            }
            let zeros = d.timeline().iter().filter(|&&x| x == 0).count() as u64;
            prop_assert_eq!(d.total_disengaged(), zeros);
        }
    }
}
