use serde::Deserialize;

/// Detection parameters, immutable for the lifetime of a session.
///
/// Deserializes with per-field defaults so a partial TOML file only has to
/// name the values it overrides.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngagementConfig {
    /// Starting EAR threshold. Real EAR values never reach 1.0, so until
    /// calibration replaces it the detector effectively never sees a
    /// "closed" frame.
    pub initial_ear_thresh: f64,
    /// Lower clamp for the calibrated/adjusted threshold.
    pub min_ear_thresh: f64,
    /// Upper clamp for the calibrated/adjusted threshold.
    pub max_ear_thresh: f64,
    /// Seconds of valid open-eye samples collected before the threshold
    /// is locked in.
    pub calibration_duration: f64,
    /// Maximum duration of a normal blink, in seconds.
    pub blink_duration: f64,
    /// Number of raw EAR samples averaged into the smoothed value.
    pub ear_smoothing_window: usize,
    /// Minimum seconds between spoken alerts.
    pub alert_cooldown: u64,
    /// Seconds of sustained closure or absence before disengagement.
    pub disengaged_threshold: f64,
    /// Seconds between threshold re-estimation attempts.
    pub dynamic_adjustment_interval: u64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            initial_ear_thresh: 1.0,
            min_ear_thresh: 0.15,
            max_ear_thresh: 0.35,
            calibration_duration: 7.0,
            blink_duration: 0.3,
            ear_smoothing_window: 5,
            alert_cooldown: 5,
            disengaged_threshold: 1.5,
            dynamic_adjustment_interval: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngagementConfig::default();
        assert_eq!(config.initial_ear_thresh, 1.0);
        assert_eq!(config.min_ear_thresh, 0.15);
        assert_eq!(config.max_ear_thresh, 0.35);
        assert_eq!(config.ear_smoothing_window, 5);
        assert_eq!(config.alert_cooldown, 5);
        assert!(config.min_ear_thresh < config.max_ear_thresh);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngagementConfig =
            serde_json::from_str(r#"{"disengaged_threshold": 2.0, "alert_cooldown": 10}"#)
                .unwrap();
        assert_eq!(config.disengaged_threshold, 2.0);
        assert_eq!(config.alert_cooldown, 10);
        // Unnamed fields keep their defaults
        assert_eq!(config.ear_smoothing_window, 5);
    }

    #[test]
    fn test_deserialize_rejects_unknown_field() {
        let result =
            serde_json::from_str::<EngagementConfig>(r#"{"ear_treshold": 0.2}"#);
        assert!(result.is_err(), "typoed field should be rejected");
    }
}
