//! The per-frame monitoring loop: smoothing, calibration gate, detection,
//! dynamic threshold adjustment, and alert dispatch.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use ses_core::{
    AlertPolicy, EngagementConfig, EngagementDetector, SessionInfo, SessionSummary,
};

use crate::source::FrameSource;
use crate::speech::SpeechService;

pub struct SessionOutcome {
    pub summary: SessionSummary,
    pub ear_threshold: f64,
    pub alerts_fired: usize,
}

/// Drive the detector over the frame source until the planned duration
/// elapses (counted from calibration completion, like the on-screen timer)
/// or the source runs out of frames.
///
/// The clock derives from the frame index, so recorded and synthetic
/// sources replay at full speed with the same second-resolution timing a
/// live camera would produce.
pub fn run_session(
    config: &EngagementConfig,
    fps: f64,
    info: &SessionInfo,
    source: &mut dyn FrameSource,
    speech: Option<&SpeechService>,
) -> Result<SessionOutcome> {
    let mut detector = EngagementDetector::new(*config, fps);
    let mut policy = AlertPolicy::new(config.alert_cooldown);
    let session_secs = info.duration_minutes * 60;
    let epoch = now_unix_secs();

    let mut frame_idx: u64 = 0;
    let mut start: Option<u64> = None;
    let mut alerts_fired = 0;

    while let Some(frame) = source.next_frame()? {
        let now = epoch + (frame_idx as f64 / fps) as u64;
        frame_idx += 1;

        let raw = frame.raw_ear();
        let ear = if raw > 0.0 { detector.smooth(raw) } else { 0.0 };

        if !detector.is_calibrated() {
            if detector.calibrate(ear) {
                start = Some(now);
                tracing::info!(threshold = detector.ear_threshold(), "calibration complete");
                println!(
                    "Calibration complete. Threshold: {:.3}",
                    detector.ear_threshold()
                );
            } else if frame_idx % fps.max(1.0) as u64 == 0 {
                // Once a second, like the on-screen progress bar
                println!(
                    "Calibrating... {:.0}%",
                    detector.calibration_progress() * 100.0
                );
            }
            continue;
        }

        let (disengaged, status) = detector.detect(ear);
        detector.update_threshold_dynamically(now);
        tracing::debug!(frame = frame_idx, ear, disengaged, %status, "frame");

        if let Some(alert) = policy.observe(disengaged, now) {
            alerts_fired += 1;
            tracing::info!("alert: {alert}");
            if let Some(speech) = speech {
                speech.speak(alert.message());
            }
        }

        if let Some(start) = start
            && now - start >= session_secs
        {
            break;
        }
    }

    let summary = SessionSummary::from_timeline(
        info,
        detector.timeline(),
        session_secs as f64,
        detector.fps(),
    );
    Ok(SessionOutcome {
        summary,
        ear_threshold: detector.ear_threshold(),
        alerts_fired,
    })
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
