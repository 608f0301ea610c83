use serde::{Deserialize, Serialize};

/// Who and what a monitoring session is for. Collected up front, carried
/// verbatim into the uploaded summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub matric_id: String,
    pub course: String,
    pub group: String,
    pub module: String,
    /// Planned session length in minutes.
    pub duration_minutes: u64,
}

/// Wire format posted to the collector, and the row shape of the local
/// CSV backup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub name: String,
    pub matric_id: String,
    pub course: String,
    pub module: String,
    pub group: String,
    pub engaged_percentage: f64,
    pub total_frames: usize,
    pub disengaged_seconds: f64,
    /// Session length in seconds.
    pub time: f64,
    pub fps: f64,
}

impl SessionSummary {
    /// Fold a per-frame engagement timeline (1 = engaged, 0 = disengaged)
    /// into the uploadable summary. An empty timeline yields zero
    /// percentages rather than NaN.
    pub fn from_timeline(
        info: &SessionInfo,
        timeline: &[u8],
        total_time: f64,
        fps: f64,
    ) -> Self {
        let total_frames = timeline.len();
        let engaged: usize = timeline.iter().filter(|&&x| x == 1).count();
        let disengaged = total_frames - engaged;

        let engaged_percentage = if total_frames > 0 {
            engaged as f64 / total_frames as f64 * 100.0
        } else {
            0.0
        };
        let disengaged_seconds = if total_frames > 0 && fps > 0.0 {
            disengaged as f64 / fps
        } else {
            0.0
        };

        Self {
            name: info.name.clone(),
            matric_id: info.matric_id.clone(),
            course: info.course.clone(),
            module: info.module.clone(),
            group: info.group.clone(),
            engaged_percentage,
            total_frames,
            disengaged_seconds,
            time: total_time,
            fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn info() -> SessionInfo {
        SessionInfo {
            name: "Aisha".into(),
            matric_id: "A123456".into(),
            course: "CS101".into(),
            group: "Group 1".into(),
            module: "Lecture 3".into(),
            duration_minutes: 10,
        }
    }

    #[test]
    fn test_from_timeline() {
        let timeline = [1, 1, 1, 0, 0, 1, 0, 1, 1, 1];
        let s = SessionSummary::from_timeline(&info(), &timeline, 60.0, 10.0);
        assert_eq!(s.total_frames, 10);
        assert_relative_eq!(s.engaged_percentage, 70.0);
        assert_relative_eq!(s.disengaged_seconds, 0.3);
        assert_relative_eq!(s.time, 60.0);
        assert_eq!(s.matric_id, "A123456");
    }

    #[test]
    fn test_empty_timeline_is_all_zero() {
        let s = SessionSummary::from_timeline(&info(), &[], 60.0, 10.0);
        assert_eq!(s.total_frames, 0);
        assert_eq!(s.engaged_percentage, 0.0);
        assert_eq!(s.disengaged_seconds, 0.0);
    }

    #[test]
    fn test_wire_roundtrip() {
        let s = SessionSummary::from_timeline(&info(), &[1, 0], 12.0, 2.0);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"engaged_percentage\":50.0"));
        let back: SessionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_frames, 2);
        assert_eq!(back.group, "Group 1");
    }
}
