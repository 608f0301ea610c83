//! Engagement detection engine.
//!
//! Tracks a person's visual engagement from per-frame eye-aspect-ratio (EAR)
//! samples: smoothing over noisy frames, one-time threshold calibration,
//! blink-vs-sustained-closure discrimination, periodic threshold
//! re-estimation, and cooldown-gated alerting.
//!
//! Pure state machine with no opinions about cameras, transport, or
//! persistence. The caller feeds it one EAR sample per frame (0.0 means
//! no face was detected) together with a monotonic seconds clock.

pub mod alert;
pub mod config;
pub mod detector;
pub mod ear;
pub mod summary;

pub use alert::{Alert, AlertPolicy};
pub use config::EngagementConfig;
pub use detector::{EngagementDetector, EngagementStatus};
pub use ear::{Point, average_ear, eye_aspect_ratio};
pub use summary::{SessionInfo, SessionSummary};
