//! Frame sources standing in for the camera + face-landmark collaborator.
//!
//! The detector only ever sees a raw per-frame EAR; a source either carries
//! the 6-point eye landmark sets to derive it from, a precomputed value, or
//! nothing at all (no face this frame).

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::{Context, Result};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use ses_core::{Point, average_ear};

/// One frame of input. Landmarks win over a precomputed `ear`; a frame with
/// neither is a no-face frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_eye: Option<[Point; 6]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_eye: Option<[Point; 6]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ear: Option<f64>,
}

impl Frame {
    /// Raw EAR for this frame; 0.0 is the no-face sentinel.
    pub fn raw_ear(&self) -> f64 {
        if let (Some(left), Some(right)) = (&self.left_eye, &self.right_eye) {
            average_ear(left, right)
        } else {
            self.ear.unwrap_or(0.0)
        }
    }
}

pub trait FrameSource {
    /// Next frame, or None when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Reads one JSON frame per line from a recorded landmark file.
pub struct JsonlSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonlSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl FrameSource for JsonlSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.context("failed to read frame line")?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = serde_json::from_str(&line)
                .with_context(|| format!("bad frame on line {}", self.line_no))?;
            return Ok(Some(frame));
        }
        Ok(None)
    }
}

/// Endless synthetic EAR stream for demos and tests: an open-eye baseline
/// with jitter, a short blink every few seconds, and an occasional
/// multi-second closure.
pub struct SyntheticSource {
    rng: SmallRng,
    fps: f64,
    frame: u64,
}

const OPEN_BASELINE: f64 = 0.3;
const BLINK_EAR: f64 = 0.08;
const CLOSURE_EAR: f64 = 0.12;
/// Seconds between scripted blinks.
const BLINK_PERIOD: f64 = 8.0;
/// Seconds between scripted long closures, and their length.
const CLOSURE_PERIOD: f64 = 90.0;
const CLOSURE_SECS: f64 = 3.0;

impl SyntheticSource {
    pub fn new(fps: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self { rng, fps, frame: 0 }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let t = self.frame as f64 / self.fps;
        self.frame += 1;

        let closure_phase = t % CLOSURE_PERIOD;
        let blink_phase = t % BLINK_PERIOD;

        let ear = if closure_phase >= CLOSURE_PERIOD - CLOSURE_SECS {
            CLOSURE_EAR
        } else if blink_phase < 2.0 / self.fps {
            BLINK_EAR
        } else {
            OPEN_BASELINE + self.rng.random_range(-0.02..0.02)
        };

        Ok(Some(Frame {
            ear: Some(ear),
            ..Frame::default()
        }))
    }
}
