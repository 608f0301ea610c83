use serde::{Deserialize, Serialize};

/// A 2D eye landmark coordinate, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Eye aspect ratio over the standard 6-point eye landmark layout:
/// p0,p3 are the horizontal corners, p1/p5 and p2/p4 the vertical lid pairs.
///
/// EAR = (‖p1−p5‖ + ‖p2−p4‖) / (2·‖p0−p3‖)
///
/// Returns 0.0 when the horizontal corner distance is zero (degenerate
/// geometry), which downstream code treats the same as "no face".
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f64 {
    let vertical_a = eye[1].distance(eye[5]);
    let vertical_b = eye[2].distance(eye[4]);
    let horizontal = eye[0].distance(eye[3]);

    if horizontal > 0.0 {
        (vertical_a + vertical_b) / (2.0 * horizontal)
    } else {
        0.0
    }
}

/// Per-frame raw EAR: the mean over both eyes.
pub fn average_ear(left: &[Point; 6], right: &[Point; 6]) -> f64 {
    (eye_aspect_ratio(left) + eye_aspect_ratio(right)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A plausible open eye: 4 units wide, lids ~1.2 units apart.
    pub(crate) fn open_eye() -> [Point; 6] {
        [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.6),
            Point::new(3.0, 0.6),
            Point::new(4.0, 0.0),
            Point::new(3.0, -0.6),
            Point::new(1.0, -0.6),
        ]
    }

    #[test]
    fn test_open_eye_ratio() {
        let ear = eye_aspect_ratio(&open_eye());
        // Both vertical pairs are 1.2 apart, corners 4.0 apart: 2.4 / 8.0
        assert_relative_eq!(ear, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_closed_eye_ratio_near_zero() {
        let eye = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.01),
            Point::new(3.0, 0.01),
            Point::new(4.0, 0.0),
            Point::new(3.0, -0.01),
            Point::new(1.0, -0.01),
        ];
        assert!(eye_aspect_ratio(&eye) < 0.05);
    }

    #[test]
    fn test_translation_invariance() {
        let base = open_eye();
        let shifted: [Point; 6] =
            base.map(|p| Point::new(p.x + 137.5, p.y - 42.25));
        assert_relative_eq!(
            eye_aspect_ratio(&base),
            eye_aspect_ratio(&shifted),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_degenerate_horizontal_returns_zero() {
        let mut eye = open_eye();
        eye[3] = eye[0]; // corners coincide
        assert_eq!(eye_aspect_ratio(&eye), 0.0);
    }

    #[test]
    fn test_average_of_both_eyes() {
        let left = open_eye();
        // Right eye half as open
        let right: [Point; 6] =
            left.map(|p| Point::new(p.x, p.y * 0.5));
        let avg = average_ear(&left, &right);
        assert_relative_eq!(avg, (0.3 + 0.15) / 2.0, epsilon = 1e-12);
    }
}
