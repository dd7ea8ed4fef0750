//! Facial landmark sources and eye extraction.
//!
//! Two index conventions are supported: the 68-point iBUG layout produced by
//! classic shape predictors, and the 468-point face mesh run by
//! [`OnnxLandmarkSource`]. Both are reduced to the same six eye points.

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::calibration::CalibrationRegion;
use crate::detector::FaceDetector;
use crate::geometry::midpoint;
use crate::mesh::{FaceMesh, MESH_POINTS};
use crate::types::{EyeCoordinates, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkScheme {
    Ibug68,
    Mesh468,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EyeSide {
    Left,
    #[default]
    Right,
}

/// Six eye indices in iBUG order: outer corner, two upper lid points,
/// inner corner, two lower lid points (right-to-left).
fn eye_indices(scheme: LandmarkScheme, side: EyeSide) -> [usize; 6] {
    match (scheme, side) {
        (LandmarkScheme::Ibug68, EyeSide::Left) => [36, 37, 38, 39, 40, 41],
        (LandmarkScheme::Ibug68, EyeSide::Right) => [42, 43, 44, 45, 46, 47],
        (LandmarkScheme::Mesh468, EyeSide::Left) => [33, 160, 158, 133, 153, 144],
        (LandmarkScheme::Mesh468, EyeSide::Right) => [362, 385, 387, 263, 373, 380],
    }
}

/// Landmarks for one detected face, in camera-frame pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceLandmarks {
    pub scheme: LandmarkScheme,
    pub points: Vec<Point>,
}

impl FaceLandmarks {
    pub fn new(scheme: LandmarkScheme, points: Vec<Point>) -> Self {
        Self { scheme, points }
    }

    /// Eye coordinates, or `None` if the point set is too short.
    pub fn eye(&self, side: EyeSide) -> Option<EyeCoordinates> {
        let idx = eye_indices(self.scheme, side);
        let p = |i: usize| self.points.get(idx[i]).copied();
        Some(EyeCoordinates {
            left_corner: p(0)?,
            right_corner: p(3)?,
            top_mid: midpoint(p(1)?, p(2)?),
            bottom_mid: midpoint(p(5)?, p(4)?),
        })
    }
}

/// Tracked gaze position: centre of the lid midpoints.
pub fn pupil(eye: &EyeCoordinates) -> Point {
    midpoint(eye.top_mid, eye.bottom_mid)
}

/// Turns a camera frame into zero or more faces' landmarks.
pub trait LandmarkSource {
    fn name(&self) -> String;
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceLandmarks>>;
}

/// Landmarks for `frame`, or no faces when the source fails on it.
pub fn detect_or_skip(source: &mut dyn LandmarkSource, frame: &RgbImage) -> Vec<FaceLandmarks> {
    source.detect(frame).unwrap_or_else(|e| {
        warn!("{} failed on this frame: {:#}", source.name(), e);
        Vec::new()
    })
}

/// UltraFace detection followed by the face mesh on every face found.
pub struct OnnxLandmarkSource {
    detector: FaceDetector,
    mesh: FaceMesh,
}

impl OnnxLandmarkSource {
    pub fn new(detector_path: &str, mesh_path: &str, score_threshold: f32) -> Result<Self> {
        for path in [detector_path, mesh_path] {
            if !Path::new(path).exists() {
                anyhow::bail!("Model file {} not found", path);
            }
        }
        info!("Loading face detector from {}", detector_path);
        let detector = FaceDetector::new(detector_path, score_threshold)?;
        info!("Loading face mesh from {}", mesh_path);
        let mesh = FaceMesh::new(mesh_path)?;
        Ok(Self { detector, mesh })
    }
}

impl LandmarkSource for OnnxLandmarkSource {
    fn name(&self) -> String {
        "UltraFace + Face Mesh (468 pts)".to_string()
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceLandmarks>> {
        let faces = self.detector.detect(frame)?;
        let mut out = Vec::with_capacity(faces.len());
        for face in &faces {
            let points = self.mesh.landmarks(frame, face)?;
            if points.len() < MESH_POINTS {
                warn!("Face mesh returned {} points, skipping face", points.len());
                continue;
            }
            out.push(FaceLandmarks::new(LandmarkScheme::Mesh468, points));
        }
        Ok(out)
    }
}

const SIM_EYE_HALF_WIDTH: i32 = 20;
const SIM_OPEN_LID: i32 = 6;
const SIM_CLOSED_LID: i32 = 1;
const SIM_EYE_SPACING: i32 = 60;

/// 68-point face whose right pupil sits exactly at `pupil`.
///
/// The open eye has an aspect ratio of 0.3, the closed one 0.05. The left eye
/// mirrors the right one `SIM_EYE_SPACING` pixels to its left.
pub fn synthetic_face(pupil: Point, blinking: bool) -> FaceLandmarks {
    let lid = if blinking { SIM_CLOSED_LID } else { SIM_OPEN_LID };
    let mut points = vec![pupil; 68];

    let mut place_eye = |base: usize, c: Point| {
        points[base] = Point::new(c.x - SIM_EYE_HALF_WIDTH, c.y);
        points[base + 1] = Point::new(c.x - 5, c.y - lid);
        points[base + 2] = Point::new(c.x + 5, c.y - lid);
        points[base + 3] = Point::new(c.x + SIM_EYE_HALF_WIDTH, c.y);
        points[base + 4] = Point::new(c.x + 5, c.y + lid);
        points[base + 5] = Point::new(c.x - 5, c.y + lid);
    };
    place_eye(42, pupil);
    place_eye(36, Point::new(pupil.x - SIM_EYE_SPACING, pupil.y));

    FaceLandmarks::new(LandmarkScheme::Ibug68, points)
}

/// Stand-in for the camera models: a pupil sweeping an ellipse inside the
/// calibrated region, closing the eye for a few frames at a fixed period.
pub struct SimulatedLandmarks {
    region: CalibrationRegion,
    frame_count: u64,
    blink_every: u64,
    blink_frames: u64,
}

impl SimulatedLandmarks {
    pub fn new(region: CalibrationRegion) -> Self {
        Self {
            region,
            frame_count: 0,
            blink_every: 45,
            blink_frames: 3,
        }
    }

    pub fn with_blink_period(mut self, every: u64, frames: u64) -> Self {
        self.blink_every = every.max(1);
        self.blink_frames = frames.min(self.blink_every);
        self
    }

    /// Pupil and blink state for frame `n`.
    pub fn sample(&self, n: u64) -> (Point, bool) {
        let extent = self.region.extent();
        let t = n as f64 * 0.03;
        let rx = (f64::from(extent.width) / 2.0 - 1.0).max(0.0) * 0.9;
        let ry = (f64::from(extent.height) / 2.0 - 1.0).max(0.0) * 0.9;
        let cx = f64::from(self.region.x_min) + f64::from(extent.width) / 2.0;
        let cy = f64::from(self.region.y_min) + f64::from(extent.height) / 2.0;
        let pupil = Point::new(
            (cx + rx * t.cos()).round() as i32,
            (cy + ry * (2.0 * t).sin()).round() as i32,
        );
        let blinking = n % self.blink_every >= self.blink_every - self.blink_frames;
        (pupil, blinking)
    }
}

impl LandmarkSource for SimulatedLandmarks {
    fn name(&self) -> String {
        "Simulated eye".to_string()
    }

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<FaceLandmarks>> {
        let (pupil, blinking) = self.sample(self.frame_count);
        self.frame_count += 1;
        Ok(vec![synthetic_face(pupil, blinking)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blink::BlinkDetector;

    #[test]
    fn ibug_right_eye_uses_points_42_to_47() {
        let mut points = vec![Point::default(); 68];
        points[42] = Point::new(10, 20);
        points[43] = Point::new(14, 16);
        points[44] = Point::new(18, 16);
        points[45] = Point::new(24, 20);
        points[46] = Point::new(18, 24);
        points[47] = Point::new(14, 25);
        let face = FaceLandmarks::new(LandmarkScheme::Ibug68, points);
        let eye = face.eye(EyeSide::Right).unwrap();
        assert_eq!(eye.left_corner, Point::new(10, 20));
        assert_eq!(eye.right_corner, Point::new(24, 20));
        assert_eq!(eye.top_mid, Point::new(16, 16));
        assert_eq!(eye.bottom_mid, Point::new(16, 24));
        assert_eq!(pupil(&eye), Point::new(16, 20));
    }

    #[test]
    fn short_point_set_has_no_eye() {
        let face = FaceLandmarks::new(LandmarkScheme::Mesh468, vec![Point::default(); 300]);
        assert!(face.eye(EyeSide::Left).is_some());
        assert!(face.eye(EyeSide::Right).is_none());
    }

    #[test]
    fn synthetic_face_places_pupil_and_blinks() {
        let det = BlinkDetector::default();
        let open = synthetic_face(Point::new(300, 340), false);
        let eye = open.eye(EyeSide::Right).unwrap();
        assert_eq!(pupil(&eye), Point::new(300, 340));
        assert!(!det.is_blinking(&eye));
        assert!(!det.is_blinking(&open.eye(EyeSide::Left).unwrap()));

        let shut = synthetic_face(Point::new(300, 340), true);
        assert!(det.is_blinking(&shut.eye(EyeSide::Right).unwrap()));
    }

    #[test]
    fn simulation_stays_inside_region_and_blinks_periodically() {
        let region = CalibrationRegion { x_min: 229, x_max: 373, y_min: 305, y_max: 379 };
        let sim = SimulatedLandmarks::new(region).with_blink_period(10, 2);
        let mut blinks = 0;
        for n in 0..500 {
            let (p, blinking) = sim.sample(n);
            let local = region.to_region(p);
            assert!(local.x > 0 && local.x < region.extent().width, "{} out of region", p);
            assert!(local.y > 0 && local.y < region.extent().height, "{} out of region", p);
            if blinking {
                blinks += 1;
            }
        }
        assert_eq!(blinks, 100);
    }

    struct Flaky {
        calls: usize,
    }

    impl LandmarkSource for Flaky {
        fn name(&self) -> String {
            "flaky".to_string()
        }

        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<FaceLandmarks>> {
            self.calls += 1;
            if self.calls == 1 {
                anyhow::bail!("inference failed");
            }
            Ok(vec![synthetic_face(Point::new(5, 5), false)])
        }
    }

    #[test]
    fn failed_detection_yields_no_faces_and_the_next_frame_recovers() {
        let mut source = Flaky { calls: 0 };
        let frame = RgbImage::new(4, 4);
        assert!(detect_or_skip(&mut source, &frame).is_empty());
        assert_eq!(detect_or_skip(&mut source, &frame).len(), 1);
    }
}
