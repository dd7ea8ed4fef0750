use crate::blink::BlinkDetector;
use crate::calibration::CalibrationRegion;
use crate::error::GazeError;
use crate::geometry::is_in_bounds;
use crate::landmarks::{pupil, EyeSide, FaceLandmarks};
use crate::projection::Projector;
use crate::types::{EyeCoordinates, Extent, Point};

/// Where the tracked eye is looking in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeSample {
    pub eye: EyeCoordinates,
    /// Pupil in camera-frame pixels.
    pub pupil: Point,
    /// Pupil relative to the calibrated cut region.
    pub region_point: Point,
    /// Pupil on the key canvas; `None` when outside the cut region.
    pub keyboard_point: Option<Point>,
    pub blinking: bool,
}

impl GazeSample {
    pub fn require_keyboard_point(&self) -> Result<Point, GazeError> {
        self.keyboard_point.ok_or(GazeError::OutOfBounds(self.pupil))
    }
}

/// Landmarks to canvas coordinates: eye, pupil, cut region, projection.
///
/// Holds only immutable calibration data; all cross-frame state lives in the
/// session.
#[derive(Debug, Clone)]
pub struct GazeMapper {
    blink: BlinkDetector,
    region: CalibrationRegion,
    projector: Projector,
    side: EyeSide,
}

impl GazeMapper {
    pub fn new(
        region: CalibrationRegion,
        canvas: Extent,
        blink: BlinkDetector,
        side: EyeSide,
    ) -> Result<Self, GazeError> {
        let projector = Projector::new(region.extent(), canvas)?;
        Ok(Self {
            blink,
            region,
            projector,
            side,
        })
    }

    pub fn region(&self) -> &CalibrationRegion {
        &self.region
    }

    pub fn canvas(&self) -> Extent {
        self.projector.dest()
    }

    pub fn blink_detector(&self) -> &BlinkDetector {
        &self.blink
    }

    /// Read the single face in `faces`.
    ///
    /// Zero faces, or a face without the tracked eye, is [`GazeError::NoFace`];
    /// more than one is [`GazeError::MultiFace`].
    pub fn locate(&self, faces: &[FaceLandmarks]) -> Result<GazeSample, GazeError> {
        let face = match faces {
            [] => return Err(GazeError::NoFace),
            [face] => face,
            many => return Err(GazeError::MultiFace(many.len())),
        };
        let eye = face.eye(self.side).ok_or(GazeError::NoFace)?;
        Ok(self.sample_eye(eye))
    }

    pub fn sample_eye(&self, eye: EyeCoordinates) -> GazeSample {
        let pupil = pupil(&eye);
        let region_point = self.region.to_region(pupil);
        let keyboard_point = if is_in_bounds(region_point, self.region.extent()) {
            Some(self.projector.project(region_point))
        } else {
            None
        };
        GazeSample {
            eye,
            pupil,
            region_point,
            keyboard_point,
            blinking: self.blink.is_blinking(&eye),
        }
    }
}
