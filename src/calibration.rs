use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::blink::RisingEdge;
use crate::error::GazeError;
use crate::geometry::cut_limits;
use crate::types::{Extent, Point};

/// Camera-frame rectangle treated as the gaze-bearing area for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationRegion {
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
}

impl CalibrationRegion {
    /// Offset that moves frame coordinates into region coordinates.
    pub fn offset(&self) -> Point {
        Point::new(self.x_min, self.y_min)
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.x_max - self.x_min, self.y_max - self.y_min)
    }

    /// Translate a frame-space point into region space.
    pub fn to_region(&self, frame_point: Point) -> Point {
        Point::new(frame_point.x - self.x_min, frame_point.y - self.y_min)
    }
}

/// Bounding region of the calibration samples.
///
/// Fails if there are no samples or if the samples do not span a positive
/// width and height.
pub fn compute_calibration(samples: &[Point]) -> Result<CalibrationRegion, GazeError> {
    let (x_min, x_max, y_min, y_max) = cut_limits(samples)
        .ok_or_else(|| GazeError::Calibration("no calibration samples".to_string()))?;

    let region = CalibrationRegion { x_min, x_max, y_min, y_max };
    let extent = region.extent();
    if extent.is_degenerate() {
        return Err(GazeError::Calibration(format!(
            "samples span {} which has no area",
            extent
        )));
    }
    Ok(region)
}

/// Pupil reading fed to the interactive capture for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureInput {
    pub pupil: Point,
    pub blinking: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureProgress {
    /// Waiting for a blink while the user looks at `targets[index]`.
    Waiting { index: usize, target: Point },
    /// Sample recorded for `index`; the next target opens after the settle delay.
    Recorded { index: usize, sample: Point },
    /// Still inside the settle delay after the previous sample.
    Settling,
    Complete(CalibrationRegion),
}

/// Blink-driven capture of one pupil sample per on-screen target.
pub struct CalibrationCapture {
    targets: Vec<Point>,
    samples: Vec<Point>,
    settle: Duration,
    settle_until: Option<Instant>,
    edge: RisingEdge,
}

impl CalibrationCapture {
    pub fn new(targets: Vec<Point>, settle: Duration) -> Self {
        Self {
            targets,
            samples: Vec::new(),
            settle,
            settle_until: None,
            edge: RisingEdge::new(),
        }
    }

    /// Corners of a keyboard: top-left, bottom-right, top-right, bottom-left.
    pub fn keyboard_corners(offset: Point, width: i32, height: i32) -> Vec<Point> {
        vec![
            offset,
            Point::new(offset.x + width, offset.y + height),
            Point::new(offset.x + width, offset.y),
            Point::new(offset.x, offset.y + height),
        ]
    }

    pub fn targets(&self) -> &[Point] {
        &self.targets
    }

    pub fn samples(&self) -> &[Point] {
        &self.samples
    }

    pub fn current_target(&self) -> Option<Point> {
        self.targets.get(self.samples.len()).copied()
    }

    pub fn is_done(&self) -> bool {
        self.samples.len() >= self.targets.len()
    }

    /// Advance with the reading for one frame. `None` means no usable face.
    pub fn observe(
        &mut self,
        input: Option<CaptureInput>,
        now: Instant,
    ) -> Result<CaptureProgress, GazeError> {
        if self.is_done() {
            return compute_calibration(&self.samples).map(CaptureProgress::Complete);
        }

        // Frames without a face keep the last eye state
        let blink_edge = input.is_some_and(|reading| self.edge.update(reading.blinking));

        if let Some(until) = self.settle_until {
            if now < until {
                return Ok(CaptureProgress::Settling);
            }
            self.settle_until = None;
        }

        let index = self.samples.len();
        match input {
            Some(reading) if blink_edge => {
                info!("Calibration target {} sampled at {}", index, reading.pupil);
                self.samples.push(reading.pupil);
                self.settle_until = Some(now + self.settle);
                if self.is_done() {
                    return compute_calibration(&self.samples).map(CaptureProgress::Complete);
                }
                Ok(CaptureProgress::Recorded { index, sample: reading.pupil })
            }
            _ => {
                let target = self.targets[index];
                debug!("Calibration waiting on target {} at {}", index, target);
                Ok(CaptureProgress::Waiting { index, target })
            }
        }
    }
}
