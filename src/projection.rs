use crate::error::GazeError;
use crate::geometry::rescale;
use crate::types::{Extent, Point};

/// Per-axis linear map from the calibrated cut region onto a render surface.
///
/// Both extents are checked once at construction, so `project` cannot divide
/// by zero mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projector {
    source: Extent,
    dest: Extent,
}

impl Projector {
    pub fn new(source: Extent, dest: Extent) -> Result<Self, GazeError> {
        if source.is_degenerate() || dest.is_degenerate() {
            return Err(GazeError::Projection {
                source_extent: source,
                dest_extent: dest,
            });
        }
        Ok(Self { source, dest })
    }

    pub fn source(&self) -> Extent {
        self.source
    }

    pub fn dest(&self) -> Extent {
        self.dest
    }

    pub fn project(&self, point: Point) -> Point {
        rescale(point, self.source, self.dest)
    }

    pub fn unproject(&self, point: Point) -> Point {
        rescale(point, self.dest, self.source)
    }
}

/// One-shot projection with the extents validated on the spot.
pub fn project(point: Point, source: Extent, dest: Extent) -> Result<Point, GazeError> {
    Projector::new(source, dest).map(|p| p.project(point))
}
