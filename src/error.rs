use thiserror::Error;

use crate::types::{Extent, Point};

/// Errors raised by the gaze-to-key pipeline.
///
/// `Config`, `Calibration` and `Projection` are configuration errors that abort startup.
/// The rest are per-frame conditions the session loop logs and moves past.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GazeError {
    #[error("invalid setting: {0}")]
    Config(String),

    #[error("calibration failed: {0}")]
    Calibration(String),

    #[error("{0} faces in frame, expected one")]
    MultiFace(usize),

    #[error("no face in frame")]
    NoFace,

    #[error("pupil at {0} is outside the calibrated region")]
    OutOfBounds(Point),

    #[error("cannot project from {source_extent} to {dest_extent}")]
    Projection {
        source_extent: Extent,
        dest_extent: Extent,
    },

    #[error("suggestions unavailable: {0}")]
    SuggestionUnavailable(String),
}

impl GazeError {
    /// True for errors that only cost the current frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GazeError::MultiFace(_)
                | GazeError::NoFace
                | GazeError::OutOfBounds(_)
                | GazeError::SuggestionUnavailable(_)
        )
    }
}
