use crate::geometry::eye_aspect_ratio;
use crate::types::EyeCoordinates;

pub const DEFAULT_BLINK_RATIO: f64 = 0.2;

/// Eye-aspect-ratio blink test. Holds no per-frame state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkDetector {
    threshold: f64,
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BLINK_RATIO)
    }
}

impl BlinkDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Opening-to-width ratio, or `None` if the eye corners coincide.
    pub fn ratio(&self, eye: &EyeCoordinates) -> Option<f64> {
        eye_aspect_ratio(eye.left_corner, eye.right_corner, eye.top_mid, eye.bottom_mid)
    }

    /// True iff the ratio is strictly below the threshold.
    /// A degenerate eye (zero width) never counts as blinking.
    pub fn is_blinking(&self, eye: &EyeCoordinates) -> bool {
        self.ratio(eye).map_or(false, |r| r < self.threshold)
    }
}

/// Detects the not-blinking to blinking transition between frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct RisingEdge {
    previous: bool,
}

impl RisingEdge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current level; returns true only on a false -> true step.
    pub fn update(&mut self, level: bool) -> bool {
        let edge = level && !self.previous;
        self.previous = level;
        edge
    }
}
