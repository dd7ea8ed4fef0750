//! Pure geometry shared by the blink, calibration, projection and key modules.

use crate::types::{Extent, Point, Rect};

/// Integer midpoint of two points, truncating toward zero on each axis.
pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2, (a.y + b.y) / 2)
}

/// Euclidean distance.
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = f64::from(b.x - a.x);
    let dy = f64::from(b.y - a.y);
    (dx * dx + dy * dy).sqrt()
}

/// Ratio of the vertical eye opening to the horizontal eye width.
///
/// Returns `None` when the corners coincide, since the ratio is undefined there.
pub fn eye_aspect_ratio(left: Point, right: Point, top: Point, bottom: Point) -> Option<f64> {
    let major = distance(left, right);
    if major == 0.0 {
        return None;
    }
    Some(distance(top, bottom) / major)
}

/// Bounding box of a point set as `(x_min, x_max, y_min, y_max)`.
pub fn cut_limits(points: &[Point]) -> Option<(i32, i32, i32, i32)> {
    let first = points.first()?;
    let mut limits = (first.x, first.x, first.y, first.y);
    for p in &points[1..] {
        limits.0 = limits.0.min(p.x);
        limits.1 = limits.1.max(p.x);
        limits.2 = limits.2.min(p.y);
        limits.3 = limits.3.max(p.y);
    }
    Some(limits)
}

/// Rescale a point from one surface to another, independently per axis.
///
/// The caller guarantees `from` is not degenerate.
pub fn rescale(point: Point, from: Extent, to: Extent) -> Point {
    let sx = f64::from(to.width) / f64::from(from.width);
    let sy = f64::from(to.height) / f64::from(from.height);
    Point::new(
        (f64::from(point.x) * sx).floor() as i32,
        (f64::from(point.y) * sy).floor() as i32,
    )
}

/// Strict interior test: points on the border of the surface are outside.
pub fn is_in_bounds(point: Point, region: Extent) -> bool {
    0 < point.x && point.x < region.width && 0 < point.y && point.y < region.height
}

/// Half-open containment: `top_left <= point < bottom_right` on both axes.
pub fn rect_contains(rect: &Rect, point: Point) -> bool {
    rect.top_left.x <= point.x
        && point.x < rect.bottom_right.x
        && rect.top_left.y <= point.y
        && point.y < rect.bottom_right.y
}
