//! Shared types used across all healing stages.
//!
//! These are plain values: created fresh for every operation, never mutated
//! after construction, and serializable so the CLI can read selections from
//! JSON and print results.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Axis-aligned rectangle in image pixel coordinates.
///
/// `right` and `bottom` are exclusive, so a rect covering the whole of a
/// 640×480 image is `Rect::new(0, 0, 640, 480)`. Coordinates are signed
/// because callers may hand us selections that hang off the image; those are
/// rejected by validation or clipped with [`Rect::clip`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rect from a top-left corner and a size.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    /// Pixel count. Zero for degenerate rects.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn max_dim(&self) -> i32 {
        self.width().max(self.height())
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) as f32 / 2.0,
            (self.top + self.bottom) as f32 / 2.0,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// True when the two rects share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Grow (or shrink, for negative `by`) on all four sides.
    pub fn expand(&self, by: i32) -> Rect {
        Rect::new(
            self.left - by,
            self.top - by,
            self.right + by,
            self.bottom + by,
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Clip to `[0, width) × [0, height)`. `None` if nothing is left.
    pub fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        self.intersection(&Rect::new(0, 0, width as i32, height as i32))
    }

    /// True when the rect lies entirely inside a `width × height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right <= width as i32
            && self.bottom <= height as i32
    }

    /// Euclidean distance between the centers of two rects.
    pub fn center_distance(&self, other: &Rect) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{} → {},{} ({}×{})",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// A single point on a brush stroke, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
}

/// One brush stroke as captured by the UI.
///
/// - `radius`: brush radius in pixels
/// - `hardness`: 1.0 = crisp edge, 0.0 = fully feathered
/// - `opacity`: final alpha multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<StrokePoint>,
    pub radius: f32,
    #[serde(default = "default_unit")]
    pub hardness: f32,
    #[serde(default = "default_unit")]
    pub opacity: f32,
}

fn default_unit() -> f32 {
    1.0
}

impl Stroke {
    pub fn new(points: &[(f32, f32)], radius: f32, hardness: f32, opacity: f32) -> Self {
        Self {
            points: points.iter().map(|&(x, y)| StrokePoint { x, y }).collect(),
            radius,
            hardness: hardness.clamp(0.0, 1.0),
            opacity: opacity.clamp(0.0, 1.0),
        }
    }

    /// Bounding box of the stroke points expanded by the brush radius.
    pub fn bounds(&self) -> Option<Rect> {
        let first = self.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let r = self.radius.max(0.0);
        Some(Rect::new(
            (min_x - r).floor() as i32,
            (min_y - r).floor() as i32,
            (max_x + r).ceil() as i32 + 1,
            (max_y + r).ceil() as i32 + 1,
        ))
    }
}

/// A candidate source rectangle with its similarity score in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceCandidate {
    pub rect: Rect,
    pub score: f32,
    /// Center-to-center distance to the target area, used to break ties.
    pub distance: f32,
}

impl SourceCandidate {
    /// Ranking order: score descending, then distance ascending.
    pub fn rank(&self, other: &SourceCandidate) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.distance.total_cmp(&other.distance))
    }
}

/// How the source of a healing operation was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionOrigin {
    UserSpecified,
    AutoDetected,
}

/// Identifies one healing operation, retained for history display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingRegion {
    pub target: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Rect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strokes: Vec<Stroke>,
    pub confidence: f32,
    pub origin: RegionOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_dimensions_and_area() {
        let r = Rect::new(10, 20, 74, 52);
        assert_eq!(r.width(), 64);
        assert_eq!(r.height(), 32);
        assert_eq!(r.area(), 2048);
        assert_eq!(r.max_dim(), 64);
        assert_eq!(r.center(), (42.0, 36.0));
    }

    #[test]
    fn degenerate_rect_is_empty() {
        assert!(Rect::new(5, 5, 5, 10).is_empty());
        assert!(Rect::new(5, 5, 4, 10).is_empty());
        assert_eq!(Rect::new(5, 5, 4, 10).area(), 0);
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 20, 10);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9, 9, 20, 20)));
    }

    #[test]
    fn clip_to_image() {
        let r = Rect::new(-5, -5, 20, 20);
        assert_eq!(r.clip(10, 15), Some(Rect::new(0, 0, 10, 15)));
        assert_eq!(Rect::new(20, 20, 30, 30).clip(10, 10), None);
    }

    #[test]
    fn fits_within_uses_exclusive_edges() {
        assert!(Rect::new(0, 0, 100, 100).fits_within(100, 100));
        assert!(!Rect::new(0, 0, 101, 100).fits_within(100, 100));
        assert!(!Rect::new(-1, 0, 50, 50).fits_within(100, 100));
    }

    #[test]
    fn stroke_bounds_include_radius() {
        let s = Stroke::new(&[(10.0, 10.0), (30.0, 20.0)], 5.0, 1.0, 1.0);
        assert_eq!(s.bounds(), Some(Rect::new(5, 5, 36, 26)));
    }

    #[test]
    fn empty_stroke_has_no_bounds() {
        let s = Stroke::new(&[], 5.0, 1.0, 1.0);
        assert_eq!(s.bounds(), None);
    }

    #[test]
    fn stroke_json_defaults_hardness_and_opacity() {
        let s: Stroke = serde_json::from_str(r#"{"points":[{"x":1,"y":2}],"radius":4}"#).unwrap();
        assert_eq!(s.hardness, 1.0);
        assert_eq!(s.opacity, 1.0);
    }

    #[test]
    fn candidates_rank_by_score_then_distance() {
        let a = SourceCandidate {
            rect: Rect::new(0, 0, 1, 1),
            score: 0.8,
            distance: 50.0,
        };
        let b = SourceCandidate { score: 0.9, ..a };
        let c = SourceCandidate { distance: 10.0, ..a };
        let mut v = vec![a, b, c];
        v.sort_by(|x, y| x.rank(y));
        assert_eq!(v[0].score, 0.9);
        assert_eq!(v[1].distance, 10.0);
        assert_eq!(v[2].distance, 50.0);
    }
}
