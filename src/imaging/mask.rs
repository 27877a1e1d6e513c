//! Target masks built from a rectangle or from brush strokes.
//!
//! A [`Mask`] stores per-pixel coverage in `[0, 1]` for its bounding rect
//! only; every pixel outside the bounds reads as zero. Masks are built once
//! per healing request and never modified afterwards.
//!
//! Brush rasterization:
//!
//! 1. Each stroke's points are joined by a smoothed path (quadratic segments
//!    through point midpoints once a stroke has three or more points).
//! 2. Filled circles whose diameter equals the brush radius are stamped at
//!    every sample along the path, spaced closely enough that fast, sparse
//!    input still yields continuous coverage.
//! 3. The stroke layer is box-blurred with a radius proportional to
//!    `1 - hardness`, scaled by the stroke's opacity, and max-combined into
//!    the mask.

use crate::imaging::calculations::scale_rect;
use crate::types::{Rect, Stroke, StrokePoint};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MaskError {
    #[error("no stroke contains any points")]
    NoStrokes,
    #[error("selection {0} lies outside the image")]
    OutsideImage(Rect),
}

/// Per-pixel coverage over a bounding rect.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    bounds: Rect,
    alpha: Vec<f32>,
}

impl Mask {
    /// Full coverage inside `rect` (clipped to the image).
    pub fn from_rect(rect: &Rect, width: u32, height: u32) -> Result<Self, MaskError> {
        let bounds = rect
            .clip(width, height)
            .ok_or(MaskError::OutsideImage(*rect))?;
        Ok(Self {
            bounds,
            alpha: vec![1.0; bounds.area() as usize],
        })
    }

    /// Bounding rect a stroke mask would get: the union of every stroke's
    /// point bounding box grown by its radius, clipped to the image.
    ///
    /// Cheap enough to validate a brush selection before rasterizing it.
    pub fn stroke_bounds(strokes: &[Stroke], width: u32, height: u32) -> Result<Rect, MaskError> {
        let union = strokes
            .iter()
            .filter_map(Stroke::bounds)
            .reduce(|a, b| a.union(&b))
            .ok_or(MaskError::NoStrokes)?;
        union
            .clip(width, height)
            .ok_or(MaskError::OutsideImage(union))
    }

    /// Rasterize brush strokes within [`Mask::stroke_bounds`].
    pub fn from_strokes(strokes: &[Stroke], width: u32, height: u32) -> Result<Self, MaskError> {
        let bounds = Self::stroke_bounds(strokes, width, height)?;
        let (w, h) = (bounds.width() as usize, bounds.height() as usize);

        let mut mask = Self {
            bounds,
            alpha: vec![0.0; w * h],
        };
        let mut coverage = vec![false; w * h];
        for stroke in strokes.iter().filter(|s| !s.points.is_empty()) {
            coverage.fill(false);
            let stamp_radius = (stroke.radius / 2.0).max(0.5);
            for (x, y) in sample_path(&stroke.points, (stamp_radius * 0.5).max(0.5)) {
                stamp_circle(&mut coverage, &bounds, x, y, stamp_radius);
            }
            let blur = ((1.0 - stroke.hardness.clamp(0.0, 1.0)) * stamp_radius).round() as usize;
            let opacity = stroke.opacity.clamp(0.0, 1.0);
            if blur > 0 {
                let layer = box_blur(&coverage, w, h, blur);
                for (dst, src) in mask.alpha.iter_mut().zip(&layer) {
                    *dst = dst.max(src * opacity);
                }
            } else {
                for (dst, &covered) in mask.alpha.iter_mut().zip(&coverage) {
                    if covered {
                        *dst = dst.max(opacity);
                    }
                }
            }
        }
        Ok(mask)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Coverage at image pixel (x, y); zero outside the bounds.
    pub fn at(&self, x: i32, y: i32) -> f32 {
        if !self.bounds.contains(x, y) {
            return 0.0;
        }
        let idx = (y - self.bounds.top) * self.bounds.width() + (x - self.bounds.left);
        self.alpha[idx as usize]
    }

    /// Number of pixels with non-zero coverage.
    pub fn covered_pixels(&self) -> usize {
        self.alpha.iter().filter(|&&a| a > 0.0).count()
    }

    /// True when `rect` contains at least one covered pixel.
    pub fn touches(&self, rect: &Rect) -> bool {
        let Some(r) = rect.intersection(&self.bounds) else {
            return false;
        };
        (r.top..r.bottom).any(|y| (r.left..r.right).any(|x| self.at(x, y) > 0.0))
    }

    /// Resample the mask from `from` image dimensions to `to` (nearest).
    pub fn scaled(&self, from: (u32, u32), to: (u32, u32)) -> Option<Mask> {
        let bounds = scale_rect(&self.bounds, from, to)?;
        let sx = from.0 as f64 / to.0.max(1) as f64;
        let sy = from.1 as f64 / to.1.max(1) as f64;
        let mut alpha = Vec::with_capacity(bounds.area() as usize);
        for y in bounds.top..bounds.bottom {
            let src_y = ((y as f64 + 0.5) * sy).floor() as i32;
            for x in bounds.left..bounds.right {
                let src_x = ((x as f64 + 0.5) * sx).floor() as i32;
                alpha.push(self.at(src_x, src_y));
            }
        }
        Some(Mask { bounds, alpha })
    }

    /// Bounding rects of the 4-connected covered regions, in scan order.
    ///
    /// Uses an explicit work-list so arbitrarily large regions never grow the
    /// call stack.
    pub fn components(&self) -> Vec<Rect> {
        let (w, h) = (self.bounds.width() as usize, self.bounds.height() as usize);
        let mut visited = vec![false; w * h];
        let mut stack = Vec::new();
        let mut regions = Vec::new();

        for start in 0..w * h {
            if visited[start] || self.alpha[start] <= 0.0 {
                continue;
            }
            visited[start] = true;
            stack.push(start);
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0, 0);
            while let Some(idx) = stack.pop() {
                let (x, y) = (idx % w, idx / w);
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let mut visit = |n: usize| {
                    if !visited[n] && self.alpha[n] > 0.0 {
                        visited[n] = true;
                        stack.push(n);
                    }
                };
                if x > 0 {
                    visit(idx - 1);
                }
                if x + 1 < w {
                    visit(idx + 1);
                }
                if y > 0 {
                    visit(idx - w);
                }
                if y + 1 < h {
                    visit(idx + w);
                }
            }
            regions.push(Rect::new(
                self.bounds.left + min_x as i32,
                self.bounds.top + min_y as i32,
                self.bounds.left + max_x as i32 + 1,
                self.bounds.top + max_y as i32 + 1,
            ));
        }
        regions
    }
}

// =============================================================================
// Rasterization helpers
// =============================================================================

fn midpoint(a: &StrokePoint, b: &StrokePoint) -> (f32, f32) {
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

fn sample_line(out: &mut Vec<(f32, f32)>, from: (f32, f32), to: (f32, f32), spacing: f32) {
    let len = ((to.0 - from.0).powi(2) + (to.1 - from.1).powi(2)).sqrt();
    let steps = (len / spacing).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        out.push((from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t));
    }
}

fn sample_quadratic(
    out: &mut Vec<(f32, f32)>,
    from: (f32, f32),
    control: (f32, f32),
    to: (f32, f32),
    spacing: f32,
) {
    // Control-polygon length bounds the curve length from above.
    let len = ((control.0 - from.0).powi(2) + (control.1 - from.1).powi(2)).sqrt()
        + ((to.0 - control.0).powi(2) + (to.1 - control.1).powi(2)).sqrt();
    let steps = (len / spacing).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let u = 1.0 - t;
        out.push((
            u * u * from.0 + 2.0 * u * t * control.0 + t * t * to.0,
            u * u * from.1 + 2.0 * u * t * control.1 + t * t * to.1,
        ));
    }
}

/// Sample positions along the smoothed path through `points`.
fn sample_path(points: &[StrokePoint], spacing: f32) -> Vec<(f32, f32)> {
    let mut out = Vec::new();
    match points {
        [] => {}
        [only] => out.push((only.x, only.y)),
        [a, b] => sample_line(&mut out, (a.x, a.y), (b.x, b.y), spacing),
        _ => {
            let n = points.len();
            sample_line(
                &mut out,
                (points[0].x, points[0].y),
                midpoint(&points[0], &points[1]),
                spacing,
            );
            for i in 1..n - 1 {
                sample_quadratic(
                    &mut out,
                    midpoint(&points[i - 1], &points[i]),
                    (points[i].x, points[i].y),
                    midpoint(&points[i], &points[i + 1]),
                    spacing,
                );
            }
            sample_line(
                &mut out,
                midpoint(&points[n - 2], &points[n - 1]),
                (points[n - 1].x, points[n - 1].y),
                spacing,
            );
        }
    }
    out
}

fn stamp_circle(coverage: &mut [bool], bounds: &Rect, cx: f32, cy: f32, radius: f32) {
    let r2 = radius * radius;
    let Some(area) = Rect::new(
        (cx - radius).floor() as i32,
        (cy - radius).floor() as i32,
        (cx + radius).ceil() as i32 + 1,
        (cy + radius).ceil() as i32 + 1,
    )
    .intersection(bounds) else {
        return;
    };
    let w = bounds.width();
    for y in area.top..area.bottom {
        for x in area.left..area.right {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                coverage[((y - bounds.top) * w + (x - bounds.left)) as usize] = true;
            }
        }
    }
}

/// Separable box blur of a coverage layer, edges clamped.
///
/// Both passes slide a running sum along each line, so the cost does not
/// depend on the radius. Sums are exact integer counts: uncovered areas
/// stay exactly zero.
fn box_blur(coverage: &[bool], w: usize, h: usize, radius: usize) -> Vec<f32> {
    let mut rows = vec![0u64; w * h];
    for y in 0..h {
        let line = &coverage[y * w..(y + 1) * w];
        sliding_sums(
            w,
            radius,
            |x| line[x] as u64,
            |x, sum| rows[y * w + x] = sum,
        );
    }

    let window = (2 * radius + 1) as f64;
    let area = window * window;
    let mut out = vec![0.0f32; w * h];
    for x in 0..w {
        sliding_sums(
            h,
            radius,
            |y| rows[y * w + x],
            |y, sum| out[y * w + x] = (sum as f64 / area) as f32,
        );
    }
    out
}

/// Window sums of `value` over `[i - radius, i + radius]` for every `i` in
/// `0..len`, with out-of-range indices clamped to the ends.
fn sliding_sums(
    len: usize,
    radius: usize,
    value: impl Fn(usize) -> u64,
    mut emit: impl FnMut(usize, u64),
) {
    if len == 0 {
        return;
    }
    let last = len - 1;
    let at = |i: isize| value(i.clamp(0, last as isize) as usize);

    let reach = radius.min(last);
    let mut sum = value(0) * (radius as u64 + 1)
        + (1..=reach).map(&value).sum::<u64>()
        + value(last) * (radius - reach) as u64;
    let r = radius as isize;
    for i in 0..len {
        emit(i, sum);
        let i = i as isize;
        sum = sum + at(i + r + 1) - at(i - r);
    }
}
