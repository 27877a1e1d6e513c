//! Pure calculation functions for healing geometry.
//!
//! All functions here are pure and testable without any pixels: tiling a
//! target into patches or batches, rescaling rects between the original and
//! the working resolution, and generating deterministic search positions.

use crate::types::Rect;
use std::collections::HashSet;

/// Overlap in pixels for a patch of `patch` pixels and an overlap fraction.
///
/// Always strictly smaller than the patch so the tiling stride stays positive.
pub fn patch_overlap(patch: u32, fraction: f32) -> u32 {
    let overlap = (patch as f32 * fraction.clamp(0.0, 0.9)).round() as u32;
    overlap.min(patch.saturating_sub(1))
}

/// Start offsets along one axis for tiles of `size` advancing by `stride`.
///
/// The last tile may extend past `end`; callers clip it.
fn axis_starts(start: i32, end: i32, size: i32, stride: i32) -> Vec<i32> {
    let mut starts = Vec::new();
    let mut pos = start;
    loop {
        starts.push(pos);
        if pos + size >= end {
            break;
        }
        pos += stride;
    }
    starts
}

/// Partition `target` into overlapping patches, row-major.
///
/// Neighbouring patches share `overlap` pixels; patches on the right and
/// bottom edges are clipped to stay inside `target`. The union of the
/// returned rects is exactly `target`.
pub fn patch_grid(target: &Rect, patch: u32, overlap: u32) -> Vec<Rect> {
    if target.is_empty() || patch == 0 {
        return Vec::new();
    }
    let size = patch as i32;
    let stride = (patch - overlap.min(patch - 1)) as i32;
    let xs = axis_starts(target.left, target.right, size, stride);
    let ys = axis_starts(target.top, target.bottom, size, stride);

    let mut patches = Vec::with_capacity(xs.len() * ys.len());
    for &y in &ys {
        for &x in &xs {
            patches.push(Rect::new(
                x,
                y,
                (x + size).min(target.right),
                (y + size).min(target.bottom),
            ));
        }
    }
    patches
}

/// Partition `target` into non-overlapping batches of at most `batch` pixels
/// per side, row-major. Every pixel of `target` lands in exactly one batch.
pub fn batch_grid(target: &Rect, batch: u32) -> Vec<Rect> {
    if target.is_empty() || batch == 0 {
        return Vec::new();
    }
    let size = batch as i32;
    let mut batches = Vec::new();
    let mut y = target.top;
    while y < target.bottom {
        let mut x = target.left;
        while x < target.right {
            batches.push(Rect::new(
                x,
                y,
                (x + size).min(target.right),
                (y + size).min(target.bottom),
            ));
            x += size;
        }
        y += size;
    }
    batches
}

/// Working dimensions that fit `original` inside `max_dim` on the longer edge.
///
/// A `max_dim` of zero, or an image already small enough, keeps the original.
/// Aspect ratio is preserved and neither edge drops below one pixel.
pub fn calculate_working_dimensions(original: (u32, u32), max_dim: u32) -> (u32, u32) {
    let (w, h) = original;
    let longer = w.max(h);
    if max_dim == 0 || longer <= max_dim {
        return original;
    }
    let ratio = max_dim as f64 / longer as f64;
    (
        ((w as f64 * ratio).round() as u32).max(1),
        ((h as f64 * ratio).round() as u32).max(1),
    )
}

/// Map `rect` from `from` image dimensions to `to` image dimensions.
///
/// Edges are rounded outward so the scaled rect still covers everything the
/// original covered, then clipped to the destination image.
pub fn scale_rect(rect: &Rect, from: (u32, u32), to: (u32, u32)) -> Option<Rect> {
    let sx = to.0 as f64 / from.0.max(1) as f64;
    let sy = to.1 as f64 / from.1.max(1) as f64;
    Rect::new(
        (rect.left as f64 * sx).floor() as i32,
        (rect.top as f64 * sy).floor() as i32,
        (rect.right as f64 * sx).ceil() as i32,
        (rect.bottom as f64 * sy).ceil() as i32,
    )
    .clip(to.0, to.1)
}

/// Deterministic spiral of integer offsets in the annulus `[min_r, max_r]`.
///
/// The angle advances by the golden angle and the radius grows linearly, so
/// consecutive samples spread evenly around the center. Duplicate offsets
/// (common at small radii) and the origin are dropped; at most `count`
/// offsets are returned, ordered from the innermost outward.
pub fn spiral_offsets(min_r: f32, max_r: f32, count: usize) -> Vec<(i32, i32)> {
    const GOLDEN_ANGLE: f32 = 2.399_963;
    if count == 0 {
        return Vec::new();
    }
    let max_r = max_r.max(min_r);
    let mut seen = HashSet::with_capacity(count);
    let mut offsets = Vec::with_capacity(count);
    let denom = (count.saturating_sub(1)).max(1) as f32;
    for i in 0..count {
        let t = i as f32 / denom;
        let radius = min_r + (max_r - min_r) * t;
        let angle = i as f32 * GOLDEN_ANGLE;
        let dx = (angle.cos() * radius).round() as i32;
        let dy = (angle.sin() * radius).round() as i32;
        if (dx, dy) == (0, 0) || !seen.insert((dx, dy)) {
            continue;
        }
        offsets.push((dx, dy));
    }
    offsets
}

/// Same-size rects centered on concentric rings around `target`'s center.
///
/// Radii run from `2 × max_dim` to `4 × max_dim` in steps of
/// `ring_step × max_dim`; angles advance by `angle_step_degrees`. Rings are
/// emitted innermost first and, within a ring, counter-clockwise from +x.
/// No bounds or overlap filtering happens here.
pub fn ring_candidates(target: &Rect, ring_step: f32, angle_step_degrees: f32) -> Vec<Rect> {
    let max_dim = target.max_dim() as f32;
    if max_dim <= 0.0 {
        return Vec::new();
    }
    let step = (ring_step.max(0.05) * max_dim).max(1.0);
    let angle_step = angle_step_degrees.clamp(1.0, 360.0);
    let (cx, cy) = target.center();
    let (w, h) = (target.width(), target.height());

    let mut rects = Vec::new();
    let mut radius = 2.0 * max_dim;
    while radius <= 4.0 * max_dim + 1e-3 {
        let mut degrees = 0.0_f32;
        while degrees < 360.0 - 1e-3 {
            let theta = degrees.to_radians();
            let ccx = cx + theta.cos() * radius;
            let ccy = cy + theta.sin() * radius;
            let left = (ccx - w as f32 / 2.0).round() as i32;
            let top = (ccy - h as f32 / 2.0).round() as i32;
            rects.push(Rect::from_xywh(left, top, w, h));
            degrees += angle_step;
        }
        radius += step;
    }
    rects
}
