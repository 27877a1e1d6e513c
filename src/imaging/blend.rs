//! Pixel compositing for healed regions.
//!
//! - [`fill_from_border`] seeds a target with an inverse-distance blend of the
//!   pixels just outside it, so the first synthesis level matches toward the
//!   surroundings instead of the defect.
//! - [`blend_patch`] pastes a source patch over a destination patch using an
//!   approximate gradient-domain blend: forward-difference gradients of both
//!   are mixed per pixel (stronger gradient wins), integrated forward from the
//!   destination's own edge, then feathered radially against the raw paste.
//! - [`PatchAccumulator`] merges overlapping blended patches with the same
//!   radial weights.
//! - [`composite_masked`] writes a healed buffer into the output image through
//!   the mask alpha, leaving every uncovered pixel untouched.
//!
//! Reconstruction is direct integration, not a Poisson solve. Drift along a
//! row is bounded by averaging the horizontal and vertical integrations and
//! by the feather, which hands the patch center back to the raw paste.

use crate::imaging::mask::Mask;
use crate::types::Rect;
use image::RgbaImage;

/// Floor on accumulation weight so patch edges still contribute.
const FEATHER_EPSILON: f32 = 0.05;

pub type Rgb = [f32; 3];

fn read(image: &RgbaImage, x: i32, y: i32) -> Option<Rgb> {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return None;
    }
    let p = image.get_pixel(x as u32, y as u32);
    Some([p[0] as f32, p[1] as f32, p[2] as f32])
}

fn write(image: &mut RgbaImage, x: i32, y: i32, c: Rgb) {
    let p = image.get_pixel_mut(x as u32, y as u32);
    for i in 0..3 {
        p[i] = c[i].round().clamp(0.0, 255.0) as u8;
    }
}

/// Radial feather weight: 1.0 at the center of `rect`, 0.0 on its outer ring.
pub fn radial_weight(rect: &Rect, x: i32, y: i32) -> f32 {
    let (cx, cy) = rect.center();
    let hw = (rect.width() as f32 / 2.0).max(0.5);
    let hh = (rect.height() as f32 / 2.0).max(0.5);
    let dx = ((x as f32 + 0.5 - cx) / hw).abs();
    let dy = ((y as f32 + 0.5 - cy) / hh).abs();
    (1.0 - dx.max(dy)).clamp(0.0, 1.0)
}

/// Overwrite `rect` with an interpolation of the pixels bordering it.
///
/// Each pixel mixes the nearest outside pixel on each of the four sides,
/// weighted by inverse distance. Sides outside the image are skipped; if no
/// side is available the rect is left as is.
pub fn fill_from_border(image: &mut RgbaImage, rect: &Rect) {
    let Some(rect) = rect.clip(image.width(), image.height()) else {
        return;
    };
    let mut filled = Vec::with_capacity(rect.area() as usize);
    for y in rect.top..rect.bottom {
        for x in rect.left..rect.right {
            let sides = [
                (read(image, rect.left - 1, y), x - rect.left + 1),
                (read(image, rect.right, y), rect.right - x),
                (read(image, x, rect.top - 1), y - rect.top + 1),
                (read(image, x, rect.bottom), rect.bottom - y),
            ];
            let mut sum = [0.0f32; 3];
            let mut total = 0.0f32;
            for (color, distance) in sides {
                if let Some(c) = color {
                    let w = 1.0 / distance as f32;
                    for i in 0..3 {
                        sum[i] += c[i] * w;
                    }
                    total += w;
                }
            }
            filled.push((total > 0.0).then(|| sum.map(|s| s / total)));
        }
    }
    let width = rect.width();
    for (i, color) in filled.into_iter().enumerate() {
        if let Some(c) = color {
            let i = i as i32;
            write(image, rect.left + i % width, rect.top + i / width, c);
        }
    }
}

/// Blend the pixels of `source` into the place of `target` (same size).
///
/// Returns the blended colors for `target`, row-major. `base` is read only;
/// it supplies both the source pixels and the current destination content.
pub fn blend_patch(base: &RgbaImage, source: &Rect, target: &Rect) -> Vec<Rgb> {
    let (w, h) = (target.width() as usize, target.height() as usize);
    let (dx, dy) = (source.left - target.left, source.top - target.top);

    let mut raw = Vec::with_capacity(w * h);
    let mut dst = Vec::with_capacity(w * h);
    for y in target.top..target.bottom {
        for x in target.left..target.right {
            let d = read(base, x, y).unwrap_or([0.0; 3]);
            raw.push(read(base, x + dx, y + dy).unwrap_or(d));
            dst.push(d);
        }
    }

    let gx = |buf: &[Rgb], i: usize| -> Rgb {
        if i % w + 1 < w {
            std::array::from_fn(|c| buf[i + 1][c] - buf[i][c])
        } else {
            [0.0; 3]
        }
    };
    let gy = |buf: &[Rgb], i: usize| -> Rgb {
        if i / w + 1 < h {
            std::array::from_fn(|c| buf[i + w][c] - buf[i][c])
        } else {
            [0.0; 3]
        }
    };
    let magnitude = |g: &Rgb| g.iter().map(|v| v.abs()).sum::<f32>();
    let mix = |a: Rgb, b: Rgb| -> Rgb {
        let (wa, wb) = (magnitude(&a), magnitude(&b));
        if wa + wb < 1e-6 {
            return [0.0; 3];
        }
        std::array::from_fn(|c| (a[c] * wa + b[c] * wb) / (wa + wb))
    };

    let mut blended_x = Vec::with_capacity(w * h);
    let mut blended_y = Vec::with_capacity(w * h);
    for i in 0..w * h {
        blended_x.push(mix(gx(&raw, i), gx(&dst, i)));
        blended_y.push(mix(gy(&raw, i), gy(&dst, i)));
    }

    // Integrate rows from the destination's left column and columns from
    // its top row, then average the two reconstructions.
    let mut horizontal = dst.clone();
    for y in 0..h {
        for x in 1..w {
            let i = y * w + x;
            horizontal[i] = std::array::from_fn(|c| horizontal[i - 1][c] + blended_x[i - 1][c]);
        }
    }
    let mut vertical = dst;
    for y in 1..h {
        for x in 0..w {
            let i = y * w + x;
            vertical[i] = std::array::from_fn(|c| vertical[i - w][c] + blended_y[i - w][c]);
        }
    }

    let mut out = Vec::with_capacity(w * h);
    for (i, r) in raw.iter().enumerate() {
        let x = target.left + (i % w) as i32;
        let y = target.top + (i / w) as i32;
        let weight = radial_weight(target, x, y);
        out.push(std::array::from_fn(|c| {
            let recon = (horizontal[i][c] + vertical[i][c]) / 2.0;
            (r[c] * weight + recon * (1.0 - weight)).clamp(0.0, 255.0)
        }));
    }
    out
}

/// Weighted sum of overlapping patches over one region.
pub struct PatchAccumulator {
    region: Rect,
    sums: Vec<[f32; 4]>,
}

impl PatchAccumulator {
    pub fn new(region: Rect) -> Self {
        Self {
            region,
            sums: vec![[0.0; 4]; region.area() as usize],
        }
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    /// Add `colors` (row-major over `patch`) with radial feather weights.
    /// Pixels of `patch` outside the region are ignored.
    pub fn add(&mut self, patch: &Rect, colors: &[Rgb]) {
        let width = self.region.width();
        for (i, color) in colors.iter().enumerate() {
            let x = patch.left + (i as i32 % patch.width());
            let y = patch.top + (i as i32 / patch.width());
            if !self.region.contains(x, y) {
                continue;
            }
            let w = radial_weight(patch, x, y) + FEATHER_EPSILON;
            let idx = (y - self.region.top) * width + (x - self.region.left);
            let slot = &mut self.sums[idx as usize];
            for c in 0..3 {
                slot[c] += color[c] * w;
            }
            slot[3] += w;
        }
    }

    /// Write the weighted means into `image`. Pixels no patch touched keep
    /// their current value.
    pub fn resolve(&self, image: &mut RgbaImage) {
        let width = self.region.width();
        for (i, slot) in self.sums.iter().enumerate() {
            if slot[3] <= 0.0 {
                continue;
            }
            let x = self.region.left + i as i32 % width;
            let y = self.region.top + i as i32 / width;
            write(image, x, y, [slot[0] / slot[3], slot[1] / slot[3], slot[2] / slot[3]]);
        }
    }
}

/// Composite `healed` (whose top-left sits at `origin` in `out`) into `out`
/// as `out = out·(1−α) + healed·α` with α from `mask`.
///
/// Only pixels with non-zero mask coverage are written; the alpha channel of
/// `out` is preserved.
pub fn composite_masked(out: &mut RgbaImage, healed: &RgbaImage, origin: (i32, i32), mask: &Mask) {
    let area = Rect::from_xywh(origin.0, origin.1, healed.width() as i32, healed.height() as i32);
    let Some(region) = area
        .intersection(&mask.bounds())
        .and_then(|r| r.clip(out.width(), out.height()))
    else {
        return;
    };
    for y in region.top..region.bottom {
        for x in region.left..region.right {
            let alpha = mask.at(x, y);
            if alpha <= 0.0 {
                continue;
            }
            let src = *healed.get_pixel((x - origin.0) as u32, (y - origin.1) as u32);
            let dst = out.get_pixel_mut(x as u32, y as u32);
            if alpha >= 1.0 {
                dst[0] = src[0];
                dst[1] = src[1];
                dst[2] = src[2];
                continue;
            }
            for c in 0..3 {
                let v = dst[c] as f32 * (1.0 - alpha) + src[c] as f32 * alpha;
                dst[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
