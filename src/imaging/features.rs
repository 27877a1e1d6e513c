//! Texture descriptors for regions of an image.
//!
//! Every similarity decision in the engine is made on these descriptors:
//! the source detector compares a target's border band against whole
//! candidate rects, and the synthesizer compares patches.
//!
//! Two ways to get them:
//!
//! - [`extract`] / [`extract_border`] compute a full [`TextureFeatures`]
//!   (including the 256-bin LBP histogram and dominant gradient direction)
//!   by walking the pixels. Cost is linear in the region size.
//! - [`FeatureIndex`] precomputes summed-area tables over a window once, after
//!   which [`FeatureIndex::summary`] answers "color/texture/gradient summary
//!   of this rect" in constant time. The synthesizer evaluates thousands of
//!   patch candidates per level and uses this path exclusively.
//!
//! Neighbourhood operators (Sobel, LBP, homogeneity pairs) read neighbours
//! from the whole image with clamped coordinates, so a region's descriptor
//! does not depend on where it sits relative to the region's own edges.

use crate::types::Rect;
use image::{Rgba, RgbaImage};
use std::f32::consts::PI;

/// Number of luminance histogram bins used for entropy, energy and homogeneity.
pub const LUMA_BINS: usize = 16;
/// Number of local-binary-pattern codes (8 neighbours).
pub const LBP_BINS: usize = 256;
/// Sobel magnitude above which a pixel counts as an edge.
pub const EDGE_THRESHOLD: f32 = 48.0;
/// Largest possible Euclidean distance between two 8-bit RGB colors.
pub const MAX_COLOR_DISTANCE: f32 = 441.672_96;

const DIRECTION_BINS: usize = 36;

/// Descriptor of one image region. Pure value, recomputed per region.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureFeatures {
    /// Mean R, G, B in 0..=255.
    pub average_color: [f32; 3],
    /// Per-channel variance, averaged over the three channels.
    pub color_variance: f32,
    /// Standard deviation of luminance.
    pub contrast: f32,
    /// Fraction of pixels whose Sobel magnitude exceeds [`EDGE_THRESHOLD`].
    pub edge_density: f32,
    /// Shannon entropy (bits) of the luminance histogram.
    pub entropy: f32,
    /// Mean Sobel magnitude.
    pub gradient_magnitude: f32,
    /// Sum of squared luminance-histogram probabilities (1.0 = flat region).
    pub texture_energy: f32,
    /// Mean `1 / (1 + |Δbin|)` over horizontal and vertical neighbour pairs.
    pub homogeneity: f32,
    /// Normalized LBP histogram, [`LBP_BINS`] entries summing to 1.
    pub lbp_histogram: Vec<f32>,
    /// Magnitude-weighted dominant gradient orientation in `[0, π)`.
    pub dominant_direction: f32,
}

impl TextureFeatures {
    /// Descriptor of an empty region: flat, edgeless, black.
    pub fn empty() -> Self {
        Self {
            average_color: [0.0; 3],
            color_variance: 0.0,
            contrast: 0.0,
            edge_density: 0.0,
            entropy: 0.0,
            gradient_magnitude: 0.0,
            texture_energy: 1.0,
            homogeneity: 1.0,
            lbp_histogram: vec![0.0; LBP_BINS],
            dominant_direction: 0.0,
        }
    }

    /// Single [0, 1] measure of how busy the region is.
    pub fn complexity(&self) -> f32 {
        let max_entropy = (LUMA_BINS as f32).log2();
        (0.5 * self.edge_density + 0.5 * (self.entropy / max_entropy)).clamp(0.0, 1.0)
    }

    /// Histogram-intersection similarity of the LBP histograms, in [0, 1].
    pub fn lbp_similarity(&self, other: &TextureFeatures) -> f32 {
        self.lbp_histogram
            .iter()
            .zip(&other.lbp_histogram)
            .map(|(a, b)| a.min(*b))
            .sum::<f32>()
            .clamp(0.0, 1.0)
    }

    /// Agreement of local micro-structure: LBP intersection and homogeneity,
    /// averaged.
    pub fn pattern_similarity(&self, other: &TextureFeatures) -> f32 {
        let homogeneity = ratio_similarity(self.homogeneity, other.homogeneity);
        (0.5 * self.lbp_similarity(other) + 0.5 * homogeneity).clamp(0.0, 1.0)
    }
}

// =============================================================================
// Similarity helpers
// =============================================================================

/// `1 - |a - b| / max(a, b)` for non-negative quantities; 1.0 when both are ~0.
pub fn ratio_similarity(a: f32, b: f32) -> f32 {
    let (a, b) = (a.max(0.0), b.max(0.0));
    let denom = a.max(b);
    if denom < 1e-6 {
        return 1.0;
    }
    (1.0 - (a - b).abs() / denom).clamp(0.0, 1.0)
}

/// Normalized inverse Euclidean distance between two RGB means.
pub fn color_similarity(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let d = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();
    (1.0 - d / MAX_COLOR_DISTANCE).clamp(0.0, 1.0)
}

/// `1 - circular_distance / (π/2)` for orientations wrapped at π.
pub fn direction_similarity(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs().rem_euclid(PI);
    let circular = diff.min(PI - diff);
    (1.0 - circular / (PI / 2.0)).clamp(0.0, 1.0)
}

// =============================================================================
// Per-pixel operators
// =============================================================================

#[inline]
pub fn luma(p: &Rgba<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

#[inline]
fn luma_bin(l: f32) -> usize {
    ((l / 256.0 * LUMA_BINS as f32) as usize).min(LUMA_BINS - 1)
}

#[inline]
fn clamped<'a>(image: &'a RgbaImage, x: i32, y: i32) -> &'a Rgba<u8> {
    let cx = x.clamp(0, image.width() as i32 - 1) as u32;
    let cy = y.clamp(0, image.height() as i32 - 1) as u32;
    image.get_pixel(cx, cy)
}

#[inline]
fn luma_at(image: &RgbaImage, x: i32, y: i32) -> f32 {
    luma(clamped(image, x, y))
}

/// Sobel gradient of luminance at (x, y).
pub fn sobel(image: &RgbaImage, x: i32, y: i32) -> (f32, f32) {
    let l = |dx: i32, dy: i32| luma_at(image, x + dx, y + dy);
    // Each side summed separately so flat regions cancel to exactly zero.
    let gx = (l(1, -1) + 2.0 * l(1, 0) + l(1, 1)) - (l(-1, -1) + 2.0 * l(-1, 0) + l(-1, 1));
    let gy = (l(-1, 1) + 2.0 * l(0, 1) + l(1, 1)) - (l(-1, -1) + 2.0 * l(0, -1) + l(1, -1));
    (gx, gy)
}

/// 8-neighbour local binary pattern code at (x, y).
pub fn lbp_code(image: &RgbaImage, x: i32, y: i32) -> u8 {
    const NEIGHBOURS: [(i32, i32); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
    ];
    let center = luma_at(image, x, y);
    NEIGHBOURS
        .iter()
        .enumerate()
        .fold(0u8, |code, (bit, &(dx, dy))| {
            if luma_at(image, x + dx, y + dy) >= center {
                code | (1 << bit)
            } else {
                code
            }
        })
}

// =============================================================================
// Full extraction
// =============================================================================

struct Accumulator {
    n: f64,
    sum: [f64; 3],
    sum_sq: [f64; 3],
    luma_sum: f64,
    luma_sq: f64,
    edges: f64,
    gradient: f64,
    luma_bins: [u32; LUMA_BINS],
    lbp: Vec<u32>,
    homogeneity: f64,
    pairs: f64,
    directions: [f64; DIRECTION_BINS],
}

impl Accumulator {
    fn new() -> Self {
        Self {
            n: 0.0,
            sum: [0.0; 3],
            sum_sq: [0.0; 3],
            luma_sum: 0.0,
            luma_sq: 0.0,
            edges: 0.0,
            gradient: 0.0,
            luma_bins: [0; LUMA_BINS],
            lbp: vec![0; LBP_BINS],
            homogeneity: 0.0,
            pairs: 0.0,
            directions: [0.0; DIRECTION_BINS],
        }
    }

    fn add(&mut self, image: &RgbaImage, x: i32, y: i32) {
        let p = clamped(image, x, y);
        let l = luma(p);
        self.n += 1.0;
        for c in 0..3 {
            let v = p[c] as f64;
            self.sum[c] += v;
            self.sum_sq[c] += v * v;
        }
        self.luma_sum += l as f64;
        self.luma_sq += (l * l) as f64;
        self.luma_bins[luma_bin(l)] += 1;

        let (gx, gy) = sobel(image, x, y);
        let magnitude = (gx * gx + gy * gy).sqrt();
        self.gradient += magnitude as f64;
        if magnitude > EDGE_THRESHOLD {
            self.edges += 1.0;
        }
        if magnitude > 1e-3 {
            let orientation = gy.atan2(gx).rem_euclid(PI);
            let bin = ((orientation / PI * DIRECTION_BINS as f32) as usize).min(DIRECTION_BINS - 1);
            self.directions[bin] += magnitude as f64;
        }

        self.lbp[lbp_code(image, x, y) as usize] += 1;

        let bin = luma_bin(l) as i32;
        for (dx, dy) in [(1, 0), (0, 1)] {
            let other = luma_bin(luma_at(image, x + dx, y + dy)) as i32;
            self.homogeneity += 1.0 / (1.0 + (bin - other).abs() as f64);
            self.pairs += 1.0;
        }
    }

    fn finish(self) -> TextureFeatures {
        if self.n == 0.0 {
            return TextureFeatures::empty();
        }
        let n = self.n;
        let mean = [self.sum[0] / n, self.sum[1] / n, self.sum[2] / n];
        let variance = (0..3)
            .map(|c| (self.sum_sq[c] / n - mean[c] * mean[c]).max(0.0))
            .sum::<f64>()
            / 3.0;
        let luma_mean = self.luma_sum / n;
        let contrast = (self.luma_sq / n - luma_mean * luma_mean).max(0.0).sqrt();
        let (entropy, energy) =
            histogram_entropy_energy(self.luma_bins.iter().map(|&c| c as f64), n);

        let dominant_direction = self
            .directions
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| (i as f32 + 0.5) * PI / DIRECTION_BINS as f32)
            .unwrap_or(0.0);

        TextureFeatures {
            average_color: [mean[0] as f32, mean[1] as f32, mean[2] as f32],
            color_variance: variance as f32,
            contrast: contrast as f32,
            edge_density: (self.edges / n) as f32,
            entropy,
            gradient_magnitude: (self.gradient / n) as f32,
            texture_energy: energy,
            homogeneity: if self.pairs > 0.0 {
                (self.homogeneity / self.pairs) as f32
            } else {
                1.0
            },
            lbp_histogram: self.lbp.iter().map(|&c| (c as f64 / n) as f32).collect(),
            dominant_direction,
        }
    }
}

/// Entropy (bits) and energy of a histogram with `total` samples.
fn histogram_entropy_energy(counts: impl Iterator<Item = f64>, total: f64) -> (f32, f32) {
    if total <= 0.0 {
        return (0.0, 1.0);
    }
    let mut entropy = 0.0;
    let mut energy = 0.0;
    for count in counts {
        if count <= 0.0 {
            continue;
        }
        let p = count / total;
        entropy -= p * p.log2();
        energy += p * p;
    }
    (entropy.max(0.0) as f32, energy.clamp(0.0, 1.0) as f32)
}

/// Features over an arbitrary set of pixel coordinates.
pub fn extract_pixels(
    image: &RgbaImage,
    pixels: impl IntoIterator<Item = (i32, i32)>,
) -> TextureFeatures {
    let mut acc = Accumulator::new();
    for (x, y) in pixels {
        acc.add(image, x, y);
    }
    acc.finish()
}

/// Features of `rect`, clipped to the image.
pub fn extract(image: &RgbaImage, rect: &Rect) -> TextureFeatures {
    let Some(r) = rect.clip(image.width(), image.height()) else {
        return TextureFeatures::empty();
    };
    extract_pixels(
        image,
        (r.top..r.bottom).flat_map(move |y| (r.left..r.right).map(move |x| (x, y))),
    )
}

/// Features of the band of `band` pixels surrounding `rect` (rect excluded).
///
/// This is what a replacement has to agree with at the seam. Parts of the
/// band outside the image are skipped.
pub fn extract_border(image: &RgbaImage, rect: &Rect, band: u32) -> TextureFeatures {
    let Some(outer) = rect.expand(band as i32).clip(image.width(), image.height()) else {
        return TextureFeatures::empty();
    };
    let inner = *rect;
    extract_pixels(
        image,
        (outer.top..outer.bottom)
            .flat_map(move |y| (outer.left..outer.right).map(move |x| (x, y)))
            .filter(move |&(x, y)| !inner.contains(x, y)),
    )
}

// =============================================================================
// Summed-area index for constant-time patch summaries
// =============================================================================

const PLANE_R: usize = 0;
const PLANE_G: usize = 1;
const PLANE_B: usize = 2;
const PLANE_SQ: usize = 3;
const PLANE_LUMA: usize = 4;
const PLANE_LUMA_SQ: usize = 5;
const PLANE_EDGE: usize = 6;
const PLANE_GRADIENT: usize = 7;
const PLANES: usize = 8;

/// Additive sums over a region; subtract two to get a ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSums {
    pub count: f64,
    values: [f64; PLANES],
    bins: [f64; LUMA_BINS],
}

impl RegionSums {
    pub fn minus(&self, other: &RegionSums) -> RegionSums {
        let mut out = *self;
        out.count -= other.count;
        for i in 0..PLANES {
            out.values[i] -= other.values[i];
        }
        for i in 0..LUMA_BINS {
            out.bins[i] -= other.bins[i];
        }
        out
    }

    pub fn summary(&self) -> PatchSummary {
        let n = self.count;
        if n < 0.5 {
            return PatchSummary::flat([0.0; 3]);
        }
        let mean = [
            self.values[PLANE_R] / n,
            self.values[PLANE_G] / n,
            self.values[PLANE_B] / n,
        ];
        let mean_sq = mean.iter().map(|m| m * m).sum::<f64>();
        let variance = ((self.values[PLANE_SQ] / n - mean_sq) / 3.0).max(0.0);
        let luma_mean = self.values[PLANE_LUMA] / n;
        let contrast = (self.values[PLANE_LUMA_SQ] / n - luma_mean * luma_mean)
            .max(0.0)
            .sqrt();
        let (entropy, energy) = histogram_entropy_energy(self.bins.iter().copied(), n);
        PatchSummary {
            mean_color: [mean[0] as f32, mean[1] as f32, mean[2] as f32],
            variance: variance as f32,
            contrast: contrast as f32,
            entropy,
            edge_density: (self.values[PLANE_EDGE] / n).clamp(0.0, 1.0) as f32,
            energy,
            gradient: (self.values[PLANE_GRADIENT] / n).max(0.0) as f32,
        }
    }
}

/// Compact descriptor used for patch matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchSummary {
    pub mean_color: [f32; 3],
    pub variance: f32,
    pub contrast: f32,
    pub entropy: f32,
    pub edge_density: f32,
    pub energy: f32,
    pub gradient: f32,
}

impl PatchSummary {
    pub fn flat(color: [f32; 3]) -> Self {
        Self {
            mean_color: color,
            variance: 0.0,
            contrast: 0.0,
            entropy: 0.0,
            edge_density: 0.0,
            energy: 1.0,
            gradient: 0.0,
        }
    }

    /// Average of the four texture similarities: contrast, entropy, edge
    /// density and energy.
    pub fn texture_similarity(&self, other: &PatchSummary) -> f32 {
        (ratio_similarity(self.contrast, other.contrast)
            + ratio_similarity(self.entropy, other.entropy)
            + ratio_similarity(self.edge_density, other.edge_density)
            + ratio_similarity(self.energy, other.energy))
            / 4.0
    }
}

impl From<&TextureFeatures> for PatchSummary {
    fn from(f: &TextureFeatures) -> Self {
        Self {
            mean_color: f.average_color,
            variance: f.color_variance,
            contrast: f.contrast,
            entropy: f.entropy,
            edge_density: f.edge_density,
            energy: f.texture_energy,
            gradient: f.gradient_magnitude,
        }
    }
}

/// Summed-area tables over a window of an image.
pub struct FeatureIndex {
    window: Rect,
    stride: usize,
    planes: Vec<Vec<f64>>,
    bins: Vec<Vec<u32>>,
}

impl FeatureIndex {
    /// Build tables for `window` (clipped to the image).
    pub fn new(image: &RgbaImage, window: &Rect) -> Self {
        let window = window
            .clip(image.width(), image.height())
            .unwrap_or(Rect::new(0, 0, 0, 0));
        let (w, h) = (window.width() as usize, window.height() as usize);
        let stride = w + 1;
        let len = stride * (h + 1);
        let mut planes = vec![vec![0.0f64; len]; PLANES];
        let mut bins = vec![vec![0u32; len]; LUMA_BINS];

        let mut row = [0.0f64; PLANES];
        let mut row_bins = [0u32; LUMA_BINS];
        for y in 0..h {
            row.fill(0.0);
            row_bins.fill(0);
            let iy = window.top + y as i32;
            for x in 0..w {
                let ix = window.left + x as i32;
                let p = clamped(image, ix, iy);
                let l = luma(p);
                let (gx, gy) = sobel(image, ix, iy);
                let magnitude = (gx * gx + gy * gy).sqrt();
                let (r, g, b) = (p[0] as f64, p[1] as f64, p[2] as f64);

                row[PLANE_R] += r;
                row[PLANE_G] += g;
                row[PLANE_B] += b;
                row[PLANE_SQ] += r * r + g * g + b * b;
                row[PLANE_LUMA] += l as f64;
                row[PLANE_LUMA_SQ] += (l * l) as f64;
                row[PLANE_EDGE] += if magnitude > EDGE_THRESHOLD { 1.0 } else { 0.0 };
                row[PLANE_GRADIENT] += magnitude as f64;
                row_bins[luma_bin(l)] += 1;

                let idx = (y + 1) * stride + (x + 1);
                let above = y * stride + (x + 1);
                for (plane, running) in planes.iter_mut().zip(row.iter()) {
                    plane[idx] = plane[above] + running;
                }
                for (plane, running) in bins.iter_mut().zip(row_bins.iter()) {
                    plane[idx] = plane[above] + running;
                }
            }
        }

        Self {
            window,
            stride,
            planes,
            bins,
        }
    }

    pub fn window(&self) -> Rect {
        self.window
    }

    /// Additive sums over `rect` ∩ window.
    pub fn sums(&self, rect: &Rect) -> RegionSums {
        let Some(r) = rect.intersection(&self.window) else {
            return RegionSums {
                count: 0.0,
                values: [0.0; PLANES],
                bins: [0.0; LUMA_BINS],
            };
        };
        let x0 = (r.left - self.window.left) as usize;
        let y0 = (r.top - self.window.top) as usize;
        let x1 = (r.right - self.window.left) as usize;
        let y1 = (r.bottom - self.window.top) as usize;
        let (a, b, c, d) = (
            y0 * self.stride + x0,
            y0 * self.stride + x1,
            y1 * self.stride + x0,
            y1 * self.stride + x1,
        );

        let mut values = [0.0; PLANES];
        for (v, plane) in values.iter_mut().zip(&self.planes) {
            *v = plane[d] - plane[b] - plane[c] + plane[a];
        }
        let mut bins = [0.0; LUMA_BINS];
        for (v, plane) in bins.iter_mut().zip(&self.bins) {
            *v = (plane[d] as f64) - (plane[b] as f64) - (plane[c] as f64) + (plane[a] as f64);
        }
        RegionSums {
            count: r.area() as f64,
            values,
            bins,
        }
    }

    pub fn summary(&self, rect: &Rect) -> PatchSummary {
        self.sums(rect).summary()
    }

    /// Summary of the `band`-pixel ring around `rect`, excluding `rect`.
    pub fn ring_summary(&self, rect: &Rect, band: u32) -> PatchSummary {
        self.sums(&rect.expand(band as i32))
            .minus(&self.sums(rect))
            .summary()
    }
}
