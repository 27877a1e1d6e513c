//! Multi-scale patch synthesis.
//!
//! Fills a target area of a working image with texture taken from around it.
//! The target is worked coarse to fine; every level:
//!
//! 1. tiles the target into overlapping patches (row-major, clipped),
//! 2. searches a spiral of same-sized source positions around each patch,
//!    scoring `0.3 · color + 0.4 · texture + 0.3 · gradient`,
//! 3. blends each winner into place ([`blend_patch`]) and merges the
//!    overlapping results with radial feathering.
//!
//! Each level reads the previous level's output as its base, so the coarse
//! structure settles first and finer levels only refine it.
//!
//! Candidates must lie inside the image and must not overlap the area being
//! healed (the mask bounds), since those pixels are not real content. A
//! patch deep inside a large target would find nothing within the tier's
//! search radius, so each patch's radius is extended by its distance to the
//! nearest edge of that area.

use crate::config::SynthesisConfig;
use crate::imaging::blend::{PatchAccumulator, blend_patch, fill_from_border};
use crate::imaging::calculations::{patch_grid, patch_overlap, spiral_offsets};
use crate::imaging::features::{
    FeatureIndex, PatchSummary, color_similarity, extract_border, ratio_similarity,
};
use crate::imaging::mask::Mask;
use crate::imaging::operations::try_clone_image;
use crate::imaging::{BackendError, TierParams};
use crate::types::Rect;
use image::RgbaImage;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

const COLOR_WEIGHT: f32 = 0.3;
const TEXTURE_WEIGHT: f32 = 0.4;
const GRADIENT_WEIGHT: f32 = 0.3;

/// Width of the context band compared around each patch.
const CONTEXT_BAND: u32 = 2;

/// Spiral positions generated per allowed candidate; most positions of the
/// inner turns land on the healed area and are skipped.
const SPIRAL_OVERSAMPLE: usize = 4;

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("target area {0} is empty")]
    EmptyTarget(Rect),
    #[error("target area {0} lies outside the {1}x{2} image")]
    OutsideImage(Rect, u32, u32),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// One placed patch: where it came from, where it went, how well it matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TexturePatch {
    pub source: Rect,
    pub target: Rect,
    pub similarity: f32,
    #[serde(skip)]
    pub features: PatchSummary,
}

/// Per-level summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LevelReport {
    pub patch_size: u32,
    pub patches: Vec<TexturePatch>,
    /// Patches whose best candidate scored below the threshold.
    pub fallbacks: usize,
    /// Patches with no admissible candidate; they keep the base content.
    pub unfilled: usize,
}

impl LevelReport {
    pub fn mean_similarity(&self) -> f32 {
        if self.patches.is_empty() {
            return 0.0;
        }
        self.patches.iter().map(|p| p.similarity).sum::<f32>() / self.patches.len() as f32
    }
}

/// What one synthesis call did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SynthesisReport {
    pub levels: Vec<LevelReport>,
}

impl SynthesisReport {
    /// Mean similarity of the finest level, the one that set the final pixels.
    pub fn mean_similarity(&self) -> f32 {
        self.levels.last().map(LevelReport::mean_similarity).unwrap_or(0.0)
    }

    pub fn fallbacks(&self) -> usize {
        self.levels.iter().map(|l| l.fallbacks).sum()
    }

    pub fn unfilled(&self) -> usize {
        self.levels.iter().map(|l| l.unfilled).sum()
    }

    pub fn patch_count(&self) -> usize {
        self.levels.iter().map(|l| l.patches.len()).sum()
    }

    /// Fold another report (e.g. from the next batch) into this one,
    /// level by level.
    pub fn absorb(&mut self, other: SynthesisReport) {
        for (i, level) in other.levels.into_iter().enumerate() {
            match self.levels.get_mut(i) {
                Some(mine) => {
                    mine.patches.extend(level.patches);
                    mine.fallbacks += level.fallbacks;
                    mine.unfilled += level.unfilled;
                }
                None => self.levels.push(level),
            }
        }
    }
}

/// Patch-based texture synthesizer for one tier.
#[derive(Debug, Clone)]
pub struct TextureSynthesizer {
    config: SynthesisConfig,
    params: TierParams,
}

struct Match {
    source: Rect,
    score: f32,
    features: PatchSummary,
}

impl TextureSynthesizer {
    pub fn new(config: &SynthesisConfig, params: TierParams) -> Self {
        Self {
            config: config.clone(),
            params,
        }
    }

    /// Prefill `target` from its border, then synthesize it.
    pub fn synthesize(
        &self,
        image: &mut RgbaImage,
        target: &Rect,
        mask: &Mask,
    ) -> Result<SynthesisReport, SynthesisError> {
        self.check_target(image, target)?;
        fill_from_border(image, &mask.bounds());
        self.refine(image, target, mask)
    }

    /// Synthesize `target` treating its current content as the base.
    ///
    /// Used directly when the caller already prefilled a larger area and
    /// heals it batch by batch.
    pub fn refine(
        &self,
        image: &mut RgbaImage,
        target: &Rect,
        mask: &Mask,
    ) -> Result<SynthesisReport, SynthesisError> {
        self.check_target(image, target)?;
        let healing_area = mask.bounds();
        // The area's surroundings stand in for texture at the coarsest
        // level, where the interior is still the smooth prefill.
        let surroundings = PatchSummary::from(&extract_border(image, &healing_area, CONTEXT_BAND));

        let mut report = SynthesisReport::default();
        let sizes = self.params.level_patch_sizes(self.config.min_patch_size);
        for (level, &patch_size) in sizes.iter().enumerate() {
            let texture_reference = (level == 0).then_some(&surroundings);
            let level_report =
                self.run_level(image, target, mask, &healing_area, patch_size, texture_reference)?;
            debug!(
                level,
                patch_size,
                patches = level_report.patches.len(),
                fallbacks = level_report.fallbacks,
                unfilled = level_report.unfilled,
                similarity = level_report.mean_similarity(),
                "synthesis level done"
            );
            report.levels.push(level_report);
        }
        Ok(report)
    }

    fn check_target(&self, image: &RgbaImage, target: &Rect) -> Result<(), SynthesisError> {
        if target.is_empty() {
            return Err(SynthesisError::EmptyTarget(*target));
        }
        if !target.fits_within(image.width(), image.height()) {
            return Err(SynthesisError::OutsideImage(
                *target,
                image.width(),
                image.height(),
            ));
        }
        Ok(())
    }

    fn run_level(
        &self,
        image: &mut RgbaImage,
        target: &Rect,
        mask: &Mask,
        healing_area: &Rect,
        patch_size: u32,
        texture_reference: Option<&PatchSummary>,
    ) -> Result<LevelReport, SynthesisError> {
        let overlap = patch_overlap(patch_size, self.config.overlap);
        let patches: Vec<Rect> = patch_grid(target, patch_size, overlap)
            .into_iter()
            .filter(|p| mask.touches(p))
            .collect();

        let radii: Vec<f32> = patches
            .iter()
            .map(|p| self.params.search_radius as f32 + escape_distance(p, healing_area) as f32)
            .collect();
        let window = patches
            .iter()
            .zip(&radii)
            .map(|(p, r)| p.expand(r.ceil() as i32 + CONTEXT_BAND as i32 + 1))
            .reduce(|a, b| a.union(&b))
            .unwrap_or(*target);

        let base = try_clone_image(image)?;
        let index = FeatureIndex::new(&base, &window);
        let (width, height) = base.dimensions();

        let matches: Vec<Option<Match>> = patches
            .par_iter()
            .zip(radii.par_iter())
            .map(|(patch, &radius)| {
                self.best_match(
                    &index,
                    (width, height),
                    patch,
                    healing_area,
                    radius,
                    texture_reference,
                )
            })
            .collect();

        let mut report = LevelReport {
            patch_size,
            ..LevelReport::default()
        };
        let mut accumulator = PatchAccumulator::new(*target);
        for (patch, found) in patches.iter().zip(matches) {
            let Some(m) = found else {
                report.unfilled += 1;
                trace!(patch = %patch, "no admissible source; keeping base");
                continue;
            };
            if m.score < self.config.similarity_threshold {
                report.fallbacks += 1;
            }
            accumulator.add(patch, &blend_patch(&base, &m.source, patch));
            report.patches.push(TexturePatch {
                source: m.source,
                target: *patch,
                similarity: m.score,
                features: m.features,
            });
        }
        accumulator.resolve(image);
        Ok(report)
    }

    fn best_match(
        &self,
        index: &FeatureIndex,
        image_size: (u32, u32),
        patch: &Rect,
        healing_area: &Rect,
        radius: f32,
        texture_reference: Option<&PatchSummary>,
    ) -> Option<Match> {
        let context = index.summary(&patch.expand(CONTEXT_BAND as i32));
        let border = index.ring_summary(patch, CONTEXT_BAND);
        let texture_target = texture_reference.unwrap_or(&context);
        let min_radius = escape_distance(patch, healing_area) as f32;
        let limit = self.params.max_candidates as usize;

        let mut best: Option<Match> = None;
        for (dx, dy) in spiral_offsets(min_radius, radius, limit * SPIRAL_OVERSAMPLE)
            .into_iter()
            .filter(|&(dx, dy)| {
                let source = patch.translate(dx, dy);
                source.fits_within(image_size.0, image_size.1) && !source.intersects(healing_area)
            })
            .take(limit)
        {
            let source = patch.translate(dx, dy);
            let candidate = index.summary(&source.expand(CONTEXT_BAND as i32));
            let pixels = index.summary(&source);
            let score = score_patch(&context, texture_target, &border, &candidate, &pixels);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Match {
                    source,
                    score,
                    features: pixels,
                });
            }
        }
        best
    }
}

/// How far `patch` must move to clear `area`; zero when already clear.
pub fn escape_distance(patch: &Rect, area: &Rect) -> i32 {
    if !patch.intersects(area) {
        return 0;
    }
    [
        patch.right - area.left,
        area.right - patch.left,
        patch.bottom - area.top,
        area.bottom - patch.top,
    ]
    .into_iter()
    .min()
    .unwrap_or(0)
    .max(0)
}

/// `0.3 · color + 0.4 · texture + 0.3 · gradient`, in [0, 1].
fn score_patch(
    context: &PatchSummary,
    texture_target: &PatchSummary,
    border: &PatchSummary,
    candidate: &PatchSummary,
    candidate_pixels: &PatchSummary,
) -> f32 {
    let color = color_similarity(&context.mean_color, &candidate.mean_color);
    let texture = texture_target.texture_similarity(candidate);
    let gradient = ratio_similarity(border.gradient, candidate_pixels.gradient);
    (COLOR_WEIGHT * color + TEXTURE_WEIGHT * texture + GRADIENT_WEIGHT * gradient).clamp(0.0, 1.0)
}
