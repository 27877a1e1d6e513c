//! Whole-region source search.
//!
//! Finds a same-sized rectangle elsewhere in the image whose content can
//! replace the target outright. The target is described by the band of
//! pixels around it (that is what the replacement must blend into), and
//! candidates are sampled on concentric rings around the target center:
//!
//! ```text
//!            .   .   .
//!        .   ┌───────┐   .     ring radius 2× … 4× the target's longer side
//!      .     │ target│     .   one candidate every `angle_step_degrees`
//!        .   └───────┘   .
//!            .   .   .
//! ```
//!
//! Each surviving candidate is scored as
//! `0.4 · similarity + 0.3 · distance + 0.3 · edge compatibility`, all in
//! [0, 1]. Scoring runs on the rayon pool; results are collected in
//! generation order and sorted with a total order, so output is
//! deterministic for fixed inputs.

use crate::config::DetectorConfig;
use crate::imaging::calculations::ring_candidates;
use crate::imaging::features::{
    self, TextureFeatures, color_similarity, direction_similarity, ratio_similarity,
};
use crate::types::{Rect, SourceCandidate};
use image::RgbaImage;
use rayon::prelude::*;
use tracing::{debug, trace};

const SIMILARITY_WEIGHT: f32 = 0.4;
const DISTANCE_WEIGHT: f32 = 0.3;
const EDGE_WEIGHT: f32 = 0.3;

/// Searches an image for source regions that can replace a target.
#[derive(Debug, Clone)]
pub struct SourceRegionDetector {
    config: DetectorConfig,
}

/// A scored candidate plus what breaks exact ties: interior complexity
/// first, then how well its local patterns match the target's border.
struct Scored {
    candidate: SourceCandidate,
    complexity_gap: f32,
    pattern_match: f32,
}

impl SourceRegionDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Best candidate scoring above `min_similarity`, if any.
    pub fn find_best(
        &self,
        image: &RgbaImage,
        target: &Rect,
        excluded: &[Rect],
    ) -> Option<SourceCandidate> {
        let best = self.find_candidates(image, target, excluded, 1).into_iter().next();
        match &best {
            Some(c) => debug!(source = %c.rect, score = c.score, "best source region"),
            None => debug!(target = %target, "no source region above threshold"),
        }
        best
    }

    /// Up to `max_count` candidates scoring above `min_similarity`, best first.
    pub fn find_candidates(
        &self,
        image: &RgbaImage,
        target: &Rect,
        excluded: &[Rect],
        max_count: usize,
    ) -> Vec<SourceCandidate> {
        if max_count == 0 || target.is_empty() {
            return Vec::new();
        }
        let rects = self.candidate_rects(image.dimensions(), target, excluded);
        let border = features::extract_border(image, target, self.config.border_width);
        let interior_complexity = features::extract(image, target).complexity();
        let optimal_distance = 2.0 * target.max_dim() as f32;
        debug!(
            target = %target,
            candidates = rects.len(),
            interior_complexity,
            "scoring source candidates"
        );

        let mut scored: Vec<Scored> = rects
            .par_iter()
            .map(|rect| {
                let candidate = features::extract(image, rect);
                let distance = rect.center_distance(target);
                let score = score_candidate(&border, &candidate, distance, optimal_distance);
                trace!(rect = %rect, score, "candidate scored");
                Scored {
                    candidate: SourceCandidate {
                        rect: *rect,
                        score,
                        distance,
                    },
                    complexity_gap: (candidate.complexity() - interior_complexity).abs(),
                    pattern_match: border.pattern_similarity(&candidate),
                }
            })
            .collect();

        scored.retain(|s| s.candidate.score > self.config.min_similarity);
        scored.sort_by(|a, b| {
            a.candidate
                .rank(&b.candidate)
                .then_with(|| a.complexity_gap.total_cmp(&b.complexity_gap))
                .then_with(|| b.pattern_match.total_cmp(&a.pattern_match))
        });
        scored
            .into_iter()
            .take(max_count)
            .map(|s| s.candidate)
            .collect()
    }

    /// Ring candidates that stay inside the image and clear the target and
    /// every excluded rect.
    pub fn candidate_rects(
        &self,
        image_size: (u32, u32),
        target: &Rect,
        excluded: &[Rect],
    ) -> Vec<Rect> {
        ring_candidates(target, self.config.ring_step, self.config.angle_step_degrees)
            .into_iter()
            .filter(|r| r.fits_within(image_size.0, image_size.1))
            .filter(|r| !r.intersects(target))
            .filter(|r| !excluded.iter().any(|e| r.intersects(e)))
            .collect()
    }
}

/// Distance preference: 1.0 at `optimal`, decaying on both sides.
pub fn distance_score(distance: f32, optimal: f32) -> f32 {
    if optimal <= 0.0 {
        return 0.0;
    }
    let x = (distance - optimal) / optimal;
    (-x * x).exp()
}

/// Color, variance and complexity agreement, averaged.
pub fn region_similarity(target: &TextureFeatures, candidate: &TextureFeatures) -> f32 {
    let color = color_similarity(&target.average_color, &candidate.average_color);
    let variance = ratio_similarity(target.color_variance, candidate.color_variance);
    let complexity = 1.0 - (target.complexity() - candidate.complexity()).abs();
    ((color + variance + complexity) / 3.0).clamp(0.0, 1.0)
}

fn score_candidate(
    target: &TextureFeatures,
    candidate: &TextureFeatures,
    distance: f32,
    optimal_distance: f32,
) -> f32 {
    let similarity = region_similarity(target, candidate);
    let proximity = distance_score(distance, optimal_distance);
    let edges = direction_similarity(target.dominant_direction, candidate.dominant_direction);
    (SIMILARITY_WEIGHT * similarity + DISTANCE_WEIGHT * proximity + EDGE_WEIGHT * edges)
        .clamp(0.0, 1.0)
}
