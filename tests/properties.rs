//! Property tests for validation, candidate search, scoring, and tiling.

use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use simple_heal::config::{DetectorConfig, LimitsConfig};
use simple_heal::detect::SourceRegionDetector;
use simple_heal::imaging::calculations::{batch_grid, patch_grid, patch_overlap};
use simple_heal::types::Rect;
use simple_heal::validate::AreaValidator;

const MAX_AREA: u64 = 262_144;

fn validator() -> AreaValidator {
    AreaValidator::new(&LimitsConfig::default())
}

fn textured(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = ((x * 7 + y * 13) % 64) as u8;
        Rgba([90 + v, 120 - v / 2, 60 + (y % 32) as u8, 255])
    })
}

/// A rect inside a `width × height` image.
fn inner_rect(width: i32, height: i32) -> impl Strategy<Value = Rect> {
    (0..width - 1, 0..height - 1).prop_flat_map(move |(left, top)| {
        (1..=width - left, 1..=height - top)
            .prop_map(move |(w, h)| Rect::from_xywh(left, top, w, h))
    })
}

/// A rect inside a `width × height` image with both sides at most `max_side`.
fn bounded_rect(width: i32, height: i32, max_side: i32) -> impl Strategy<Value = Rect> {
    (1..=max_side, 1..=max_side).prop_flat_map(move |(w, h)| {
        (0..=width - w, 0..=height - h)
            .prop_map(move |(left, top)| Rect::from_xywh(left, top, w, h))
    })
}

proptest! {
    #[test]
    fn small_rects_inside_the_image_are_valid(rect in bounded_rect(1200, 1200, 512)) {
        prop_assert!(rect.area() <= MAX_AREA);
        prop_assert!(validator().validate((1200, 1200), &rect).is_valid());
    }

    #[test]
    fn large_rects_are_invalid_and_name_the_limit(
        w in 513i32..1500,
        h in 513i32..1500,
        left in 0i32..100,
        top in 0i32..100,
    ) {
        let rect = Rect::from_xywh(left, top, w, h);
        let validation = validator().validate((2000, 2000), &rect);
        prop_assert!(!validation.is_valid());
        prop_assert!(validation.message.contains("262144"), "{}", validation.message);
    }

    #[test]
    fn candidates_avoid_target_and_exclusions(
        target in bounded_rect(600, 600, 120),
        excluded in proptest::collection::vec(inner_rect(600, 600), 0..4),
    ) {
        let detector = SourceRegionDetector::new(&DetectorConfig::default());
        for rect in detector.candidate_rects((600, 600), &target, &excluded) {
            prop_assert!(!rect.intersects(&target));
            prop_assert!(excluded.iter().all(|e| !rect.intersects(e)));
            prop_assert!(rect.fits_within(600, 600));
            prop_assert_eq!((rect.width(), rect.height()), (target.width(), target.height()));
        }
    }

    #[test]
    fn patch_grid_covers_the_target(
        target in bounded_rect(300, 300, 140),
        patch in 4u32..48,
    ) {
        let overlap = patch_overlap(patch, 0.25);
        let patches = patch_grid(&target, patch, overlap);
        for p in &patches {
            prop_assert!(p.intersection(&target) == Some(*p), "{} escapes {}", p, target);
        }
        for y in target.top..target.bottom {
            for x in target.left..target.right {
                prop_assert!(patches.iter().any(|p| p.contains(x, y)), "({}, {}) uncovered", x, y);
            }
        }
    }

    #[test]
    fn batch_grid_partitions_the_target(
        target in inner_rect(400, 400),
        batch in 32u32..200,
    ) {
        let batches = batch_grid(&target, batch);
        let covered: u64 = batches.iter().map(Rect::area).sum();
        prop_assert_eq!(covered, target.area());
        for (i, a) in batches.iter().enumerate() {
            prop_assert!(a.intersection(&target) == Some(*a));
            for b in &batches[i + 1..] {
                prop_assert!(!a.intersects(b));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn detector_scores_stay_in_unit_range(
        left in 40i32..200,
        top in 40i32..200,
        size in 8i32..40,
    ) {
        let image = textured(320, 320);
        let target = Rect::from_xywh(left, top, size, size);
        let detector = SourceRegionDetector::new(&DetectorConfig {
            min_similarity: 0.0,
            ..DetectorConfig::default()
        });
        let candidates = detector.find_candidates(&image, &target, &[], 64);
        for c in &candidates {
            prop_assert!((0.0..=1.0).contains(&c.score), "score {}", c.score);
        }
        for pair in candidates.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}
