//! End-to-end healing scenarios through the public API.
//!
//! Images are generated in memory; nothing touches the filesystem except the
//! stroke-file test, which uses a temp dir.

use image::{Rgba, RgbaImage};
use simple_heal::config::HealConfig;
use simple_heal::heal::{HealError, HealEvent, HealOutcome, HealRequest, Healer};
use simple_heal::imaging::{QualityTier, RustBackend};
use simple_heal::types::{Rect, RegionOrigin, Stroke};
use simple_heal::validate::{AreaStatus, AreaValidator};
use std::sync::atomic::{AtomicUsize, Ordering};

fn uniform(width: u32, height: u32, color: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([color[0], color[1], color[2], 255]))
}

/// Smooth diagonal ramp with a mild periodic ripple.
fn scene(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let ripple = ((x / 6 + y / 9) % 4) as u8 * 6;
        Rgba([
            (60 + (x * 100 / width) as u8).saturating_add(ripple),
            (80 + (y * 80 / height) as u8).saturating_add(ripple),
            120,
            255,
        ])
    })
}

fn paint(image: &mut RgbaImage, rect: &Rect, color: [u8; 3]) {
    for y in rect.top..rect.bottom {
        for x in rect.left..rect.right {
            image.put_pixel(x as u32, y as u32, Rgba([color[0], color[1], color[2], 255]));
        }
    }
}

fn region_bytes(image: &RgbaImage, rect: &Rect) -> Vec<u8> {
    let mut bytes = Vec::new();
    for y in rect.top..rect.bottom {
        for x in rect.left..rect.right {
            bytes.extend_from_slice(&image.get_pixel(x as u32, y as u32).0);
        }
    }
    bytes
}

fn assert_unchanged_outside(before: &RgbaImage, after: &RgbaImage, rect: &Rect) {
    assert_eq!(before.dimensions(), after.dimensions());
    for (x, y, p) in before.enumerate_pixels() {
        if !rect.contains(x as i32, y as i32) {
            assert_eq!(p, after.get_pixel(x, y), "pixel ({x},{y}) changed");
        }
    }
}

fn never() -> impl Fn() -> bool + Sync {
    || false
}

// =========================================================================
// Scenario A: uniform background
// =========================================================================

#[test]
fn uniform_blue_heals_to_uniform_blue() {
    let image = uniform(512, 512, [0, 0, 255]);
    let target = Rect::new(100, 100, 164, 164);

    let result = simple_heal::heal(&image, &HealRequest::rect(target))
        .unwrap()
        .healed()
        .unwrap();

    for y in target.top..target.bottom {
        for x in target.left..target.right {
            assert_eq!(result.image.get_pixel(x as u32, y as u32), &Rgba([0, 0, 255, 255]));
        }
    }
    assert!(result.region.confidence > 0.99, "{}", result.region.confidence);
    assert!(result.success);
    assert_eq!(result.region.target, target);
}

// =========================================================================
// Scenario B: oversized target
// =========================================================================

#[test]
fn oversized_target_is_rejected_untouched() {
    let image = scene(1024, 1024);
    let before = image.clone();
    let request = HealRequest::rect(Rect::new(10, 10, 610, 610));
    let err = simple_heal::heal(&image, &request).unwrap_err();

    match err {
        HealError::Validation { message } => {
            assert!(message.contains("262144"), "{message}")
        }
        other => panic!("expected a validation failure, got {other}"),
    }
    assert_eq!(image, before);
}

// =========================================================================
// Scenario C: cancellation between batches
// =========================================================================

#[test]
fn cancellation_after_first_batch_keeps_exact_undo() {
    let mut config = HealConfig::default();
    config.limits.max_area = 20_000;
    config.tiers.medium.batch_size = 64;
    let healer = Healer::new(config, RustBackend::new());

    let image = scene(320, 320);
    let target = Rect::new(96, 96, 224, 224);
    let calls = AtomicUsize::new(0);
    let cancel = || calls.fetch_add(1, Ordering::SeqCst) >= 1;

    let outcome = healer
        .heal(&image, &HealRequest::rect(target), &cancel, None)
        .unwrap();
    assert!(outcome.is_cancelled());
    let HealOutcome::Cancelled(cancelled) = outcome else {
        unreachable!()
    };
    assert_eq!(cancelled.completed_batches, 1);
    assert_eq!(cancelled.total_batches, 4);

    // Whatever a caller did to the first batch's area, the snapshot puts
    // the original back byte for byte.
    let mut edited = image.clone();
    paint(&mut edited, &Rect::new(96, 96, 160, 160), [255, 0, 255]);
    cancelled.undo.restore(&mut edited).unwrap();
    assert_eq!(edited, image);
}

// =========================================================================
// Scenario D: target at the image edge
// =========================================================================

#[test]
fn target_at_left_edge_is_valid_with_warning() {
    let target = Rect::new(4, 200, 68, 264);
    let validation = AreaValidator::default().validate((512, 512), &target);
    assert_eq!(validation.status, AreaStatus::NearEdge);
    assert!(validation.is_valid());
    assert!(validation.warning().is_some());

    let image = scene(512, 512);
    let healer = Healer::new(HealConfig::default(), RustBackend::new());
    let (tx, rx) = std::sync::mpsc::channel();
    let outcome = healer
        .heal(&image, &HealRequest::rect(target), &never(), Some(tx))
        .unwrap();
    assert!(!outcome.is_cancelled());
    assert!(rx.try_iter().any(|e| matches!(e, HealEvent::Warning { .. })));
}

// =========================================================================
// Resolution invariance and undo fidelity
// =========================================================================

#[test]
fn every_tier_returns_original_size_and_exact_undo() {
    let mut image = scene(2400, 1200);
    let target = Rect::new(1000, 500, 1048, 548);
    paint(&mut image, &target, [250, 250, 0]);
    let original_bytes = region_bytes(&image, &target);

    for &tier in QualityTier::all() {
        let result = simple_heal::heal(&image, &HealRequest::rect(target).with_tier(tier))
            .unwrap()
            .healed()
            .unwrap();
        assert_eq!(result.image.dimensions(), (2400, 1200), "tier {tier}");
        assert_eq!(result.undo.bounds(), target, "tier {tier}");
        assert_eq!(result.undo.pixels(), original_bytes.as_slice(), "tier {tier}");
        assert!(result.undo.matches(&image), "tier {tier}");
        assert_unchanged_outside(&image, &result.image, &target);
    }
}

#[test]
fn undo_reverts_a_heal() {
    let mut image = scene(400, 300);
    let target = Rect::new(150, 120, 190, 160);
    paint(&mut image, &target, [0, 255, 0]);

    let mut healed = simple_heal::heal(&image, &HealRequest::rect(target))
        .unwrap()
        .healed()
        .unwrap();
    assert_ne!(healed.image, image);
    healed.undo.restore(&mut healed.image).unwrap();
    assert_eq!(healed.image, image);
}

// =========================================================================
// Brush strokes and explicit sources
// =========================================================================

#[test]
fn strokes_from_json_heal_only_the_brushed_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strokes.json");
    std::fs::write(
        &path,
        r#"[{"points": [{"x": 80, "y": 150}, {"x": 140, "y": 160}, {"x": 200, "y": 150}],
             "radius": 14, "hardness": 0.6}]"#,
    )
    .unwrap();
    let strokes: Vec<Stroke> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(strokes[0].opacity, 1.0);

    let image = scene(300, 300);
    let mask = simple_heal::imaging::Mask::from_strokes(&strokes, 300, 300).unwrap();
    let result = simple_heal::heal(&image, &HealRequest::strokes(strokes))
        .unwrap()
        .healed()
        .unwrap();

    assert_eq!(result.region.target, mask.bounds());
    assert_eq!(result.region.origin, RegionOrigin::AutoDetected);
    for (x, y, p) in image.enumerate_pixels() {
        if mask.at(x as i32, y as i32) == 0.0 {
            assert_eq!(p, result.image.get_pixel(x, y));
        }
    }
}

#[test]
fn candidates_feed_an_explicit_source() {
    let image = scene(512, 512);
    let target = Rect::new(200, 200, 240, 240);
    let healer = Healer::new(HealConfig::default(), RustBackend::new());

    let candidates = healer.candidates(&image, &target, &[]).unwrap();
    assert!(!candidates.is_empty());
    assert!(candidates.len() <= 5);
    let chosen = candidates[candidates.len() - 1].rect;

    let result = healer
        .heal(&image, &HealRequest::rect(target).with_source(chosen), &never(), None)
        .unwrap()
        .healed()
        .unwrap();
    assert_eq!(result.region.source, Some(chosen));
    assert_eq!(result.region.origin, RegionOrigin::UserSpecified);
}
