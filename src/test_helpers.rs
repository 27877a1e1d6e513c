//! Shared test utilities for the simple-heal test suite.
//!
//! Provides synthetic image fixtures (flat fills, stripes, checkerboards,
//! deterministic noise) and pixel-level assertions that work with
//! [`RgbaImage`] and [`Rect`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut image = horizontal_stripes(200, 200, 4, [200, 40, 40], [40, 40, 200]);
//! paint_rect(&mut image, &Rect::new(80, 80, 112, 112), [0, 255, 0]);
//!
//! let healed = heal_somehow(&image);
//! assert_unchanged_outside(&image, &healed, &Rect::new(80, 80, 112, 112));
//! ```

use image::{Rgba, RgbaImage};

use crate::types::Rect;

// =========================================================================
// Fixtures
// =========================================================================

/// Flat `width × height` image of one color.
pub fn uniform(width: u32, height: u32, color: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, rgba(color))
}

/// Checkerboard of `cell`-pixel squares alternating between `a` and `b`.
pub fn checkerboard(width: u32, height: u32, cell: u32, a: [u8; 3], b: [u8; 3]) -> RgbaImage {
    let cell = cell.max(1);
    RgbaImage::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            rgba(a)
        } else {
            rgba(b)
        }
    })
}

/// Horizontal bands `stripe` pixels tall alternating between `a` and `b`.
pub fn horizontal_stripes(
    width: u32,
    height: u32,
    stripe: u32,
    a: [u8; 3],
    b: [u8; 3],
) -> RgbaImage {
    let stripe = stripe.max(1);
    RgbaImage::from_fn(width, height, |_, y| {
        if (y / stripe) % 2 == 0 {
            rgba(a)
        } else {
            rgba(b)
        }
    })
}

/// Left-to-right ramp from `from` to `to`.
pub fn horizontal_gradient(width: u32, height: u32, from: [u8; 3], to: [u8; 3]) -> RgbaImage {
    let span = width.saturating_sub(1).max(1) as f32;
    RgbaImage::from_fn(width, height, |x, _| {
        let t = x as f32 / span;
        let mix = |c: usize| (from[c] as f32 + (to[c] as f32 - from[c] as f32) * t).round() as u8;
        rgba([mix(0), mix(1), mix(2)])
    })
}

/// Deterministic noise around `base` with per-channel spread `amplitude`.
pub fn noise(width: u32, height: u32, base: [u8; 3], amplitude: u8, seed: u32) -> RgbaImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    RgbaImage::from_fn(width, height, |_, _| {
        let mut channel = |c: u8| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let offset = (state % (2 * amplitude as u32 + 1)) as i32 - amplitude as i32;
            (c as i32 + offset).clamp(0, 255) as u8
        };
        rgba([channel(base[0]), channel(base[1]), channel(base[2])])
    })
}

/// Overwrite `rect` with a flat color.
pub fn paint_rect(image: &mut RgbaImage, rect: &Rect, color: [u8; 3]) {
    let Some(r) = rect.clip(image.width(), image.height()) else {
        return;
    };
    for y in r.top..r.bottom {
        for x in r.left..r.right {
            image.put_pixel(x as u32, y as u32, rgba(color));
        }
    }
}

fn rgba(c: [u8; 3]) -> Rgba<u8> {
    Rgba([c[0], c[1], c[2], 255])
}

// =========================================================================
// Measurements
// =========================================================================

/// Mean RGB over `rect`.
pub fn mean_color(image: &RgbaImage, rect: &Rect) -> [f32; 3] {
    let r = rect
        .clip(image.width(), image.height())
        .unwrap_or_else(|| panic!("rect {rect} outside {}x{}", image.width(), image.height()));
    let mut sum = [0.0f64; 3];
    for y in r.top..r.bottom {
        for x in r.left..r.right {
            let p = image.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                sum[c] += p[c] as f64;
            }
        }
    }
    let n = r.area() as f64;
    [(sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32]
}

/// Fraction of pixels in `rect` whose RGB equals `color`.
pub fn fraction_of_color(image: &RgbaImage, rect: &Rect, color: [u8; 3]) -> f32 {
    let mut hits = 0u64;
    for y in rect.top..rect.bottom {
        for x in rect.left..rect.right {
            let p = image.get_pixel(x as u32, y as u32);
            if p[0] == color[0] && p[1] == color[1] && p[2] == color[2] {
                hits += 1;
            }
        }
    }
    hits as f32 / rect.area().max(1) as f32
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert that every pixel outside `region` is byte-identical in both images.
pub fn assert_unchanged_outside(before: &RgbaImage, after: &RgbaImage, region: &Rect) {
    assert_eq!(before.dimensions(), after.dimensions(), "dimensions changed");
    for (x, y, p) in before.enumerate_pixels() {
        if region.contains(x as i32, y as i32) {
            continue;
        }
        assert_eq!(
            p,
            after.get_pixel(x, y),
            "pixel ({x},{y}) outside {region} was modified"
        );
    }
}

/// Assert two images are byte-identical, naming the first difference.
pub fn assert_images_equal(a: &RgbaImage, b: &RgbaImage) {
    assert_eq!(a.dimensions(), b.dimensions(), "dimensions differ");
    if let Some((x, y, p)) = a.enumerate_pixels().find(|(x, y, p)| *p != b.get_pixel(*x, *y)) {
        panic!("images differ at ({x},{y}): {p:?} vs {:?}", b.get_pixel(x, y));
    }
}
