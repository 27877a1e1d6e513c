//! High-level image operations.
//!
//! These functions combine calculations with backend execution: making the
//! private working copy a healing operation mutates, cropping regions, and
//! bringing a healed region back to the original resolution.

use super::backend::{BackendError, ImageBackend};
use super::calculations::scale_rect;
use crate::types::Rect;
use image::RgbaImage;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

fn buffer_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * 4
}

/// Allocate a zeroed RGBA buffer, reporting failure instead of aborting.
fn try_buffer(width: u32, height: u32) -> Result<Vec<u8>> {
    let required_bytes = buffer_bytes(width, height);
    let len = usize::try_from(required_bytes)
        .map_err(|_| BackendError::Allocation { required_bytes })?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| BackendError::Allocation { required_bytes })?;
    buf.resize(len, 0);
    Ok(buf)
}

fn from_buffer(width: u32, height: u32, buf: Vec<u8>) -> Result<RgbaImage> {
    RgbaImage::from_raw(width, height, buf).ok_or_else(|| {
        BackendError::ProcessingFailed(format!("buffer does not match {width}x{height}"))
    })
}

/// Copy an image into freshly reserved memory.
pub fn try_clone_image(image: &RgbaImage) -> Result<RgbaImage> {
    let mut buf = try_buffer(image.width(), image.height())?;
    buf.copy_from_slice(image.as_raw());
    from_buffer(image.width(), image.height(), buf)
}

/// Copy the pixels of `rect` (clipped to the image) into a new image.
pub fn crop(image: &RgbaImage, rect: &Rect) -> Result<RgbaImage> {
    let r = rect.clip(image.width(), image.height()).ok_or_else(|| {
        BackendError::ProcessingFailed(format!(
            "crop {rect} outside {}x{} image",
            image.width(),
            image.height()
        ))
    })?;
    let (w, h) = (r.width() as u32, r.height() as u32);
    let mut buf = try_buffer(w, h)?;
    let src = image.as_raw();
    let row_bytes = w as usize * 4;
    for row in 0..h as usize {
        let offset = ((r.top as usize + row) * image.width() as usize + r.left as usize) * 4;
        buf[row * row_bytes..(row + 1) * row_bytes]
            .copy_from_slice(&src[offset..offset + row_bytes]);
    }
    from_buffer(w, h, buf)
}

/// The private copy a healing operation works on.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    pub image: RgbaImage,
    /// Dimensions of the caller's image.
    pub original: (u32, u32),
}

impl WorkingCopy {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_scaled(&self) -> bool {
        self.dimensions() != self.original
    }

    /// Map a rect from original coordinates to working coordinates.
    pub fn to_working(&self, rect: &Rect) -> Option<Rect> {
        if self.is_scaled() {
            scale_rect(rect, self.original, self.dimensions())
        } else {
            rect.clip(self.original.0, self.original.1)
        }
    }
}

/// Make the working copy at `dims`, resizing through the backend only when
/// the size differs from the original.
pub fn prepare_working_copy(
    backend: &impl ImageBackend,
    image: &RgbaImage,
    dims: (u32, u32),
) -> Result<WorkingCopy> {
    let original = image.dimensions();
    let working = if dims == original {
        try_clone_image(image)?
    } else {
        // The resized buffer is allocated by the backend; reserve first so
        // memory pressure surfaces here as an error.
        drop(try_buffer(dims.0, dims.1)?);
        backend.resize(image, dims.0, dims.1)?
    };
    Ok(WorkingCopy {
        image: working,
        original,
    })
}

/// Crop `working_rect` from the working copy and resize it to cover the
/// matching original-resolution rect.
///
/// Returns the upscaled pixels and their top-left corner in original
/// coordinates.
pub fn restore_region(
    backend: &impl ImageBackend,
    working: &WorkingCopy,
    working_rect: &Rect,
) -> Result<(RgbaImage, (i32, i32))> {
    let region = crop(&working.image, working_rect)?;
    if !working.is_scaled() {
        return Ok((region, (working_rect.left, working_rect.top)));
    }
    let target = scale_rect(working_rect, working.dimensions(), working.original).ok_or_else(
        || BackendError::ProcessingFailed(format!("{working_rect} does not map back to original")),
    )?;
    let upscaled = backend.resize(&region, target.width() as u32, target.height() as u32)?;
    Ok((upscaled, (target.left, target.top)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{assert_images_equal, checkerboard, uniform};

    #[test]
    fn clone_is_identical() {
        let image = checkerboard(33, 17, 4, [255, 0, 0], [0, 255, 0]);
        assert_images_equal(&try_clone_image(&image).unwrap(), &image);
    }

    #[test]
    fn crop_copies_rows() {
        let image = checkerboard(40, 40, 10, [255, 255, 255], [0, 0, 0]);
        let cropped = crop(&image, &Rect::new(5, 5, 25, 15)).unwrap();
        assert_eq!(cropped.dimensions(), (20, 10));
        assert_eq!(cropped.get_pixel(0, 0), image.get_pixel(5, 5));
        assert_eq!(cropped.get_pixel(19, 9), image.get_pixel(24, 14));
    }

    #[test]
    fn crop_outside_errors() {
        let image = uniform(10, 10, [0, 0, 0]);
        assert!(crop(&image, &Rect::new(20, 20, 30, 30)).is_err());
    }

    #[test]
    fn working_copy_at_full_size_skips_backend() {
        let backend = MockBackend::new();
        let image = uniform(64, 48, [1, 2, 3]);
        let copy = prepare_working_copy(&backend, &image, (64, 48)).unwrap();
        assert!(!copy.is_scaled());
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn downscaled_copy_resizes_through_backend() {
        let backend = MockBackend::new();
        let image = uniform(200, 100, [1, 2, 3]);
        let copy = prepare_working_copy(&backend, &image, (100, 50)).unwrap();
        assert!(copy.is_scaled());
        assert_eq!(backend.resize_ops(), vec![((200, 100), (100, 50))]);
        assert_eq!(
            copy.to_working(&Rect::new(40, 40, 80, 60)),
            Some(Rect::new(20, 20, 40, 30))
        );
    }

    #[test]
    fn restore_region_maps_back_to_original() {
        let backend = MockBackend::new();
        let image = uniform(200, 100, [9, 9, 9]);
        let copy = prepare_working_copy(&backend, &image, (100, 50)).unwrap();
        let (pixels, origin) = restore_region(&backend, &copy, &Rect::new(20, 20, 40, 30)).unwrap();
        assert_eq!(origin, (40, 40));
        assert_eq!(pixels.dimensions(), (40, 20));
        assert_eq!(backend.resize_ops().last(), Some(&((20, 10), (40, 20))));
    }
}
