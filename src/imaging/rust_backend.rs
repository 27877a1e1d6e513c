//! Pure Rust image backend on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` |
//! | Encode | `image::DynamicImage::save_with_format` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |

use super::backend::{BackendError, Dimensions, ImageBackend};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose codecs are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

fn format_for(path: &Path) -> Result<ImageFormat, BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    PHOTO_CANDIDATES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, fmt)| *fmt)
        .ok_or_else(|| {
            BackendError::ProcessingFailed(format!(
                "Unsupported output format: {}",
                path.display()
            ))
        })
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn load(&self, path: &Path) -> Result<RgbaImage, BackendError> {
        let img = ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(img.into_rgba8())
    }

    fn save(&self, image: &RgbaImage, path: &Path) -> Result<(), BackendError> {
        let format = format_for(path)?;
        // JPEG has no alpha channel.
        let encoded: DynamicImage = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgba8(image.clone()).into_rgb8().into(),
            _ => DynamicImage::ImageRgba8(image.clone()),
        };
        encoded.save_with_format(path, format).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
        })
    }

    fn resize(
        &self,
        image: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Cannot resize to {width}x{height}"
            )));
        }
        if image.dimensions() == (width, height) {
            return Ok(image.clone());
        }
        Ok(image::imageops::resize(
            image,
            width,
            height,
            FilterType::Lanczos3,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{horizontal_stripes, uniform};

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = super::supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn png_save_load_keeps_pixels() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("stripes.png");
        let image = horizontal_stripes(40, 30, 3, [200, 10, 10], [10, 10, 200]);

        let backend = RustBackend::new();
        backend.save(&image, &path).unwrap();
        assert_eq!(backend.load(&path).unwrap(), image);
    }

    #[test]
    fn identify_saved_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("flat.jpg");
        let backend = RustBackend::new();
        backend.save(&uniform(200, 150, [90, 120, 30]), &path).unwrap();

        let dims = backend.identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn save_unknown_extension_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = RustBackend::new();
        let result = backend.save(&uniform(4, 4, [0, 0, 0]), &tmp.path().join("out.xyz"));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn resize_uniform_stays_uniform() {
        let backend = RustBackend::new();
        let resized = backend.resize(&uniform(300, 200, [0, 0, 255]), 150, 100).unwrap();
        assert_eq!(resized.dimensions(), (150, 100));
        assert!(resized.pixels().all(|p| p.0 == [0, 0, 255, 255]));
    }

    #[test]
    fn resize_to_same_size_is_copy() {
        let backend = RustBackend::new();
        let image = horizontal_stripes(20, 20, 2, [255, 255, 255], [0, 0, 0]);
        assert_eq!(backend.resize(&image, 20, 20).unwrap(), image);
    }

    #[test]
    fn resize_to_zero_errors() {
        let backend = RustBackend::new();
        assert!(backend.resize(&uniform(10, 10, [0, 0, 0]), 0, 5).is_err());
    }
}
