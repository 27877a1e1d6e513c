//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the engine and
//! the CLI need from an image library: identify, load, save, and resize.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) on top of the `image`
//! crate. The healing core never decodes or encodes files itself; it only
//! calls [`ImageBackend::resize`] to move between the original and the
//! working resolution.

use image::RgbaImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Could not allocate {required_bytes} bytes for image buffer")]
    Allocation { required_bytes: u64 },
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image backends.
///
/// `Sync` so one backend can be shared by healing operations running on
/// different threads.
pub trait ImageBackend: Sync {
    /// Get image dimensions without decoding pixel data where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode an image file to 8-bit RGBA.
    fn load(&self, path: &Path) -> Result<RgbaImage, BackendError>;

    /// Encode an image; the format follows the file extension.
    fn save(&self, image: &RgbaImage, path: &Path) -> Result<(), BackendError>;

    /// Resample an image to exactly `width × height`.
    fn resize(&self, image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, BackendError>;
}
