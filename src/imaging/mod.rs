//! Image processing for healing, in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` crate codecs |
//! | **Working-resolution resize** | `image::imageops::resize` (Lanczos3) |
//! | **Texture descriptors** | Sobel, LBP, luminance histograms, summed-area tables |
//! | **Masks** | rect fill, stamped brush strokes, box blur |
//! | **Compositing** | border prefill, gradient-domain blend, radial feather |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for healing geometry (unit testable)
//! - **Parameters**: Quality tiers and their tuning constants
//! - **Features / Mask / Blend**: Pixel-level building blocks
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
pub mod blend;
pub mod calculations;
pub mod features;
pub mod mask;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use features::{FeatureIndex, PatchSummary, TextureFeatures};
pub use mask::{Mask, MaskError};
pub use operations::{WorkingCopy, get_dimensions, prepare_working_copy, restore_region};
pub use params::{QualityTier, TierParams};
pub use rust_backend::RustBackend;
