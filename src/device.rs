//! Device collaborator: working resolution and memory pressure.
//!
//! The engine does not query hardware. A [`DeviceProfile`] decides how large
//! the working copy for a tier may be and whether an operation of a given
//! size fits in memory right now. [`StaticDeviceProfile`] answers both from
//! configuration, which is what the CLI and the tests use; a host
//! application can supply its own implementation backed by live telemetry.

use crate::config::{HealConfig, TiersConfig};
use crate::imaging::QualityTier;
use crate::imaging::calculations::calculate_working_dimensions;
use crate::types::Rect;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("insufficient memory: {required_bytes} bytes required, {available_bytes} available")]
pub struct MemoryPressure {
    pub required_bytes: u64,
    pub available_bytes: u64,
}

pub trait DeviceProfile: Sync {
    /// Size of the working copy for an image of `original` size at `tier`.
    fn working_dimensions(&self, original: (u32, u32), tier: QualityTier) -> (u32, u32);

    /// Fail if an operation needing `required_bytes` should not start.
    fn ensure_memory(&self, required_bytes: u64) -> Result<(), MemoryPressure>;
}

/// Configuration-driven device profile.
#[derive(Debug, Clone)]
pub struct StaticDeviceProfile {
    tiers: TiersConfig,
    memory_budget_bytes: Option<u64>,
}

impl StaticDeviceProfile {
    pub fn new(tiers: TiersConfig, memory_budget_bytes: Option<u64>) -> Self {
        Self {
            tiers,
            memory_budget_bytes,
        }
    }

    pub fn from_config(config: &HealConfig) -> Self {
        Self::new(
            config.tiers.clone(),
            config
                .processing
                .memory_budget_mb
                .map(|mb| mb.saturating_mul(1024 * 1024)),
        )
    }
}

impl Default for StaticDeviceProfile {
    fn default() -> Self {
        Self::new(TiersConfig::default(), None)
    }
}

impl DeviceProfile for StaticDeviceProfile {
    fn working_dimensions(&self, original: (u32, u32), tier: QualityTier) -> (u32, u32) {
        calculate_working_dimensions(original, self.tiers.params(tier).working_max_dimension)
    }

    fn ensure_memory(&self, required_bytes: u64) -> Result<(), MemoryPressure> {
        match self.memory_budget_bytes {
            Some(available_bytes) if required_bytes > available_bytes => Err(MemoryPressure {
                required_bytes,
                available_bytes,
            }),
            _ => Ok(()),
        }
    }
}

/// Rough peak memory of one healing operation.
///
/// Counts the output copy, the working copy, and per-pixel synthesis
/// buffers (summed-area tables and patch accumulators) over the target.
pub fn estimate_operation_bytes(original: (u32, u32), working: (u32, u32), target: &Rect) -> u64 {
    const RGBA: u64 = 4;
    const SYNTHESIS_BYTES_PER_PIXEL: u64 = 192;
    let output = original.0 as u64 * original.1 as u64 * RGBA;
    let working_copy = working.0 as u64 * working.1 as u64 * RGBA;
    output + working_copy + target.area() * SYNTHESIS_BYTES_PER_PIXEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advanced_tier_keeps_full_resolution() {
        let device = StaticDeviceProfile::default();
        assert_eq!(
            device.working_dimensions((6000, 4000), QualityTier::Advanced),
            (6000, 4000)
        );
    }

    #[test]
    fn lite_tier_downscales_large_images() {
        let device = StaticDeviceProfile::default();
        assert_eq!(
            device.working_dimensions((4096, 2048), QualityTier::Lite),
            (1024, 512)
        );
        assert_eq!(
            device.working_dimensions((800, 600), QualityTier::Lite),
            (800, 600)
        );
    }

    #[test]
    fn unlimited_budget_accepts_anything() {
        assert!(StaticDeviceProfile::default().ensure_memory(u64::MAX).is_ok());
    }

    #[test]
    fn budget_is_enforced() {
        let mut config = HealConfig::default();
        config.processing.memory_budget_mb = Some(1);
        let device = StaticDeviceProfile::from_config(&config);
        assert!(device.ensure_memory(1024 * 1024).is_ok());
        let err = device.ensure_memory(1024 * 1024 + 1).unwrap_err();
        assert_eq!(err.available_bytes, 1024 * 1024);
    }

    #[test]
    fn estimate_grows_with_target() {
        let small = estimate_operation_bytes((100, 100), (100, 100), &Rect::new(0, 0, 10, 10));
        let large = estimate_operation_bytes((100, 100), (100, 100), &Rect::new(0, 0, 50, 50));
        assert!(large > small);
        assert_eq!(small, 2 * 100 * 100 * 4 + 100 * 192);
    }
}
