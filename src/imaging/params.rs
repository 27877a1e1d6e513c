//! Parameter types for healing operations.
//!
//! These structs describe *how hard* to work, not *what* to heal. The quality
//! tier is supplied by a device/performance collaborator and is a closed set;
//! each tier maps to one [`TierParams`] value so the rest of the engine reads
//! plain numbers instead of branching on the tier.
//!
//! ## Types
//!
//! - [`QualityTier`]: `Lite`, `Medium`, `Advanced`.
//! - [`TierParams`]: patch size, number of synthesis levels, batch size,
//!   search breadth and working-resolution cap for one tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing quality tier chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Lite,
    #[default]
    Medium,
    Advanced,
}

impl QualityTier {
    pub fn all() -> &'static [QualityTier] {
        &[QualityTier::Lite, QualityTier::Medium, QualityTier::Advanced]
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityTier::Lite => "lite",
            QualityTier::Medium => "medium",
            QualityTier::Advanced => "advanced",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lite" => Ok(QualityTier::Lite),
            "medium" => Ok(QualityTier::Medium),
            "advanced" => Ok(QualityTier::Advanced),
            other => Err(format!(
                "unknown quality tier '{other}' (expected lite, medium or advanced)"
            )),
        }
    }
}

/// Tuning constants for one quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierParams {
    /// Patch side at the coarsest synthesis level. Halved per finer level.
    pub patch_size: u32,
    /// Number of synthesis levels (coarse to fine).
    pub levels: u32,
    /// Side of one batch when a large target is decomposed.
    pub batch_size: u32,
    /// Base per-patch search radius in pixels.
    pub search_radius: u32,
    /// Cap on candidates evaluated per patch.
    pub max_candidates: u32,
    /// Longest edge of the working copy. `0` keeps full resolution.
    pub working_max_dimension: u32,
}

impl TierParams {
    pub fn lite() -> Self {
        Self {
            patch_size: 16,
            levels: 2,
            batch_size: 64,
            search_radius: 32,
            max_candidates: 32,
            working_max_dimension: 1024,
        }
    }

    pub fn medium() -> Self {
        Self {
            patch_size: 32,
            levels: 3,
            batch_size: 128,
            search_radius: 48,
            max_candidates: 48,
            working_max_dimension: 2048,
        }
    }

    pub fn advanced() -> Self {
        Self {
            patch_size: 32,
            levels: 3,
            batch_size: 256,
            search_radius: 64,
            max_candidates: 64,
            working_max_dimension: 0,
        }
    }

    pub fn defaults_for(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Lite => Self::lite(),
            QualityTier::Medium => Self::medium(),
            QualityTier::Advanced => Self::advanced(),
        }
    }

    /// Patch sizes for each synthesis level, coarse to fine.
    ///
    /// Sizes halve per level and stop at `min_patch`; repeated sizes at the
    /// floor are collapsed so a level is never run twice.
    pub fn level_patch_sizes(&self, min_patch: u32) -> Vec<u32> {
        let min_patch = min_patch.max(1);
        let mut sizes = Vec::with_capacity(self.levels as usize);
        let mut size = self.patch_size.max(min_patch);
        for _ in 0..self.levels.max(1) {
            if sizes.last() == Some(&size) {
                break;
            }
            sizes.push(size);
            size = (size / 2).max(min_patch);
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("LITE".parse::<QualityTier>(), Ok(QualityTier::Lite));
        assert_eq!("advanced".parse::<QualityTier>(), Ok(QualityTier::Advanced));
        assert!("ultra".parse::<QualityTier>().is_err());
    }

    #[test]
    fn batch_sizes_grow_with_tier() {
        assert_eq!(TierParams::lite().batch_size, 64);
        assert_eq!(TierParams::medium().batch_size, 128);
        assert_eq!(TierParams::advanced().batch_size, 256);
    }

    #[test]
    fn level_sizes_halve_down_to_floor() {
        assert_eq!(TierParams::advanced().level_patch_sizes(8), vec![32, 16, 8]);
        assert_eq!(TierParams::lite().level_patch_sizes(8), vec![16, 8]);
    }

    #[test]
    fn level_sizes_collapse_at_floor() {
        let params = TierParams {
            patch_size: 8,
            levels: 3,
            ..TierParams::lite()
        };
        assert_eq!(params.level_patch_sizes(8), vec![8]);
    }

    #[test]
    fn patch_size_below_floor_is_raised() {
        let params = TierParams {
            patch_size: 4,
            levels: 2,
            ..TierParams::lite()
        };
        assert_eq!(params.level_patch_sizes(8), vec![8]);
    }
}
