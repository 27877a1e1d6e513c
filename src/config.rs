//! Healing configuration module.
//!
//! Handles loading, validating, and merging `heal.toml` files. Stock defaults
//! are the base layer; a user file only needs the keys it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! max_area = 262144         # Largest target area in pixels (512 x 512)
//! edge_proximity = 10       # Warn when a target is this close to the border
//!
//! [detector]
//! min_similarity = 0.5      # Candidates scoring below this are dropped
//! border_width = 3          # Width of the band sampled around the target
//! ring_step = 0.5           # Ring spacing as a fraction of the target size
//! angle_step_degrees = 20.0 # Angular spacing of candidates on each ring
//! max_candidates = 5        # Length of the ranked candidate list
//!
//! [synthesis]
//! similarity_threshold = 0.6
//! overlap = 0.25            # Patch overlap as a fraction of patch size
//! min_patch_size = 8        # Floor for the finest synthesis level
//!
//! [tiers.medium]
//! patch_size = 32
//! levels = 3
//! batch_size = 128
//! search_radius = 48
//! max_candidates = 48
//! working_max_dimension = 2048  # 0 keeps full resolution
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! memory_budget_mb = 1024   # Refuse operations whose buffers exceed this
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [limits]
//! max_area = 1048576
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{QualityTier, TierParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Healing configuration loaded from `heal.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealConfig {
    /// Target size and placement limits.
    pub limits: LimitsConfig,
    /// Whole-region source search.
    pub detector: DetectorConfig,
    /// Patch synthesis.
    pub synthesis: SynthesisConfig,
    /// Per-tier tuning constants.
    pub tiers: TiersConfig,
    /// Parallelism and memory budget.
    pub processing: ProcessingConfig,
}

impl HealConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_area == 0 {
            return Err(ConfigError::Validation(
                "limits.max_area must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.min_similarity) {
            return Err(ConfigError::Validation(
                "detector.min_similarity must be 0-1".into(),
            ));
        }
        if self.detector.border_width == 0 {
            return Err(ConfigError::Validation(
                "detector.border_width must be at least 1".into(),
            ));
        }
        if self.detector.ring_step <= 0.0 {
            return Err(ConfigError::Validation(
                "detector.ring_step must be positive".into(),
            ));
        }
        if !(self.detector.angle_step_degrees > 0.0 && self.detector.angle_step_degrees <= 360.0) {
            return Err(ConfigError::Validation(
                "detector.angle_step_degrees must be in (0, 360]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.synthesis.similarity_threshold) {
            return Err(ConfigError::Validation(
                "synthesis.similarity_threshold must be 0-1".into(),
            ));
        }
        if !(0.0..0.9).contains(&self.synthesis.overlap) {
            return Err(ConfigError::Validation(
                "synthesis.overlap must be in [0, 0.9)".into(),
            ));
        }
        if self.synthesis.min_patch_size == 0 {
            return Err(ConfigError::Validation(
                "synthesis.min_patch_size must be at least 1".into(),
            ));
        }
        for &tier in QualityTier::all() {
            let p = self.tiers.params(tier);
            if p.patch_size == 0 || p.levels == 0 || p.batch_size == 0 || p.max_candidates == 0 {
                return Err(ConfigError::Validation(format!(
                    "tiers.{tier}: patch_size, levels, batch_size and max_candidates \
                     must be non-zero"
                )));
            }
        }
        Ok(())
    }
}

/// Target size and placement limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted target area in pixels.
    pub max_area: u64,
    /// Targets closer than this to any image edge get a warning.
    pub edge_proximity: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_area: 512 * 512,
            edge_proximity: 10,
        }
    }
}

/// Whole-region source search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub min_similarity: f32,
    pub border_width: u32,
    /// Spacing between search rings, as a fraction of the target's longer side.
    pub ring_step: f32,
    pub angle_step_degrees: f32,
    pub max_candidates: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.5,
            border_width: 3,
            ring_step: 0.5,
            angle_step_degrees: 20.0,
            max_candidates: 5,
        }
    }
}

/// Patch synthesis settings shared by every tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisConfig {
    pub similarity_threshold: f32,
    /// Overlap between neighbouring patches as a fraction of the patch size.
    pub overlap: f32,
    pub min_patch_size: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            overlap: 0.25,
            min_patch_size: 8,
        }
    }
}

/// Tuning table, one entry per quality tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TiersConfig {
    pub lite: TierParams,
    pub medium: TierParams,
    pub advanced: TierParams,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            lite: TierParams::lite(),
            medium: TierParams::medium(),
            advanced: TierParams::advanced(),
        }
    }
}

impl TiersConfig {
    pub fn params(&self, tier: QualityTier) -> TierParams {
        match tier {
            QualityTier::Lite => self.lite,
            QualityTier::Medium => self.medium,
            QualityTier::Advanced => self.advanced,
        }
    }
}

/// Parallel processing and memory settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers used by source search.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Memory ceiling for one healing operation's buffers, in MiB.
    /// When absent, no ceiling is enforced.
    pub memory_budget_mb: Option<u64>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    // Every field is a plain number or table, so serialization cannot fail.
    toml::Value::try_from(HealConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<HealConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: HealConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<HealConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `heal.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Heal Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest target area accepted, in pixels. Larger selections are rejected.
max_area = 262144

# Targets with an edge closer than this many pixels to the image border are
# accepted with a warning: fewer source candidates exist near edges.
edge_proximity = 10

# ---------------------------------------------------------------------------
# Source detection (rectangle heals)
# ---------------------------------------------------------------------------
[detector]
# Candidate sources scoring below this are discarded (0-1).
min_similarity = 0.5

# Width in pixels of the band sampled around the target to describe it.
border_width = 3

# Candidates sit on rings 2x to 4x the target's longer side away from it.
# ring_step is the spacing between rings as a fraction of that side.
ring_step = 0.5

# Angular spacing of candidates on each ring, in degrees.
angle_step_degrees = 20.0

# How many ranked candidates the `candidates` command reports.
max_candidates = 5

# ---------------------------------------------------------------------------
# Patch synthesis (brush heals and rectangles without a good source)
# ---------------------------------------------------------------------------
[synthesis]
# Patches scoring below this fall back to the best candidate found (0-1).
similarity_threshold = 0.6

# Overlap between neighbouring patches as a fraction of the patch size.
overlap = 0.25

# Smallest patch side used by the finest level.
min_patch_size = 8

# ---------------------------------------------------------------------------
# Quality tiers
# ---------------------------------------------------------------------------
# patch_size:            patch side at the coarsest level, halved per level
# levels:                number of coarse-to-fine synthesis levels
# batch_size:            side of one batch when a large target is split
# search_radius:         base per-patch search radius in pixels
# max_candidates:        candidates scored per patch
# working_max_dimension: longest edge of the working copy (0 = full size)
[tiers.lite]
patch_size = 16
levels = 2
batch_size = 64
search_radius = 32
max_candidates = 32
working_max_dimension = 1024

[tiers.medium]
patch_size = 32
levels = 3
batch_size = 128
search_radius = 48
max_candidates = 48
working_max_dimension = 2048

[tiers.advanced]
patch_size = 32
levels = 3
batch_size = 256
search_radius = 64
max_candidates = 64
working_max_dimension = 0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for source search.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Refuse operations whose working buffers would exceed this many MiB.
# Omit to disable the check.
# memory_budget_mb = 1024
"##
}
