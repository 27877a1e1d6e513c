//! # Simple Heal
//!
//! Content-aware healing for photographs: mark an object or blemish with a
//! rectangle or brush strokes, and the engine fills it with texture taken
//! from elsewhere in the same image so the area blends into its
//! surroundings.
//!
//! # Architecture: One Pipeline, Two Fill Strategies
//!
//! ```text
//! selection ─► AreaValidator ─► Mask ─► working copy ─┬─► SourceRegionDetector ─► copy + blend
//!                                                    └─► TextureSynthesizer (batched)
//!                                                             │
//!                       undo snapshot ◄── caller image        ▼
//!                                             composite at original resolution
//! ```
//!
//! - **Whole-region cloning** ([`detect`]) finds one same-sized rectangle
//!   whose surroundings match the target's border and pastes it with a
//!   gradient-domain blend. Fast, and right for compact rectangular defects.
//! - **Patch synthesis** ([`synthesis`]) rebuilds the area coarse to fine
//!   from small overlapping patches. Used for brush selections, for large
//!   areas (split into batches with cancellation between them), and when no
//!   whole-region source exists.
//!
//! [`heal::Healer`] owns the sequencing. It never writes to the caller's
//! image; every result comes with a [`undo::HealingUndoData`] snapshot of the
//! original pixels.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`heal`] | Orchestrator: requests, outcomes, events, cancellation, errors |
//! | [`detect`] | Whole-region source search on concentric rings |
//! | [`synthesis`] | Multi-scale patch synthesis |
//! | [`validate`] | Target size and bounds checks |
//! | [`undo`] | Checksummed undo snapshots and a bounded history |
//! | [`device`] | Working resolution and memory-budget decisions |
//! | [`imaging`] | Features, masks, blending, geometry, and the image backend |
//! | [`config`] | `heal.toml` loading, merging, and validation |
//! | [`types`] | Shared value types (`Rect`, `Stroke`, `HealingRegion`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Quality Tiers Are Data
//!
//! Lite, medium, and advanced differ only in the numbers of a
//! [`imaging::TierParams`] row: working resolution, patch and batch size,
//! search breadth. No code path branches on the tier itself, so a lower tier
//! is faster but never behaves differently.
//!
//! ## Deterministic Search
//!
//! Candidate generation is a fixed ring and spiral walk, scoring runs on the
//! rayon pool but collects in generation order, and ties are broken with a
//! total order. The same image and selection always heal the same way.

pub mod config;
pub mod detect;
pub mod device;
pub mod heal;
pub mod imaging;
pub mod output;
pub mod synthesis;
pub mod types;
pub mod undo;
pub mod validate;

pub use heal::{HealError, HealOutcome, HealRequest, Healer, heal};

#[cfg(test)]
pub(crate) mod test_helpers;
