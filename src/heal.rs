//! Healing orchestrator.
//!
//! [`Healer::heal`] is the public entry point. One call runs this pipeline
//! on a private copy of the caller's image:
//!
//! ```text
//! selection ──► validate ──► mask ──► memory check ──► undo snapshot
//!                                                        │
//!             working copy (downscaled for the tier) ◄───┘
//!                    │
//!                    ├─ rect, explicit source ──► copy and blend
//!                    ├─ rect, small ───────────► source search ──► copy and blend
//!                    │                                 └─ nothing found ─┐
//!                    └─ strokes / large rect ──► batched synthesis ◄─────┘
//!                                                        │
//!           upscale healed rects, composite with the mask ──► HealingResult
//! ```
//!
//! The caller's image is only ever read. Cancellation is cooperative and
//! polled before every unit of work (the source search, each batch); once
//! observed, the working copy is dropped and [`HealOutcome::Cancelled`] is
//! returned. That is an outcome, not an error.
//!
//! Progress and stage changes are sent as [`HealEvent`]s over an optional
//! channel, the same way the CLI streams them to its printer thread.

use crate::config::HealConfig;
use crate::detect::{SourceRegionDetector, region_similarity};
use crate::device::{DeviceProfile, StaticDeviceProfile, estimate_operation_bytes};
use crate::imaging::blend::{PatchAccumulator, blend_patch, composite_masked, fill_from_border};
use crate::imaging::calculations::{batch_grid, scale_rect};
use crate::imaging::features::{extract, extract_border};
use crate::imaging::operations::try_clone_image;
use crate::imaging::{
    BackendError, ImageBackend, Mask, QualityTier, RustBackend, TierParams, WorkingCopy,
    prepare_working_copy, restore_region,
};
use crate::synthesis::{SynthesisError, SynthesisReport, TextureSynthesizer};
use crate::types::{HealingRegion, Rect, RegionOrigin, SourceCandidate, Stroke};
use crate::undo::{HealingUndoData, UndoError};
use crate::validate::{AreaValidator, Validation};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Errors and stages
// ============================================================================

/// Pipeline stage, used both for progress events and to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealStage {
    Validating,
    MaskBuild,
    SourceSearch,
    Synthesis,
    Blending,
    Complete,
}

impl HealStage {
    pub fn tag(self) -> &'static str {
        match self {
            HealStage::Validating => "validating",
            HealStage::MaskBuild => "mask-build",
            HealStage::SourceSearch => "source-search",
            HealStage::Synthesis => "synthesis",
            HealStage::Blending => "blending",
            HealStage::Complete => "complete",
        }
    }
}

impl fmt::Display for HealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Error, Debug)]
pub enum HealError {
    #[error("{message}")]
    Validation { message: String },
    #[error("insufficient memory: {required_bytes} bytes required")]
    InsufficientMemory { required_bytes: u64 },
    #[error("healing failed during {stage}: {cause}")]
    Algorithm {
        stage: HealStage,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl HealError {
    fn validation(message: impl Into<String>) -> Self {
        HealError::Validation {
            message: message.into(),
        }
    }

    fn algorithm(stage: HealStage, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        HealError::Algorithm {
            stage,
            cause: Box::new(cause),
        }
    }

    fn backend(stage: HealStage, err: BackendError) -> Self {
        match err {
            BackendError::Allocation { required_bytes } => {
                HealError::InsufficientMemory { required_bytes }
            }
            other => HealError::algorithm(stage, other),
        }
    }
}

impl From<SynthesisError> for HealError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::Backend(e) => HealError::backend(HealStage::Synthesis, e),
            other => HealError::algorithm(HealStage::Synthesis, other),
        }
    }
}

impl From<UndoError> for HealError {
    fn from(err: UndoError) -> Self {
        match err {
            UndoError::Allocation { required_bytes } => {
                HealError::InsufficientMemory { required_bytes }
            }
            UndoError::OutOfBounds(_) => HealError::validation(err.to_string()),
            // Only restoring a snapshot can mismatch; that writes pixels back.
            other => HealError::algorithm(HealStage::Blending, other),
        }
    }
}

// ============================================================================
// Events, cancellation, ids
// ============================================================================

/// Progress reported while a heal runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HealEvent {
    Stage {
        id: String,
        stage: HealStage,
    },
    /// `fraction` is `completed / total` and never decreases within a heal.
    Progress {
        id: String,
        completed: usize,
        total: usize,
        fraction: f32,
    },
    Warning {
        id: String,
        message: String,
    },
}

struct Events<'a> {
    id: &'a str,
    tx: Option<Sender<HealEvent>>,
}

impl Events<'_> {
    fn send(&self, event: HealEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    fn stage(&self, stage: HealStage) {
        debug!(id = self.id, %stage, "stage");
        self.send(HealEvent::Stage {
            id: self.id.to_string(),
            stage,
        });
    }

    fn progress(&self, completed: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            (completed as f32 / total as f32).clamp(0.0, 1.0)
        };
        self.send(HealEvent::Progress {
            id: self.id.to_string(),
            completed,
            total,
            fraction,
        });
    }

    fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(id = self.id, %message, "heal warning");
        self.send(HealEvent::Warning {
            id: self.id.to_string(),
            message,
        });
    }
}

/// Polled between units of work; `true` stops the heal.
pub trait CancelCheck: Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool + Sync> CancelCheck for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Shareable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CancelCheck for CancelToken {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Source of operation ids.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Monotonic ids of the form `prefix-000001`.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:06}", self.prefix, n)
    }
}

// ============================================================================
// Requests and outcomes
// ============================================================================

/// What the user selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    Rect(Rect),
    Strokes(Vec<Stroke>),
}

/// One healing request, in original image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealRequest {
    pub selection: Selection,
    /// Areas the source search must not sample from (rect selections).
    #[serde(default)]
    pub excluded: Vec<Rect>,
    /// Clone from this rect instead of searching. Rect selections only;
    /// must match the selection's size.
    #[serde(default)]
    pub source: Option<Rect>,
    #[serde(default)]
    pub tier: QualityTier,
}

impl HealRequest {
    pub fn rect(rect: Rect) -> Self {
        Self {
            selection: Selection::Rect(rect),
            excluded: Vec::new(),
            source: None,
            tier: QualityTier::default(),
        }
    }

    pub fn strokes(strokes: Vec<Stroke>) -> Self {
        Self {
            selection: Selection::Strokes(strokes),
            ..Self::rect(Rect::default())
        }
    }

    pub fn with_tier(mut self, tier: QualityTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_excluded(mut self, excluded: Vec<Rect>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_source(mut self, source: Rect) -> Self {
        self.source = Some(source);
        self
    }
}

/// A completed heal.
#[derive(Debug, Clone)]
pub struct HealingResult {
    pub id: String,
    /// Healed image at the caller's original resolution.
    pub image: RgbaImage,
    pub region: HealingRegion,
    pub elapsed: Duration,
    /// False when some patches found no admissible source and kept the
    /// border interpolation.
    pub success: bool,
    pub undo: HealingUndoData,
}

/// A heal stopped by its cancellation check.
#[derive(Debug, Clone)]
pub struct CancelledHeal {
    pub id: String,
    pub completed_batches: usize,
    pub total_batches: usize,
    pub elapsed: Duration,
    /// Snapshot of the target area, taken before any work started.
    pub undo: HealingUndoData,
}

#[derive(Debug, Clone)]
pub enum HealOutcome {
    Healed(HealingResult),
    Cancelled(CancelledHeal),
}

impl HealOutcome {
    pub fn id(&self) -> &str {
        match self {
            HealOutcome::Healed(r) => &r.id,
            HealOutcome::Cancelled(c) => &c.id,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HealOutcome::Cancelled(_))
    }

    pub fn healed(self) -> Option<HealingResult> {
        match self {
            HealOutcome::Healed(r) => Some(r),
            HealOutcome::Cancelled(_) => None,
        }
    }

    pub fn undo(&self) -> &HealingUndoData {
        match self {
            HealOutcome::Healed(r) => &r.undo,
            HealOutcome::Cancelled(c) => &c.undo,
        }
    }
}

/// What the working-resolution pass produced.
enum Processed {
    Done {
        /// Working-copy rects whose pixels must be carried back.
        healed: Vec<Rect>,
        confidence: f32,
        success: bool,
        source: Option<Rect>,
        origin: RegionOrigin,
    },
    Cancelled {
        completed: usize,
        total: usize,
    },
}

// ============================================================================
// Healer
// ============================================================================

/// Runs healing requests against one configuration and backend.
pub struct Healer<B: ImageBackend> {
    config: HealConfig,
    backend: B,
    validator: AreaValidator,
    detector: SourceRegionDetector,
    device: Box<dyn DeviceProfile + Send>,
    ids: Box<dyn IdSource>,
}

impl<B: ImageBackend> Healer<B> {
    pub fn new(config: HealConfig, backend: B) -> Self {
        Self {
            validator: AreaValidator::new(&config.limits),
            detector: SourceRegionDetector::new(&config.detector),
            device: Box::new(StaticDeviceProfile::from_config(&config)),
            ids: Box::new(SequentialIds::new("heal")),
            config,
            backend,
        }
    }

    pub fn with_device(mut self, device: impl DeviceProfile + Send + 'static) -> Self {
        self.device = Box::new(device);
        self
    }

    pub fn with_ids(mut self, ids: impl IdSource + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn config(&self) -> &HealConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn validate(&self, image_size: (u32, u32), target: &Rect) -> Validation {
        self.validator.validate(image_size, target)
    }

    /// Ranked source candidates for `target`, searched at full resolution.
    pub fn candidates(
        &self,
        image: &RgbaImage,
        target: &Rect,
        excluded: &[Rect],
    ) -> Result<Vec<SourceCandidate>, HealError> {
        let validation = self.validate(image.dimensions(), target);
        if !validation.is_valid() {
            return Err(HealError::validation(validation.message));
        }
        Ok(self.detector.find_candidates(
            image,
            target,
            excluded,
            self.config.detector.max_candidates,
        ))
    }

    /// Heal `request` on a private copy of `image`.
    pub fn heal(
        &self,
        image: &RgbaImage,
        request: &HealRequest,
        cancel: &dyn CancelCheck,
        events: Option<Sender<HealEvent>>,
    ) -> Result<HealOutcome, HealError> {
        let started = Instant::now();
        let id = self.ids.next_id();
        let events = Events { id: &id, tx: events };
        let original = image.dimensions();
        info!(id = %id, tier = %request.tier, "heal started");

        let mask = self.build_mask(original, request, &events)?;
        let target = mask.bounds();
        if let Some(source) = &request.source {
            self.check_source(original, &target, source, request)?;
        }

        let params = self.config.tiers.params(request.tier);
        let working_dims = self.device.working_dimensions(original, request.tier);
        let required_bytes = estimate_operation_bytes(original, working_dims, &target);
        self.device
            .ensure_memory(required_bytes)
            .map_err(|e| HealError::InsufficientMemory {
                required_bytes: e.required_bytes,
            })?;

        // Always from the caller's full-resolution pixels.
        let undo = HealingUndoData::capture(image, &target)?;

        let mut working = prepare_working_copy(&self.backend, image, working_dims)
            .map_err(|e| HealError::backend(HealStage::MaskBuild, e))?;
        let working_mask = if working.is_scaled() {
            mask.scaled(original, working_dims).ok_or_else(|| {
                HealError::algorithm(
                    HealStage::MaskBuild,
                    BackendError::ProcessingFailed(format!(
                        "mask {target} does not map to the {}x{} working copy",
                        working_dims.0, working_dims.1
                    )),
                )
            })?
        } else {
            mask.clone()
        };
        debug!(
            id = %id,
            target = %target,
            working = ?working_dims,
            scaled = working.is_scaled(),
            "working copy ready"
        );

        let processed =
            self.process(&mut working, &working_mask, request, params, cancel, &events)?;
        let (healed, confidence, success, source, origin) = match processed {
            Processed::Cancelled { completed, total } => {
                info!(id = %id, completed, total, "heal cancelled");
                return Ok(HealOutcome::Cancelled(CancelledHeal {
                    id,
                    completed_batches: completed,
                    total_batches: total,
                    elapsed: started.elapsed(),
                    undo,
                }));
            }
            Processed::Done {
                healed,
                confidence,
                success,
                source,
                origin,
            } => (healed, confidence, success, source, origin),
        };

        events.stage(HealStage::Blending);
        let mut out =
            try_clone_image(image).map_err(|e| HealError::backend(HealStage::Blending, e))?;
        for rect in &healed {
            let (pixels, at) = restore_region(&self.backend, &working, rect)
                .map_err(|e| HealError::backend(HealStage::Blending, e))?;
            composite_masked(&mut out, &pixels, at, &mask);
        }

        let source = match (request.source, source) {
            (Some(explicit), _) => Some(explicit),
            (None, Some(s)) if working.is_scaled() => scale_rect(&s, working_dims, original),
            (None, s) => s,
        };
        let strokes = match &request.selection {
            Selection::Strokes(strokes) => strokes.clone(),
            Selection::Rect(_) => Vec::new(),
        };
        let elapsed = started.elapsed();
        events.stage(HealStage::Complete);
        info!(
            id = %id,
            confidence,
            success,
            elapsed_ms = elapsed.as_millis() as u64,
            "heal complete"
        );

        Ok(HealOutcome::Healed(HealingResult {
            id,
            image: out,
            region: HealingRegion {
                target,
                source,
                strokes,
                confidence: confidence.clamp(0.0, 1.0),
                origin,
            },
            elapsed,
            success,
            undo,
        }))
    }

    /// Validate the selection, then build its mask.
    ///
    /// Brush selections are validated on their stroke bounds, so an
    /// oversized stroke is rejected before anything is rasterized.
    fn build_mask(
        &self,
        image_size: (u32, u32),
        request: &HealRequest,
        events: &Events<'_>,
    ) -> Result<Mask, HealError> {
        let (width, height) = image_size;
        events.stage(HealStage::Validating);
        let checked = match &request.selection {
            // A rect is validated as given, before clipping could hide an
            // out-of-bounds selection.
            Selection::Rect(rect) => *rect,
            Selection::Strokes(strokes) => Mask::stroke_bounds(strokes, width, height)
                .map_err(|e| HealError::validation(e.to_string()))?,
        };
        let validation = self.validator.validate(image_size, &checked);
        if !validation.is_valid() {
            debug!(status = ?validation.status, "validation failed");
            return Err(HealError::validation(validation.message));
        }
        if let Some(warning) = validation.warning() {
            events.warning(warning);
        }

        events.stage(HealStage::MaskBuild);
        let mask = match &request.selection {
            Selection::Rect(_) => Mask::from_rect(&checked, width, height),
            Selection::Strokes(strokes) => Mask::from_strokes(strokes, width, height),
        };
        mask.map_err(|e| HealError::algorithm(HealStage::MaskBuild, e))
    }

    fn check_source(
        &self,
        image_size: (u32, u32),
        target: &Rect,
        source: &Rect,
        request: &HealRequest,
    ) -> Result<(), HealError> {
        if !matches!(request.selection, Selection::Rect(_)) {
            return Err(HealError::validation(
                "an explicit source requires a rectangle selection",
            ));
        }
        if source.width() != target.width() || source.height() != target.height() {
            return Err(HealError::validation(format!(
                "source {source} must be {}x{} to match the target",
                target.width(),
                target.height()
            )));
        }
        if !source.fits_within(image_size.0, image_size.1) {
            return Err(HealError::validation(format!(
                "source {source} lies outside the {}x{} image",
                image_size.0, image_size.1
            )));
        }
        if source.intersects(target) {
            return Err(HealError::validation(format!(
                "source {source} overlaps the target {target}"
            )));
        }
        Ok(())
    }

    /// Heal the working copy in place.
    fn process(
        &self,
        working: &mut WorkingCopy,
        mask: &Mask,
        request: &HealRequest,
        params: TierParams,
        cancel: &dyn CancelCheck,
        events: &Events<'_>,
    ) -> Result<Processed, HealError> {
        let target = mask.bounds();
        let batched = target.area() > self.config.limits.max_area / 2;

        if let Selection::Rect(_) = request.selection {
            if let Some(source) = request.source {
                if cancel.is_cancelled() {
                    return Ok(Processed::Cancelled {
                        completed: 0,
                        total: 1,
                    });
                }
                let source = self.working_source(working, &target, &source)?;
                let confidence = region_similarity(
                    &extract_border(&working.image, &target, self.config.detector.border_width),
                    &extract(&working.image, &source),
                );
                clone_region(&mut working.image, &source, &target);
                events.progress(1, 1);
                return Ok(Processed::Done {
                    healed: vec![target],
                    confidence,
                    success: true,
                    source: Some(source),
                    origin: RegionOrigin::UserSpecified,
                });
            }

            if !batched {
                if cancel.is_cancelled() {
                    return Ok(Processed::Cancelled {
                        completed: 0,
                        total: 1,
                    });
                }
                events.stage(HealStage::SourceSearch);
                let excluded: Vec<Rect> = request
                    .excluded
                    .iter()
                    .filter_map(|r| working.to_working(r))
                    .collect();
                if let Some(best) = self.detector.find_best(&working.image, &target, &excluded) {
                    clone_region(&mut working.image, &best.rect, &target);
                    events.progress(1, 1);
                    return Ok(Processed::Done {
                        healed: vec![target],
                        confidence: best.score,
                        success: true,
                        source: Some(best.rect),
                        origin: RegionOrigin::AutoDetected,
                    });
                }
                events.warning("no matching source region found; synthesizing texture instead");
            }
        }

        let regions = match request.selection {
            Selection::Rect(_) => vec![target],
            Selection::Strokes(_) => mask.components(),
        };
        let plan: Vec<(Rect, Vec<Rect>)> = regions
            .iter()
            .map(|region| {
                let batches = if region.area() > self.config.limits.max_area / 2 {
                    batch_grid(region, params.batch_size)
                } else {
                    vec![*region]
                };
                (*region, batches)
            })
            .collect();
        let total: usize = plan.iter().map(|(_, batches)| batches.len()).sum();
        debug!(regions = plan.len(), batches = total, "synthesis plan");

        events.stage(HealStage::Synthesis);
        let synthesizer = TextureSynthesizer::new(&self.config.synthesis, params);
        let mut report = SynthesisReport::default();
        let mut completed = 0;
        for (region, batches) in &plan {
            // Prefill the whole region up front so no batch samples the
            // defect through a neighbour that has not been processed yet.
            fill_from_border(&mut working.image, region);
            for batch in batches {
                if cancel.is_cancelled() {
                    return Ok(Processed::Cancelled { completed, total });
                }
                report.absorb(synthesizer.refine(&mut working.image, batch, mask)?);
                completed += 1;
                debug!(batch = %batch, completed, total, "batch done");
                events.progress(completed, total);
            }
        }

        Ok(Processed::Done {
            healed: regions,
            confidence: report.mean_similarity(),
            success: report.unfilled() == 0,
            source: None,
            origin: RegionOrigin::AutoDetected,
        })
    }

    /// Map an explicit source rect onto the working copy at the working
    /// target's exact size.
    fn working_source(
        &self,
        working: &WorkingCopy,
        target: &Rect,
        source: &Rect,
    ) -> Result<Rect, HealError> {
        let mapped = working
            .to_working(source)
            .map(|s| Rect::from_xywh(s.left, s.top, target.width(), target.height()))
            .filter(|s| {
                let (w, h) = working.dimensions();
                s.fits_within(w, h) && !s.intersects(target)
            });
        mapped.ok_or_else(|| {
            HealError::validation(format!(
                "source {source} does not fit beside the target at the working resolution"
            ))
        })
    }
}

/// Copy `source` over `target` with gradient-domain blending.
///
/// The target is prefilled from its border first so the blend's
/// reconstruction starts from surrounding content, not from the defect.
fn clone_region(image: &mut RgbaImage, source: &Rect, target: &Rect) {
    fill_from_border(image, target);
    let colors = blend_patch(image, source, target);
    let mut accumulator = PatchAccumulator::new(*target);
    accumulator.add(target, &colors);
    accumulator.resolve(image);
}

/// Heal with the stock configuration and the `image`-crate backend.
pub fn heal(image: &RgbaImage, request: &HealRequest) -> Result<HealOutcome, HealError> {
    Healer::new(HealConfig::default(), RustBackend::new()).heal(image, request, &|| false, None)
}
