//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Heal (streamed events, then the result)
//!
//! ```text
//! heal-000001 validating
//!     Warning: target area is within 10 pixels of the image edge; ...
//! heal-000001 mask-build
//! heal-000001 synthesis
//!     Batch 1/4 (25%)
//! heal-000001 blending
//! heal-000001 complete
//! Healed heal-000001 in 412 ms
//!     Target: 100,100 → 164,164 (64×64)
//!     Source: 228,100 → 292,164 (64×64), auto-detected
//!     Confidence: 0.97
//!     Undo: sha256 3f7a9c01d2e4
//!     Output: healed.png
//! ```
//!
//! ## Candidates
//!
//! ```text
//! Candidates for 100,100 → 164,164 (64×64)
//! 001 228,100 → 292,164 (64×64)
//!     Score: 0.982  Distance: 128.0
//! ```
//!
//! ## Check
//!
//! ```text
//! Target 2,100 → 34,132 (32×32)
//!     Status: near-edge
//!     Warning: target area is within 10 pixels of the image edge; ...
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::heal::{HealEvent, HealOutcome};
use crate::types::{Rect, RegionOrigin, SourceCandidate};
use crate::validate::{AreaStatus, Validation};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as a zero-padded 3-digit string.
fn format_index(pos: usize) -> String {
    format!("{:03}", pos)
}

/// Indentation for a given depth level (4 spaces per level).
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1000 {
        format!("{} ms", ms)
    } else {
        format!("{:.1} s", elapsed.as_secs_f64())
    }
}

fn status_label(status: AreaStatus) -> &'static str {
    match status {
        AreaStatus::Valid => "valid",
        AreaStatus::NearEdge => "near-edge",
        AreaStatus::Empty => "empty",
        AreaStatus::TooLarge => "too-large",
        AreaStatus::OutOfBounds => "out-of-bounds",
    }
}

fn origin_label(origin: RegionOrigin) -> &'static str {
    match origin {
        RegionOrigin::UserSpecified => "user-specified",
        RegionOrigin::AutoDetected => "auto-detected",
    }
}

// ============================================================================
// Heal events
// ============================================================================

/// Format one streamed heal event as display lines.
pub fn format_heal_event(event: &HealEvent) -> Vec<String> {
    match event {
        HealEvent::Stage { id, stage } => vec![format!("{} {}", id, stage)],
        HealEvent::Progress {
            completed,
            total,
            fraction,
            ..
        } => vec![format!(
            "{}Batch {}/{} ({:.0}%)",
            indent(1),
            completed,
            total,
            fraction * 100.0
        )],
        HealEvent::Warning { message, .. } => vec![format!("{}Warning: {}", indent(1), message)],
    }
}

// ============================================================================
// Heal result
// ============================================================================

/// Format the final outcome of a heal.
///
/// `output` is where the healed image was written, if anywhere.
pub fn format_result(outcome: &HealOutcome, output: Option<&Path>) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        HealOutcome::Healed(result) => {
            lines.push(format!(
                "Healed {} in {}",
                result.id,
                format_duration(result.elapsed)
            ));
            lines.push(format!("{}Target: {}", indent(1), result.region.target));
            match &result.region.source {
                Some(source) => lines.push(format!(
                    "{}Source: {}, {}",
                    indent(1),
                    source,
                    origin_label(result.region.origin)
                )),
                None => lines.push(format!("{}Source: synthesized", indent(1))),
            }
            lines.push(format!(
                "{}Confidence: {:.2}",
                indent(1),
                result.region.confidence
            ));
            if !result.success {
                lines.push(format!(
                    "{}Note: some patches kept the border interpolation",
                    indent(1)
                ));
            }
            let checksum = result.undo.checksum();
            lines.push(format!(
                "{}Undo: sha256 {}",
                indent(1),
                &checksum[..checksum.len().min(12)]
            ));
        }
        HealOutcome::Cancelled(cancelled) => {
            lines.push(format!(
                "Cancelled {} after {}",
                cancelled.id,
                format_duration(cancelled.elapsed)
            ));
            lines.push(format!(
                "{}Batches: {}/{}",
                indent(1),
                cancelled.completed_batches,
                cancelled.total_batches
            ));
            lines.push(format!("{}Image left unchanged", indent(1)));
            return lines;
        }
    }
    if let Some(path) = output {
        lines.push(format!("{}Output: {}", indent(1), path.display()));
    }
    lines
}

pub fn print_result(outcome: &HealOutcome, output: Option<&Path>) {
    for line in format_result(outcome, output) {
        println!("{}", line);
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Format a ranked candidate list, best first.
pub fn format_candidates(target: &Rect, candidates: &[SourceCandidate]) -> Vec<String> {
    let mut lines = vec![format!("Candidates for {}", target)];
    if candidates.is_empty() {
        lines.push(format!("{}No source region above threshold", indent(1)));
        return lines;
    }
    for (i, c) in candidates.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), c.rect));
        lines.push(format!(
            "{}Score: {:.3}  Distance: {:.1}",
            indent(1),
            c.score,
            c.distance
        ));
    }
    lines
}

pub fn print_candidates(target: &Rect, candidates: &[SourceCandidate]) {
    for line in format_candidates(target, candidates) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format a validation result for one target.
pub fn format_validation(target: &Rect, validation: &Validation) -> Vec<String> {
    let mut lines = vec![
        format!("Target {}", target),
        format!("{}Status: {}", indent(1), status_label(validation.status)),
    ];
    match validation.status {
        AreaStatus::Valid => {}
        AreaStatus::NearEdge => {
            lines.push(format!("{}Warning: {}", indent(1), validation.message));
        }
        _ => lines.push(format!("{}Error: {}", indent(1), validation.message)),
    }
    lines
}

pub fn print_validation(target: &Rect, validation: &Validation) {
    for line in format_validation(target, validation) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
