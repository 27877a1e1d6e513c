//! Undo snapshots and history.
//!
//! A [`HealingUndoData`] is a verbatim copy of the caller's pixels inside the
//! healed rectangle, taken before anything is modified. It is the only thing
//! a revert trusts: it is never derived from the healed output, and it
//! carries a SHA-256 checksum so a snapshot that was damaged while sitting
//! on an undo stack is refused instead of written back.

use crate::types::{HealingRegion, Rect};
use image::RgbaImage;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UndoError {
    #[error("snapshot area {0} lies outside the image")]
    OutOfBounds(Rect),
    #[error("snapshot was taken from a {expected:?} image, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("snapshot checksum does not match its pixels")]
    ChecksumMismatch,
    #[error("could not allocate {required_bytes} bytes for snapshot")]
    Allocation { required_bytes: u64 },
}

/// Original pixels of one healed rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealingUndoData {
    bounds: Rect,
    image_size: (u32, u32),
    pixels: Vec<u8>,
    checksum: String,
}

fn checksum(bounds: &Rect, image_size: (u32, u32), pixels: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"undo\0");
    for v in [bounds.left, bounds.top, bounds.right, bounds.bottom] {
        hasher.update(v.to_le_bytes());
    }
    hasher.update(image_size.0.to_le_bytes());
    hasher.update(image_size.1.to_le_bytes());
    hasher.update(pixels);
    format!("{:x}", hasher.finalize())
}

impl HealingUndoData {
    /// Copy the RGBA bytes of `bounds` out of `image`.
    pub fn capture(image: &RgbaImage, bounds: &Rect) -> Result<Self, UndoError> {
        if bounds.is_empty() || !bounds.fits_within(image.width(), image.height()) {
            return Err(UndoError::OutOfBounds(*bounds));
        }
        let row_bytes = bounds.width() as usize * 4;
        let required_bytes = row_bytes as u64 * bounds.height() as u64;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(required_bytes as usize)
            .map_err(|_| UndoError::Allocation { required_bytes })?;

        let raw = image.as_raw();
        let stride = image.width() as usize * 4;
        for y in bounds.top..bounds.bottom {
            let start = y as usize * stride + bounds.left as usize * 4;
            pixels.extend_from_slice(&raw[start..start + row_bytes]);
        }
        let image_size = image.dimensions();
        Ok(Self {
            checksum: checksum(bounds, image_size, &pixels),
            bounds: *bounds,
            image_size,
            pixels,
        })
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// Raw RGBA bytes, row-major over [`Self::bounds`].
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Hex SHA-256 of the bounds, image size, and pixels.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn verify(&self) -> Result<(), UndoError> {
        if checksum(&self.bounds, self.image_size, &self.pixels) == self.checksum {
            Ok(())
        } else {
            Err(UndoError::ChecksumMismatch)
        }
    }

    /// True when `image` currently holds exactly the captured pixels.
    pub fn matches(&self, image: &RgbaImage) -> bool {
        if image.dimensions() != self.image_size {
            return false;
        }
        let row_bytes = self.bounds.width() as usize * 4;
        let stride = image.width() as usize * 4;
        let raw = image.as_raw();
        self.pixels
            .chunks_exact(row_bytes)
            .zip(self.bounds.top..self.bounds.bottom)
            .all(|(row, y)| {
                let start = y as usize * stride + self.bounds.left as usize * 4;
                raw[start..start + row_bytes] == *row
            })
    }

    /// Write the captured pixels back into `image`.
    pub fn restore(&self, image: &mut RgbaImage) -> Result<(), UndoError> {
        if image.dimensions() != self.image_size {
            return Err(UndoError::DimensionMismatch {
                expected: self.image_size,
                actual: image.dimensions(),
            });
        }
        self.verify()?;
        let row_bytes = self.bounds.width() as usize * 4;
        let stride = image.width() as usize * 4;
        let left = self.bounds.left as usize * 4;
        let raw: &mut [u8] = image;
        for (row, y) in self.pixels.chunks_exact(row_bytes).zip(self.bounds.top..) {
            let start = y as usize * stride + left;
            raw[start..start + row_bytes].copy_from_slice(row);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        if let Some(b) = self.pixels.first_mut() {
            *b = b.wrapping_add(1);
        }
    }
}

/// One applied heal, as kept on the undo stack.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: String,
    pub region: HealingRegion,
    pub undo: HealingUndoData,
}

/// Bounded undo stack, newest last.
#[derive(Debug, Clone)]
pub struct HealHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HealHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    /// Push an entry, dropping the oldest one when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Revert the newest entry on `image` and return it.
    ///
    /// On failure the entry stays on the stack and `image` is untouched.
    pub fn undo(&mut self, image: &mut RgbaImage) -> Result<Option<HistoryEntry>, UndoError> {
        let Some(entry) = self.entries.back() else {
            return Ok(None);
        };
        entry.undo.restore(image)?;
        Ok(self.entries.pop_back())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{assert_images_equal, checkerboard, paint_rect};
    use crate::types::RegionOrigin;

    fn entry(id: &str, image: &RgbaImage, bounds: Rect) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            region: HealingRegion {
                target: bounds,
                source: None,
                strokes: Vec::new(),
                confidence: 1.0,
                origin: RegionOrigin::AutoDetected,
            },
            undo: HealingUndoData::capture(image, &bounds).unwrap(),
        }
    }

    #[test]
    fn capture_copies_exact_bytes() {
        let image = checkerboard(20, 20, 3, [255, 0, 0], [0, 0, 255]);
        let bounds = Rect::new(4, 5, 10, 9);
        let undo = HealingUndoData::capture(&image, &bounds).unwrap();
        assert_eq!(undo.pixels().len(), 6 * 4 * 4);
        assert_eq!(&undo.pixels()[0..4], &image.get_pixel(4, 5).0);
        assert!(undo.matches(&image));
        assert_eq!(undo.checksum().len(), 64);
    }

    #[test]
    fn capture_rejects_out_of_bounds() {
        let image = checkerboard(20, 20, 3, [255, 0, 0], [0, 0, 255]);
        let err = HealingUndoData::capture(&image, &Rect::new(15, 15, 25, 25)).unwrap_err();
        assert_eq!(err, UndoError::OutOfBounds(Rect::new(15, 15, 25, 25)));
    }

    #[test]
    fn restore_reverts_modification() {
        let original = checkerboard(30, 30, 4, [10, 20, 30], [200, 210, 220]);
        let bounds = Rect::new(8, 8, 20, 20);
        let undo = HealingUndoData::capture(&original, &bounds).unwrap();

        let mut edited = original.clone();
        paint_rect(&mut edited, &bounds, [0, 255, 0]);
        assert!(!undo.matches(&edited));

        undo.restore(&mut edited).unwrap();
        assert_images_equal(&edited, &original);
    }

    #[test]
    fn corrupted_snapshot_is_refused() {
        let image = checkerboard(10, 10, 2, [0, 0, 0], [255, 255, 255]);
        let mut undo = HealingUndoData::capture(&image, &Rect::new(0, 0, 5, 5)).unwrap();
        undo.corrupt_for_test();
        let mut target = image.clone();
        assert_eq!(undo.restore(&mut target), Err(UndoError::ChecksumMismatch));
        assert_images_equal(&target, &image);
    }

    #[test]
    fn restore_checks_dimensions() {
        let image = checkerboard(10, 10, 2, [0, 0, 0], [255, 255, 255]);
        let undo = HealingUndoData::capture(&image, &Rect::new(0, 0, 5, 5)).unwrap();
        let mut other = checkerboard(12, 10, 2, [0, 0, 0], [255, 255, 255]);
        assert!(matches!(
            undo.restore(&mut other),
            Err(UndoError::DimensionMismatch { .. })
        ));
    }

    // =========================================================================
    // history tests
    // =========================================================================

    #[test]
    fn history_undoes_newest_first() {
        let original = checkerboard(30, 30, 5, [1, 2, 3], [250, 251, 252]);
        let mut image = original.clone();
        let mut history = HealHistory::new(8);

        let first = Rect::new(0, 0, 10, 10);
        history.push(entry("heal-1", &image, first));
        paint_rect(&mut image, &first, [255, 0, 0]);

        let second = Rect::new(5, 5, 15, 15);
        history.push(entry("heal-2", &image, second));
        paint_rect(&mut image, &second, [0, 255, 0]);

        assert_eq!(history.undo(&mut image).unwrap().unwrap().id, "heal-2");
        assert_eq!(history.undo(&mut image).unwrap().unwrap().id, "heal-1");
        assert!(history.undo(&mut image).unwrap().is_none());
        assert_images_equal(&image, &original);
    }

    #[test]
    fn history_drops_oldest_past_capacity() {
        let image = checkerboard(10, 10, 2, [0, 0, 0], [255, 255, 255]);
        let mut history = HealHistory::new(2);
        for i in 0..3 {
            history.push(entry(&format!("heal-{i}"), &image, Rect::new(0, 0, 2, 2)));
        }
        assert_eq!(history.len(), 2);
        let ids: Vec<&str> = history.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["heal-1", "heal-2"]);
    }
}
