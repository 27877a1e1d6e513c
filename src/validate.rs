//! Target-area validation.
//!
//! Checks a selection against the configured size ceiling and the image
//! bounds before any pixel work starts. A target hugging the image border is
//! still healable, so that case is a warning rather than a failure.

use crate::config::LimitsConfig;
use crate::types::Rect;
use serde::Serialize;

/// Classification of a target area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AreaStatus {
    Valid,
    /// Valid, but within the edge-proximity margin of the image border.
    NearEdge,
    Empty,
    TooLarge,
    OutOfBounds,
}

/// Outcome of [`AreaValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub status: AreaStatus,
    pub message: String,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self.status, AreaStatus::Valid | AreaStatus::NearEdge)
    }

    /// The warning text for a valid-with-warning result.
    pub fn warning(&self) -> Option<&str> {
        (self.status == AreaStatus::NearEdge).then_some(self.message.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaValidator {
    pub max_area: u64,
    pub edge_proximity: u32,
}

impl AreaValidator {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_area: limits.max_area,
            edge_proximity: limits.edge_proximity,
        }
    }

    pub fn validate(&self, image_size: (u32, u32), target: &Rect) -> Validation {
        let (width, height) = image_size;
        if target.is_empty() {
            return Validation {
                status: AreaStatus::Empty,
                message: format!("target area {target} is empty"),
            };
        }
        if target.area() > self.max_area {
            return Validation {
                status: AreaStatus::TooLarge,
                message: format!(
                    "target area of {} pixels exceeds the maximum of {} pixels",
                    target.area(),
                    self.max_area
                ),
            };
        }
        if !target.fits_within(width, height) {
            return Validation {
                status: AreaStatus::OutOfBounds,
                message: format!("target area {target} lies outside the {width}x{height} image"),
            };
        }

        let margin = self.edge_proximity as i32;
        let near_edge = target.left < margin
            || target.top < margin
            || width as i32 - target.right < margin
            || height as i32 - target.bottom < margin;
        if near_edge {
            return Validation {
                status: AreaStatus::NearEdge,
                message: format!(
                    "target area is within {} pixels of the image edge; \
                     fewer source regions are available",
                    self.edge_proximity
                ),
            };
        }
        Validation {
            status: AreaStatus::Valid,
            message: "target area is valid".to_string(),
        }
    }
}

impl Default for AreaValidator {
    fn default() -> Self {
        Self::new(&LimitsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_target_is_valid() {
        let v = AreaValidator::default().validate((512, 512), &Rect::new(100, 100, 164, 164));
        assert_eq!(v.status, AreaStatus::Valid);
        assert!(v.is_valid());
        assert_eq!(v.warning(), None);
    }

    #[test]
    fn too_large_names_the_limit() {
        let v = AreaValidator::default().validate((2000, 2000), &Rect::new(100, 100, 700, 700));
        assert_eq!(v.status, AreaStatus::TooLarge);
        assert!(!v.is_valid());
        assert!(v.message.contains("262144"), "{}", v.message);
    }

    #[test]
    fn exactly_max_area_is_accepted() {
        let v = AreaValidator::default().validate((1000, 1000), &Rect::new(100, 100, 612, 612));
        assert!(v.is_valid());
    }

    #[test]
    fn out_of_bounds_is_invalid() {
        let validator = AreaValidator::default();
        assert_eq!(
            validator.validate((100, 100), &Rect::new(-1, 20, 30, 40)).status,
            AreaStatus::OutOfBounds
        );
        assert_eq!(
            validator.validate((100, 100), &Rect::new(80, 20, 101, 40)).status,
            AreaStatus::OutOfBounds
        );
    }

    #[test]
    fn empty_target_is_invalid() {
        let v = AreaValidator::default().validate((100, 100), &Rect::new(20, 20, 20, 40));
        assert_eq!(v.status, AreaStatus::Empty);
    }

    #[test]
    fn target_near_left_edge_warns() {
        let v = AreaValidator::default().validate((512, 512), &Rect::new(5, 200, 69, 264));
        assert_eq!(v.status, AreaStatus::NearEdge);
        assert!(v.is_valid());
        assert!(v.warning().is_some());
    }

    #[test]
    fn target_touching_right_edge_warns() {
        let v = AreaValidator::default().validate((512, 512), &Rect::new(448, 200, 512, 264));
        assert_eq!(v.status, AreaStatus::NearEdge);
    }

    #[test]
    fn margin_is_exclusive() {
        let v = AreaValidator::default().validate((512, 512), &Rect::new(10, 10, 502, 502));
        assert_eq!(v.status, AreaStatus::Valid);
    }
}
