//! Per-frame face state shared by the pipeline stages.

use crate::constants::LANDMARK_COORDS_LEN;
use opencv::core::{Point, Rect, Size};

/// Mutable record of the most recent face processed by the frame loop.
///
/// The record is re-derived every frame that contains a face and left
/// untouched otherwise, so after a frame without a face it still holds the
/// previous pose.
///
/// Landmark pairs are stored row axis first: `coords[2 * i]` is the vertical
/// pixel position of landmark `i` and `coords[2 * i + 1]` the horizontal one.
/// The camera intrinsics and the translation vector follow the same order,
/// so `translation[0]` is the vertical offset and `translation[1]` the
/// lateral offset.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceFrameState {
    /// Top-left corner of the face crop
    pub crop_top_left: Point,
    /// Bottom-right corner of the face crop
    pub crop_bottom_right: Point,
    /// Size of the face crop
    pub crop_size: Size,
    /// Landmark coordinates in full-frame pixels
    pub landmarks: [f32; LANDMARK_COORDS_LEN],
    /// Pitch, yaw, roll in degrees
    pub rotation: [f64; 3],
    /// Vertical, lateral, depth translation in centimeters
    pub translation: [f64; 3],
}

impl Default for FaceFrameState {
    fn default() -> Self {
        Self {
            crop_top_left: Point::new(0, 0),
            crop_bottom_right: Point::new(0, 0),
            crop_size: Size::new(0, 0),
            landmarks: [0.0; LANDMARK_COORDS_LEN],
            rotation: [0.0; 3],
            translation: [0.0; 3],
        }
    }
}

impl FaceFrameState {
    /// Crop rectangle as an `OpenCV` rect
    #[must_use]
    pub fn crop_rect(&self) -> Rect {
        Rect::new(
            self.crop_top_left.x,
            self.crop_top_left.y,
            self.crop_size.width,
            self.crop_size.height,
        )
    }

    /// Landmark `index` as an image point (x, y)
    #[must_use]
    pub fn landmark_point(&self, index: usize) -> Option<(f32, f32)> {
        let vertical = *self.landmarks.get(2 * index)?;
        let horizontal = *self.landmarks.get(2 * index + 1)?;
        Some((horizontal, vertical))
    }

    pub fn pitch(&self) -> f64 {
        self.rotation[0]
    }

    pub fn yaw(&self) -> f64 {
        self.rotation[1]
    }

    pub fn roll(&self) -> f64 {
        self.rotation[2]
    }
}
