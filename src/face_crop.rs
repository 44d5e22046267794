//! Face crop geometry: from a detector box to the region fed to the
//! landmark network.

use crate::constants::{CROP_LEADING_PADDING, CROP_TRAILING_PADDING};
use crate::face_data::FaceFrameState;
use opencv::core::{Point, Rect, Size};

/// Padded crop rectangle clamped to the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceCrop {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl FaceCrop {
    /// Pad `bbox` and clamp the result to `[0, frame.width] × [0, frame.height]`.
    ///
    /// The left and top edges move out by 10% of the box size, the right and
    /// bottom edges by 20%, which keeps the chin inside the crop. A box lying
    /// fully outside the frame collapses to an empty or negative rectangle;
    /// check [`FaceCrop::is_degenerate`] before using it.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Pixel coordinates fit in i32
    pub fn from_detection(bbox: Rect, frame: Size) -> Self {
        let (x, y) = (f64::from(bbox.x), f64::from(bbox.y));
        let (w, h) = (f64::from(bbox.width), f64::from(bbox.height));

        let x1 = (x - w * CROP_LEADING_PADDING) as i32;
        let y1 = (y - h * CROP_LEADING_PADDING) as i32;
        let x2 = (x + w + w * CROP_TRAILING_PADDING) as i32;
        let y2 = (y + h + h * CROP_TRAILING_PADDING) as i32;

        Self {
            top_left: Point::new(x1.clamp(0, frame.width), y1.clamp(0, frame.height)),
            bottom_right: Point::new(x2.clamp(0, frame.width), y2.clamp(0, frame.height)),
        }
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(
            self.bottom_right.x - self.top_left.x,
            self.bottom_right.y - self.top_left.y,
        )
    }

    /// True when the crop has no area and the frame must be skipped
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let size = self.size();
        size.width <= 0 || size.height <= 0
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        let size = self.size();
        Rect::new(self.top_left.x, self.top_left.y, size.width, size.height)
    }

    /// Record the crop in the frame state
    pub fn store(&self, state: &mut FaceFrameState) {
        state.crop_top_left = self.top_left;
        state.crop_bottom_right = self.bottom_right;
        state.crop_size = self.size();
    }
}

/// Mapping between the full frame and the downsized detection image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionScale {
    /// Size of the image handed to the face detector
    pub detection_size: Size,
    /// Full-frame pixels per detection pixel, horizontally
    pub scale_x: f32,
    /// Full-frame pixels per detection pixel, vertically
    pub scale_y: f32,
}

impl DetectionScale {
    /// Detection image `resize_to` pixels wide keeping the frame aspect ratio
    ///
    /// # Errors
    ///
    /// Returns an error if the frame or the resulting detection image is empty
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn new(frame: Size, resize_to: i32) -> crate::Result<Self> {
        if frame.width <= 0 || frame.height <= 0 || resize_to <= 0 {
            return Err(crate::Error::InvalidInput(format!(
                "Cannot derive detection size from frame {}x{} and resize target {}",
                frame.width, frame.height, resize_to
            )));
        }

        let aspect_ratio = frame.width as f32 / frame.height as f32;
        let height = (resize_to as f32 / aspect_ratio) as i32;
        if height <= 0 {
            return Err(crate::Error::InvalidInput(format!(
                "Detection height collapses to {height} for frame {}x{}",
                frame.width, frame.height
            )));
        }

        Ok(Self {
            detection_size: Size::new(resize_to, height),
            scale_x: frame.width as f32 / resize_to as f32,
            scale_y: frame.height as f32 / height as f32,
        })
    }

    /// Map a detection box back into full-frame pixels
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn to_frame(&self, bbox: Rect) -> Rect {
        Rect::new(
            (bbox.x as f32 * self.scale_x) as i32,
            (bbox.y as f32 * self.scale_y) as i32,
            (bbox.width as f32 * self.scale_x) as i32,
            (bbox.height as f32 * self.scale_y) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_padding_inside_frame() {
        let crop = FaceCrop::from_detection(Rect::new(100, 100, 50, 50), Size::new(640, 480));

        assert_eq!(crop.top_left, Point::new(95, 95));
        assert_eq!(crop.bottom_right, Point::new(160, 160));
        assert_eq!(crop.size(), Size::new(65, 65));
        assert!(!crop.is_degenerate());
    }

    #[test]
    fn test_crop_clamped_to_frame() {
        let crop = FaceCrop::from_detection(Rect::new(600, 2, 100, 100), Size::new(640, 480));

        assert_eq!(crop.top_left, Point::new(590, 0));
        assert_eq!(crop.bottom_right, Point::new(640, 122));
    }

    #[test]
    fn test_crop_outside_frame_is_degenerate() {
        let crop = FaceCrop::from_detection(Rect::new(700, 500, 40, 40), Size::new(640, 480));
        assert!(crop.is_degenerate());

        let crop = FaceCrop::from_detection(Rect::new(-300, -300, 100, 100), Size::new(640, 480));
        assert!(crop.is_degenerate());
    }

    #[test]
    fn test_store_writes_state() {
        let mut state = FaceFrameState::default();
        let crop = FaceCrop::from_detection(Rect::new(100, 100, 50, 50), Size::new(640, 480));
        crop.store(&mut state);

        assert_eq!(state.crop_rect(), Rect::new(95, 95, 65, 65));
    }

    #[test]
    fn test_detection_scale() {
        let scale = DetectionScale::new(Size::new(640, 320), 128).unwrap();

        assert_eq!(scale.detection_size, Size::new(128, 64));
        assert_eq!(scale.to_frame(Rect::new(10, 12, 20, 30)), Rect::new(50, 60, 100, 150));
    }

    #[test]
    fn test_detection_scale_rejects_empty_frame() {
        assert!(DetectionScale::new(Size::new(0, 480), 124).is_err());
        assert!(DetectionScale::new(Size::new(640, 480), 0).is_err());
    }
}
