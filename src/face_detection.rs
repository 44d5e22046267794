//! Face detection on the downsized frame.

use crate::Result;
use log::info;
use opencv::{
    core::{Mat, Ptr, Rect, Size},
    dnn,
    objdetect::FaceDetectorYN,
    prelude::*,
};
use std::path::Path;

/// Detector collaborator contract: boxes in the image's own coordinates
pub trait FaceDetector {
    /// Size of the images that will be passed to [`FaceDetector::detect`]
    fn set_input_size(&mut self, size: Size) -> Result<()>;

    /// Detect faces, best first
    fn detect(&mut self, image: &Mat) -> Result<Vec<Rect>>;
}

/// `YuNet` face detector running on `OpenCV`'s DNN module
pub struct YuNetDetector {
    detector: Ptr<FaceDetectorYN>,
    faces: Mat,
}

impl YuNetDetector {
    /// Load the detector model
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_size: Size,
        score_threshold: f32,
        nms_threshold: f32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!(
            "Initializing face detector with model: {} (input {}x{})",
            model_path.display(),
            input_size.width,
            input_size.height
        );

        let detector = FaceDetectorYN::create(
            &model_path.to_string_lossy(),
            "",
            input_size,
            score_threshold,
            nms_threshold,
            1,
            dnn::DNN_BACKEND_DEFAULT,
            dnn::DNN_TARGET_CPU,
        )?;

        Ok(Self {
            detector,
            faces: Mat::default(),
        })
    }
}

impl FaceDetector for YuNetDetector {
    fn set_input_size(&mut self, size: Size) -> Result<()> {
        self.detector.set_input_size(size)?;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // Box coordinates are pixels
    fn detect(&mut self, image: &Mat) -> Result<Vec<Rect>> {
        self.detector.detect(image, &mut self.faces)?;

        // One row per face: x, y, w, h, then landmarks and score
        let mut boxes = Vec::with_capacity(self.faces.rows().max(0) as usize);
        for row in 0..self.faces.rows() {
            let x = *self.faces.at_2d::<f32>(row, 0)?;
            let y = *self.faces.at_2d::<f32>(row, 1)?;
            let w = *self.faces.at_2d::<f32>(row, 2)?;
            let h = *self.faces.at_2d::<f32>(row, 3)?;
            boxes.push(Rect::new(x as i32, y as i32, w as i32, h as i32));
        }
        Ok(boxes)
    }
}
