//! Capture device access and the camera intrinsics derived from it.

use crate::config::CameraConfig;
use crate::Result;
use log::info;
use nalgebra::Matrix3;
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{self, VideoCapture},
};

/// Focal lengths and principal point of the capture device.
///
/// Rows follow the landmark axis order (vertical first), so the first row
/// carries the focal length and principal point of the image height.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    pub matrix: Matrix3<f64>,
    pub distortion: [f64; 4],
}

impl CameraIntrinsics {
    /// Derive intrinsics from image size and diagonal field of view.
    ///
    /// The diagonal FOV is split proportionally into horizontal and vertical
    /// FOVs. A FOV of zero falls back to focal lengths equal to the image
    /// dimensions.
    #[must_use]
    pub fn from_fov(width: i32, height: i32, fov_degrees: f64) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));

        let (focal_w, focal_h) = if fov_degrees == 0.0 {
            (w, h)
        } else {
            let diag_fov = fov_degrees.to_radians();
            let diagonal = w.hypot(h);
            let fov_w = diag_fov * w / diagonal;
            let fov_h = diag_fov * h / diagonal;
            (0.5 * w / (0.5 * fov_w).tan(), 0.5 * h / (0.5 * fov_h).tan())
        };

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            focal_h, 0.0, h / 2.0,
            0.0, focal_w, w / 2.0,
            0.0, 0.0, 1.0,
        );

        Self {
            matrix,
            distortion: [0.0; 4],
        }
    }

    /// Row-major copy of the matrix
    #[must_use]
    pub fn rows(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

/// Capture device contract used by the frame loop
pub trait FrameSource {
    /// Push resolution, frame rate and autofocus to the device
    fn apply_settings(&mut self, settings: &CameraConfig) -> Result<()>;

    /// Resolution the device actually delivers
    fn resolution(&self) -> Result<Size>;

    /// Block until the next frame; `Ok(false)` when no frame was produced
    fn read_frame(&mut self, frame: &mut Mat) -> Result<bool>;
}

/// Webcam backed by `OpenCV`'s `VideoCapture`
pub struct OpenCvCamera {
    capture: VideoCapture,
}

impl OpenCvCamera {
    /// Open camera `index` and apply `settings`
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened
    pub fn open(index: i32, settings: &CameraConfig) -> Result<Self> {
        info!("Opening camera {}", index);
        let capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(crate::Error::InvalidInput(format!("Camera {index} could not be opened")));
        }

        let mut camera = Self { capture };
        camera.apply_settings(settings)?;
        Ok(camera)
    }
}

impl FrameSource for OpenCvCamera {
    fn apply_settings(&mut self, settings: &CameraConfig) -> Result<()> {
        self.capture
            .set(videoio::CAP_PROP_AUTOFOCUS, if settings.auto_focus { 1.0 } else { 0.0 })?;
        self.capture.set(videoio::CAP_PROP_FPS, f64::from(settings.fps))?;
        self.capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(settings.width))?;
        self.capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(settings.height))?;

        // Reduce buffer size for lower latency
        self.capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let resolution = self.resolution()?;
        info!(
            "Camera configured: requested {}x{}@{} (autofocus {}), delivering {}x{}",
            settings.width, settings.height, settings.fps, settings.auto_focus, resolution.width, resolution.height
        );
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // Frame dimensions are small integers
    fn resolution(&self) -> Result<Size> {
        let width = self.capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = self.capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        Ok(Size::new(width, height))
    }

    fn read_frame(&mut self, frame: &mut Mat) -> Result<bool> {
        Ok(self.capture.read(frame)? && !frame.empty())
    }
}
