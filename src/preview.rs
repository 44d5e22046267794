//! Diagnostic preview window.

use crate::constants::NUM_LANDMARKS;
use crate::face_data::FaceFrameState;
use crate::utils::to_pixel;
use crate::Result;
use log::info;
use opencv::{
    core::{Mat, Point, Scalar},
    highgui::{self, WINDOW_NORMAL},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
};

const WINDOW_NAME: &str = "Head Pose Tracker";
const KEY_ESCAPE: i32 = 27;

/// Named `highgui` window showing the crop and landmarks of the last face
pub struct PreviewWindow {
    canvas: Mat,
}

impl PreviewWindow {
    /// Open the window
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be created
    pub fn open() -> Result<Self> {
        highgui::named_window(WINDOW_NAME, WINDOW_NORMAL)?;
        info!("Preview window opened");
        Ok(Self { canvas: Mat::default() })
    }

    /// Draw `state` over `frame` and show it.
    ///
    /// Returns `true` when `q` or Esc was pressed.
    ///
    /// # Errors
    ///
    /// Returns an error if drawing or showing the frame fails
    pub fn show(&mut self, frame: &Mat, state: &FaceFrameState) -> Result<bool> {
        frame.copy_to(&mut self.canvas)?;
        draw_face(&mut self.canvas, state)?;
        highgui::imshow(WINDOW_NAME, &self.canvas)?;

        let key = highgui::wait_key(1)?;
        Ok(key == KEY_ESCAPE || key == i32::from(b'q'))
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(WINDOW_NAME) {
            log::debug!("Failed to close preview window: {}", e);
        } else {
            info!("Preview window closed");
        }
    }
}

/// Draw the crop rectangle, the landmarks and the pose readout onto `canvas`
///
/// # Errors
///
/// Returns an error if an `OpenCV` drawing call fails
pub fn draw_face(canvas: &mut Mat, state: &FaceFrameState) -> Result<()> {
    if state.crop_size.width <= 0 || state.crop_size.height <= 0 {
        return Ok(());
    }

    imgproc::rectangle(
        canvas,
        state.crop_rect(),
        Scalar::new(0.0, 255.0, 0.0, 0.0),
        2,
        LINE_8,
        0,
    )?;

    let (cols, rows) = (canvas.cols(), canvas.rows());
    for index in 0..NUM_LANDMARKS {
        if let Some((x, y)) = state.landmark_point(index) {
            imgproc::circle(
                canvas,
                Point::new(to_pixel(x, cols - 1), to_pixel(y, rows - 1)),
                2,
                Scalar::new(255.0, 0.0, 0.0, 0.0),
                -1,
                LINE_8,
                0,
            )?;
        }
    }

    let pose_text = format!(
        "Pitch: {:.1} Yaw: {:.1} Roll: {:.1}",
        state.pitch(),
        state.yaw(),
        state.roll()
    );
    imgproc::put_text(
        canvas,
        &pose_text,
        Point::new(state.crop_top_left.x, (state.crop_top_left.y - 10).max(15)),
        FONT_HERSHEY_SIMPLEX,
        0.5,
        Scalar::new(0.0, 255.0, 255.0, 0.0),
        1,
        LINE_8,
        false,
    )?;

    Ok(())
}
