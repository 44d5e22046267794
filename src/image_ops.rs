//! Low-level image operations used by the frame loop.
//!
//! Two implementations share the [`ImageOps`] trait: plain `Mat` calls on the
//! CPU, and the `OpenCV` transparent API (`UMat`) which runs on an `OpenCL`
//! device when one is present. The implementation is picked at startup.

use crate::constants::NETWORK_INPUT_SIDE;
use crate::Result;
use log::{info, warn};
use opencv::{
    core::{self, AccessFlag, Mat, Rect, Size, UMat, UMatUsageFlags, CV_32F},
    imgproc,
    prelude::*,
};

/// Image operations needed per frame
pub trait ImageOps {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Mirror `src` around the vertical axis
    fn flip_horizontal(&self, src: &Mat, dst: &mut Mat) -> Result<()>;

    /// Resize `src` to `size`
    fn resize(&self, src: &Mat, dst: &mut Mat, size: Size) -> Result<()>;

    /// Crop `roi`, resize it to the landmark network input and convert it to
    /// RGB `f32` pixels in `[0, 255]`
    fn crop_to_network_input(&self, src: &Mat, roi: Rect, dst: &mut Mat) -> Result<()>;
}

fn network_input_size() -> Size {
    Size::new(NETWORK_INPUT_SIDE, NETWORK_INPUT_SIDE)
}

/// Image operations on the CPU
#[derive(Debug, Default)]
pub struct CpuImageOps;

impl ImageOps for CpuImageOps {
    fn name(&self) -> &str {
        "cpu"
    }

    fn flip_horizontal(&self, src: &Mat, dst: &mut Mat) -> Result<()> {
        core::flip(src, dst, 1)?;
        Ok(())
    }

    fn resize(&self, src: &Mat, dst: &mut Mat, size: Size) -> Result<()> {
        imgproc::resize(src, dst, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
        Ok(())
    }

    fn crop_to_network_input(&self, src: &Mat, roi: Rect, dst: &mut Mat) -> Result<()> {
        let face = Mat::roi(src, roi)?.try_clone()?;

        let mut resized = Mat::default();
        imgproc::resize(&face, &mut resized, network_input_size(), 0.0, 0.0, imgproc::INTER_LINEAR)?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        rgb.convert_to(dst, CV_32F, 1.0, 0.0)?;
        Ok(())
    }
}

/// Image operations through `UMat`, offloaded to `OpenCL`
#[derive(Debug, Default)]
pub struct OpenClImageOps;

impl OpenClImageOps {
    fn upload(src: &Mat) -> Result<UMat> {
        Ok(src.get_umat(AccessFlag::ACCESS_READ, UMatUsageFlags::USAGE_DEFAULT)?)
    }

    fn scratch() -> Result<UMat> {
        Ok(Mat::default().get_umat(AccessFlag::ACCESS_RW, UMatUsageFlags::USAGE_DEFAULT)?)
    }

    fn download(src: &UMat, dst: &mut Mat) -> Result<()> {
        src.get_mat(AccessFlag::ACCESS_READ)?.copy_to(dst)?;
        Ok(())
    }
}

impl ImageOps for OpenClImageOps {
    fn name(&self) -> &str {
        "opencl"
    }

    fn flip_horizontal(&self, src: &Mat, dst: &mut Mat) -> Result<()> {
        let input = Self::upload(src)?;
        let mut output = Self::scratch()?;
        core::flip(&input, &mut output, 1)?;
        Self::download(&output, dst)
    }

    fn resize(&self, src: &Mat, dst: &mut Mat, size: Size) -> Result<()> {
        let input = Self::upload(src)?;
        let mut output = Self::scratch()?;
        imgproc::resize(&input, &mut output, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
        Self::download(&output, dst)
    }

    fn crop_to_network_input(&self, src: &Mat, roi: Rect, dst: &mut Mat) -> Result<()> {
        let face = Mat::roi(src, roi)?.try_clone()?;
        let input = Self::upload(&face)?;

        let mut resized = Self::scratch()?;
        imgproc::resize(&input, &mut resized, network_input_size(), 0.0, 0.0, imgproc::INTER_LINEAR)?;

        let mut rgb = Self::scratch()?;
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let mut converted = Self::scratch()?;
        rgb.convert_to(&mut converted, CV_32F, 1.0, 0.0)?;
        Self::download(&converted, dst)
    }
}

/// Pick the image operation backend.
///
/// # Errors
///
/// Returns an error if `OpenCV` cannot be queried for `OpenCL` support
pub fn create_image_ops(accelerated: bool) -> Result<Box<dyn ImageOps>> {
    if accelerated {
        if core::have_opencl()? {
            core::set_use_opencl(true)?;
            info!("Using OpenCL image operations");
            return Ok(Box::new(OpenClImageOps));
        }
        warn!("OpenCL is not available, falling back to CPU image operations");
    }

    core::set_use_opencl(false)?;
    info!("Using CPU image operations");
    Ok(Box::new(CpuImageOps))
}
