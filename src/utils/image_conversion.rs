//! Conversion of the cropped face image into the landmark network tensor.

use crate::constants::{CHANNEL_MEAN, CHANNEL_STD, NETWORK_INPUT_SIDE, NETWORK_INPUT_STRIDE};
use crate::{Error, Result};
use ndarray::Array4;
use opencv::core::{Mat, Vec3f, CV_32FC3};
use opencv::prelude::*;

/// Normalize one channel value: `v / (std * 255) - mean / std`
#[must_use]
pub fn normalize_channel(value: f32, channel: usize) -> f32 {
    value / (CHANNEL_STD[channel] * 255.0) - CHANNEL_MEAN[channel] / CHANNEL_STD[channel]
}

/// Normalize interleaved RGB pixels into a channel-major `[1, 3, 224, 224]`
/// tensor
///
/// # Errors
///
/// Returns an error if the iterator does not yield exactly 224 × 224 pixels
#[allow(clippy::cast_sign_loss)] // Network input side is positive
pub fn normalize_pixels<I>(pixels: I) -> Result<Array4<f32>>
where
    I: IntoIterator<Item = [f32; 3]>,
{
    let side = NETWORK_INPUT_SIDE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    let data = tensor
        .as_slice_mut()
        .ok_or_else(|| Error::InvalidInput("Network tensor is not contiguous".to_string()))?;

    let mut count = 0;
    for (index, pixel) in pixels.into_iter().enumerate() {
        if index >= NETWORK_INPUT_STRIDE {
            return Err(Error::InvalidInput(format!(
                "Network input has more than {NETWORK_INPUT_STRIDE} pixels"
            )));
        }
        for (channel, &value) in pixel.iter().enumerate() {
            data[channel * NETWORK_INPUT_STRIDE + index] = normalize_channel(value, channel);
        }
        count = index + 1;
    }

    if count != NETWORK_INPUT_STRIDE {
        return Err(Error::InvalidInput(format!(
            "Network input needs {NETWORK_INPUT_STRIDE} pixels, got {count}"
        )));
    }

    Ok(tensor)
}

/// Normalize a 224 × 224 RGB `f32` image into the network tensor
///
/// # Errors
///
/// Returns an error if the image has the wrong type or size
pub fn normalize_and_transpose(image: &Mat) -> Result<Array4<f32>> {
    if image.typ() != CV_32FC3 || image.rows() != NETWORK_INPUT_SIDE || image.cols() != NETWORK_INPUT_SIDE {
        return Err(Error::InvalidInput(format!(
            "Expected a {NETWORK_INPUT_SIDE}x{NETWORK_INPUT_SIDE} CV_32FC3 image, got {}x{} of type {}",
            image.cols(),
            image.rows(),
            image.typ()
        )));
    }

    let pixels = image.data_typed::<Vec3f>()?;
    normalize_pixels(pixels.iter().map(|p| p.0))
}
