//! Decoding of landmark heatmaps into full-frame pixel coordinates.
//!
//! The landmark network emits a `[3, 66, 28, 28]` tensor. Channel 0 holds a
//! confidence heatmap per landmark, channels 1 and 2 hold sub-cell offset
//! logits for the row and column axes at the same resolution. For each
//! landmark the decoder takes the first cell with the highest confidence,
//! refines it with the two offsets and maps it back through the face crop.

use crate::constants::{
    HEATMAP_CELLS, HEATMAP_SIDE, HEATMAP_TENSOR_LEN, LOGIT_EPSILON, LOGIT_FACTOR, NETWORK_INPUT_RESOLUTION,
    NETWORK_INPUT_SIDE, NUM_LANDMARKS,
};
use crate::face_data::FaceFrameState;
use crate::{Error, Result};

/// Length-checked view over a landmark network output
#[derive(Debug, Clone, Copy)]
pub struct HeatmapView<'a> {
    data: &'a [f32],
}

impl<'a> HeatmapView<'a> {
    /// Wrap a flat network output
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not hold exactly 3 × 66 × 28 × 28 values
    pub fn new(data: &'a [f32]) -> Result<Self> {
        if data.len() != HEATMAP_TENSOR_LEN {
            return Err(Error::ModelOutputError(format!(
                "Expected {HEATMAP_TENSOR_LEN} heatmap values, got {}",
                data.len()
            )));
        }
        Ok(Self { data })
    }

    /// Confidence heatmap of one landmark
    #[must_use]
    pub fn confidence(&self, landmark: usize) -> &'a [f32] {
        self.plane(0, landmark)
    }

    /// Row-axis offset logits of one landmark
    #[must_use]
    pub fn row_offsets(&self, landmark: usize) -> &'a [f32] {
        self.plane(1, landmark)
    }

    /// Column-axis offset logits of one landmark
    #[must_use]
    pub fn col_offsets(&self, landmark: usize) -> &'a [f32] {
        self.plane(2, landmark)
    }

    fn plane(&self, channel: usize, landmark: usize) -> &'a [f32] {
        let start = (channel * NUM_LANDMARKS + landmark) * HEATMAP_CELLS;
        &self.data[start..start + HEATMAP_CELLS]
    }
}

/// Bounded inverse sigmoid used for the sub-cell offsets
#[must_use]
pub fn logit(p: f32) -> f32 {
    let p = p.clamp(LOGIT_EPSILON, 1.0 - LOGIT_EPSILON);
    (p / (1.0 - p)).ln() / LOGIT_FACTOR
}

/// Index of the highest value, the lowest index winning ties
#[must_use]
pub fn argmax(values: &[f32]) -> usize {
    let mut best_index = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (index, &value) in values.iter().enumerate() {
        if value > best_value {
            best_index = index;
            best_value = value;
        }
    }
    best_index
}

/// Position on one axis of the 224 × 224 network input
#[allow(clippy::cast_precision_loss)] // Heatmap indices are below 28
fn network_position(cell: usize, offset_logit: f32) -> f32 {
    let base = NETWORK_INPUT_RESOLUTION * (cell as f32 / (HEATMAP_SIDE - 1) as f32);
    base + (NETWORK_INPUT_RESOLUTION * logit(offset_logit) + 0.1).floor()
}

/// Decode all landmarks into `state.landmarks`, using the crop already
/// stored in `state` to map network pixels back to the full frame.
///
/// Each landmark is written row axis first: the heatmap row, scaled by the
/// crop height and shifted by the crop top, lands in the first slot of the
/// pair; the column, scaled by the crop width and shifted by the crop left,
/// lands in the second.
#[allow(clippy::cast_precision_loss)]
pub fn decode_landmarks(heatmaps: &HeatmapView<'_>, state: &mut FaceFrameState) {
    let side = NETWORK_INPUT_SIDE as f32;
    let row_scale = state.crop_size.height as f32 / side;
    let col_scale = state.crop_size.width as f32 / side;
    let top = state.crop_top_left.y as f32;
    let left = state.crop_top_left.x as f32;

    for landmark in 0..NUM_LANDMARKS {
        let cell = argmax(heatmaps.confidence(landmark));
        let row = cell / HEATMAP_SIDE;
        let col = cell % HEATMAP_SIDE;

        let row_px = network_position(row, heatmaps.row_offsets(landmark)[cell]);
        let col_px = network_position(col, heatmaps.col_offsets(landmark)[cell]);

        state.landmarks[2 * landmark] = top + row_scale * row_px;
        state.landmarks[2 * landmark + 1] = left + col_scale * col_px;
    }
}
