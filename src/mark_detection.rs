//! Landmark network inference.

use crate::constants::{HEATMAP_TENSOR_LEN, NETWORK_INPUT_SIDE};
use crate::{Error, Result};
use ndarray::{Array4, CowArray};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Inference collaborator contract: a normalized `[1, 3, 224, 224]` tensor
/// in, a flat `[3, 66, 28, 28]` heatmap buffer out
pub trait LandmarkModel {
    fn infer(&mut self, input: Array4<f32>) -> Result<Vec<f32>>;
}

/// Heatmap landmark detector using `ONNX` Runtime
pub struct MarkDetector {
    session: Session,
}

impl MarkDetector {
    /// Create a new landmark detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs or outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!(
            "Initializing MarkDetector with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("mark_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelError("Model has no inputs".to_string()))?
            .name
            .clone();

        if session.outputs.is_empty() {
            return Err(Error::ModelError("Model has no outputs".to_string()));
        }

        log::debug!("Landmark model input tensor: {}", input_name);

        Ok(Self { session })
    }
}

impl LandmarkModel for MarkDetector {
    #[allow(clippy::cast_sign_loss)] // Network input side is positive
    fn infer(&mut self, input: Array4<f32>) -> Result<Vec<f32>> {
        let side = NETWORK_INPUT_SIDE as usize;
        if input.shape() != [1, 3, side, side] {
            return Err(Error::InvalidInput(format!(
                "Expected input shape [1, 3, {side}, {side}], got {:?}",
                input.shape()
            )));
        }

        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        let heatmaps_output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;

        let heatmaps_tensor = heatmaps_output.try_extract::<f32>()?;
        let heatmaps_view = heatmaps_tensor.view();
        let heatmaps: Vec<f32> = heatmaps_view.iter().copied().collect();

        if heatmaps.len() != HEATMAP_TENSOR_LEN {
            return Err(Error::ModelOutputError(format!(
                "Expected {HEATMAP_TENSOR_LEN} output values, got {}",
                heatmaps.len()
            )));
        }

        Ok(heatmaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tensor_length() {
        assert_eq!(HEATMAP_TENSOR_LEN, 3 * 66 * 28 * 28);
    }

    #[test]
    #[ignore = "Requires the landmark ONNX model"]
    fn test_inference_output_shape() {
        let mut detector = MarkDetector::new("models/landmarks.onnx").unwrap();
        let input = Array4::<f32>::zeros((1, 3, 224, 224));
        let heatmaps = detector.infer(input).unwrap();
        assert_eq!(heatmaps.len(), HEATMAP_TENSOR_LEN);
    }

    #[test]
    #[ignore = "Requires the landmark ONNX model"]
    fn test_rejects_wrong_input_shape() {
        let mut detector = MarkDetector::new("models/landmarks.onnx").unwrap();
        let input = Array4::<f32>::zeros((1, 3, 128, 128));
        assert!(detector.infer(input).is_err());
    }
}
