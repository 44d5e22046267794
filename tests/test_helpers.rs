//! Helper functions and collaborator doubles for tests

#![allow(dead_code)]

use head_pose_tracker::{
    app::{CancellationToken, Collaborators},
    camera::{CameraIntrinsics, FrameSource},
    config::{CameraConfig, ProcessingConfig},
    constants::{HEATMAP_CELLS, HEATMAP_SIDE, HEATMAP_TENSOR_LEN, NUM_LANDMARKS},
    face_detection::FaceDetector,
    filters::LandmarkFilter,
    image_ops::CpuImageOps,
    mark_detection::LandmarkModel,
    pose_estimation::PnpBackend,
    Result,
};
use ndarray::Array4;
use opencv::{
    core::{Mat, Rect, Scalar, Size, CV_8UC3},
    prelude::*,
};
use std::sync::{Arc, Mutex};

/// Create a test image with specified dimensions and type
pub fn create_test_image(height: i32, width: i32, cv_type: i32) -> Result<Mat> {
    Mat::zeros(height, width, cv_type)?.to_mat().map_err(Into::into)
}

/// Network output with one confidence peak per landmark.
///
/// `peak(landmark)` gives the (row, col) heatmap cell of each landmark and
/// every offset cell holds `offset_prob`.
pub fn heatmaps_with_peaks<F>(peak: F, offset_prob: f32) -> Vec<f32>
where
    F: Fn(usize) -> (usize, usize),
{
    let mut data = vec![0.0; HEATMAP_TENSOR_LEN];
    for landmark in 0..NUM_LANDMARKS {
        let (row, col) = peak(landmark);
        data[landmark * HEATMAP_CELLS + row * HEATMAP_SIDE + col] = 1.0;
    }
    for value in &mut data[NUM_LANDMARKS * HEATMAP_CELLS..] {
        *value = offset_prob;
    }
    data
}

/// Network output with every landmark peaking at the same cell
pub fn uniform_heatmaps(row: usize, col: usize) -> Vec<f32> {
    heatmaps_with_peaks(|_| (row, col), 0.5)
}

/// Probability whose bounded logit equals `value`
pub fn offset_probability(value: f32) -> f32 {
    1.0 / (1.0 + (-16.0 * value).exp())
}

/// Defaults with UDP streaming and preview off
pub fn quiet_config() -> ProcessingConfig {
    let mut config = ProcessingConfig::default();
    config.preview = false;
    config.open_track_udp_client.enabled = false;
    config
}

/// Capture device producing flat gray frames
pub struct MockCamera {
    pub size: Size,
    pub fail_reads: bool,
    pub applied: Arc<Mutex<Vec<CameraConfig>>>,
    pub stop_after: Option<(u64, CancellationToken)>,
    reads: u64,
}

impl MockCamera {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            size: Size::new(width, height),
            fail_reads: false,
            applied: Arc::new(Mutex::new(Vec::new())),
            stop_after: None,
            reads: 0,
        }
    }
}

impl FrameSource for MockCamera {
    fn apply_settings(&mut self, settings: &CameraConfig) -> Result<()> {
        self.size = Size::new(settings.width, settings.height);
        self.applied.lock().unwrap().push(settings.clone());
        Ok(())
    }

    fn resolution(&self) -> Result<Size> {
        Ok(self.size)
    }

    fn read_frame(&mut self, frame: &mut Mat) -> Result<bool> {
        self.reads += 1;
        if let Some((limit, token)) = &self.stop_after {
            if self.reads >= *limit {
                token.cancel();
            }
        }
        if self.fail_reads {
            return Ok(false);
        }
        *frame = Mat::new_rows_cols_with_default(self.size.height, self.size.width, CV_8UC3, Scalar::all(128.0))?;
        Ok(true)
    }
}

/// Detector returning the same boxes for every image
pub struct MockDetector {
    pub boxes: Arc<Mutex<Vec<Rect>>>,
    pub input_sizes: Arc<Mutex<Vec<Size>>>,
}

impl MockDetector {
    pub fn new(boxes: Vec<Rect>) -> Self {
        Self {
            boxes: Arc::new(Mutex::new(boxes)),
            input_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FaceDetector for MockDetector {
    fn set_input_size(&mut self, size: Size) -> Result<()> {
        self.input_sizes.lock().unwrap().push(size);
        Ok(())
    }

    fn detect(&mut self, _image: &Mat) -> Result<Vec<Rect>> {
        Ok(self.boxes.lock().unwrap().clone())
    }
}

/// Landmark model returning a fixed network output
pub struct MockLandmarkModel {
    pub heatmaps: Vec<f32>,
    pub calls: Arc<Mutex<usize>>,
}

impl MockLandmarkModel {
    pub fn new(heatmaps: Vec<f32>) -> Self {
        Self {
            heatmaps,
            calls: Arc::new(Mutex::new(0)),
        }
    }
}

impl LandmarkModel for MockLandmarkModel {
    fn infer(&mut self, input: Array4<f32>) -> Result<Vec<f32>> {
        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        *self.calls.lock().unwrap() += 1;
        Ok(self.heatmaps.clone())
    }
}

/// Arguments seen by one `PnP` call
#[derive(Debug, Clone)]
pub struct PnpCall {
    pub image_points: Vec<[f32; 2]>,
    pub seed_rotation: [f64; 3],
    pub seed_translation: [f64; 3],
    pub intrinsics: CameraIntrinsics,
}

/// `PnP` backend returning a fixed pose and recording its inputs
pub struct MockPnp {
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
    pub euler: [f64; 3],
    pub calls: Arc<Mutex<Vec<PnpCall>>>,
}

impl MockPnp {
    pub fn new(rotation: [f64; 3], translation: [f64; 3], euler: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
            euler,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl PnpBackend for MockPnp {
    fn solve(
        &self,
        object_points: &[[f64; 3]],
        image_points: &[[f32; 2]],
        intrinsics: &CameraIntrinsics,
        rvec: &mut [f64; 3],
        tvec: &mut [f64; 3],
    ) -> Result<()> {
        assert_eq!(object_points.len(), image_points.len());
        self.calls.lock().unwrap().push(PnpCall {
            image_points: image_points.to_vec(),
            seed_rotation: *rvec,
            seed_translation: *tvec,
            intrinsics: intrinsics.clone(),
        });
        *rvec = self.rotation;
        *tvec = self.translation;
        Ok(())
    }

    fn euler_angles(&self, _rvec: &[f64; 3], _tvec: &[f64; 3]) -> Result<[f64; 3]> {
        Ok(self.euler)
    }
}

/// Filter recording how often it ran
pub struct CountingFilter {
    pub runs: Arc<Mutex<usize>>,
}

impl LandmarkFilter for CountingFilter {
    fn apply(&mut self, _coords: &mut [f32]) {
        *self.runs.lock().unwrap() += 1;
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "CountingFilter"
    }
}

/// Doubles shared with the test after being handed to the frame loop
pub struct Probes {
    pub camera_settings: Arc<Mutex<Vec<CameraConfig>>>,
    pub detector_boxes: Arc<Mutex<Vec<Rect>>>,
    pub detector_sizes: Arc<Mutex<Vec<Size>>>,
    pub inferences: Arc<Mutex<usize>>,
    pub pnp_calls: Arc<Mutex<Vec<PnpCall>>>,
    pub filter_runs: Arc<Mutex<usize>>,
}

/// Collaborators around `camera` with a face box at `detection`
pub fn mock_collaborators(camera: MockCamera, detection: Option<Rect>, pnp: MockPnp) -> (Collaborators, Probes) {
    let detector = MockDetector::new(detection.into_iter().collect());
    let model = MockLandmarkModel::new(uniform_heatmaps(14, 14));
    let filter_runs = Arc::new(Mutex::new(0));

    let probes = Probes {
        camera_settings: Arc::clone(&camera.applied),
        detector_boxes: Arc::clone(&detector.boxes),
        detector_sizes: Arc::clone(&detector.input_sizes),
        inferences: Arc::clone(&model.calls),
        pnp_calls: Arc::clone(&pnp.calls),
        filter_runs: Arc::clone(&filter_runs),
    };

    let parts = Collaborators {
        camera: Box::new(camera),
        detector: Box::new(detector),
        landmark_model: Box::new(model),
        image_ops: Box::new(CpuImageOps),
        pnp: Box::new(pnp),
        noise_filter: Box::new(CountingFilter { runs: filter_runs }),
    };
    (parts, probes)
}

/// A pose facing the camera five units away
pub fn frontal_pnp() -> MockPnp {
    MockPnp::new([0.1, 0.2, 0.3], [0.0, 0.0, -5.0], [10.0, 20.0, 30.0])
}
