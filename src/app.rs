//! Frame loop: capture, detect, decode, filter, solve and stream, one frame
//! per iteration.

use crate::{
    camera::{CameraIntrinsics, FrameSource},
    config::{ProcessingConfig, UdpClientConfig},
    error::Result,
    face_crop::{DetectionScale, FaceCrop},
    face_data::FaceFrameState,
    face_detection::FaceDetector,
    face_model::FaceModel3D,
    filters::LandmarkFilter,
    hot_reload::ConfigStore,
    image_ops::ImageOps,
    landmark_decoder::{decode_landmarks, HeatmapView},
    mark_detection::LandmarkModel,
    pose_estimation::{PnpBackend, PoseSolver, SolveOutcome},
    pose_streamer::PoseStreamer,
    preview::PreviewWindow,
    utils::image_conversion::normalize_and_transpose,
};
use log::{debug, info, warn};
use opencv::{
    core::{Mat, Rect, Size},
    prelude::*,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative stop signal checked once per iteration
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Lifecycle of the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Built, not started
    Idle,
    /// Iterating
    Running,
    /// Cancelled or failed
    Stopped,
}

/// What happened during one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// No frame was captured; nothing else ran
    CaptureFailed,
    /// The detector found no face; the previous pose was kept
    NoFace,
    /// The padded crop had no area; the previous pose was kept
    DegenerateCrop,
    /// A new pose was written
    PoseSolved,
    /// The solver output was not finite; the previous pose was kept
    SolveRejected,
}

/// External collaborators driven by the frame loop
pub struct Collaborators {
    pub camera: Box<dyn FrameSource>,
    pub detector: Box<dyn FaceDetector>,
    pub landmark_model: Box<dyn LandmarkModel>,
    pub image_ops: Box<dyn ImageOps>,
    pub pnp: Box<dyn PnpBackend>,
    pub noise_filter: Box<dyn LandmarkFilter>,
}

/// Single-threaded pipeline owner.
///
/// The loop is the only user of the face state, the solver priors, the
/// filter history and the capture, detection and inference resources.
/// Configuration changes reach it through the [`ConfigStore`] and are
/// applied at the end of an iteration.
pub struct FrameLoop {
    camera: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    landmark_model: Box<dyn LandmarkModel>,
    image_ops: Box<dyn ImageOps>,
    noise_filter: Box<dyn LandmarkFilter>,
    solver: PoseSolver,
    streamer: Option<PoseStreamer>,
    preview: Option<PreviewWindow>,
    config: Arc<ProcessingConfig>,
    store: ConfigStore,
    cancel: CancellationToken,
    state: FaceFrameState,
    loop_state: LoopState,
    frame_size: Size,
    detection_scale: DetectionScale,
    frame: Mat,
    mirrored: Mat,
    detection_input: Mat,
    network_input: Mat,
    frame_count: u64,
}

impl FrameLoop {
    /// Wire the collaborators to the current configuration in `store`
    ///
    /// # Errors
    ///
    /// Returns an error if the camera resolution cannot be read, the
    /// detector rejects its input size or the preview window cannot open
    pub fn new(parts: Collaborators, store: ConfigStore, cancel: CancellationToken) -> Result<Self> {
        let config = store.current();
        info!("Initializing frame loop with {} image operations", parts.image_ops.name());

        let frame_size = parts.camera.resolution()?;
        let model = FaceModel3D::new(
            config.head_model.x_scale,
            config.head_model.y_scale,
            config.head_model.z_scale,
        );
        let intrinsics = CameraIntrinsics::from_fov(frame_size.width, frame_size.height, config.camera.fov);
        let solver = PoseSolver::new(parts.pnp, &model, intrinsics);

        let detection_scale = DetectionScale::new(frame_size, config.face_detection.resize_to)?;
        let mut detector = parts.detector;
        detector.set_input_size(detection_scale.detection_size)?;

        let streamer = build_streamer(&config.open_track_udp_client);
        let preview = if config.preview { Some(PreviewWindow::open()?) } else { None };

        Ok(Self {
            camera: parts.camera,
            detector,
            landmark_model: parts.landmark_model,
            image_ops: parts.image_ops,
            noise_filter: parts.noise_filter,
            solver,
            streamer,
            preview,
            config,
            store,
            cancel,
            state: FaceFrameState::default(),
            loop_state: LoopState::Idle,
            frame_size,
            detection_scale,
            frame: Mat::default(),
            mirrored: Mat::default(),
            detection_input: Mat::default(),
            network_input: Mat::default(),
            frame_count: 0,
        })
    }

    /// Most recent face state
    #[must_use]
    pub fn state(&self) -> &FaceFrameState {
        &self.state
    }

    #[must_use]
    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    /// Configuration snapshot currently applied
    #[must_use]
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    #[must_use]
    pub fn detection_scale(&self) -> &DetectionScale {
        &self.detection_scale
    }

    #[must_use]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        self.solver.intrinsics()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streamer.is_some()
    }

    /// Frames captured so far
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Iterate until cancelled
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a collaborator other than a
    /// capture failure
    pub fn run(&mut self) -> Result<()> {
        info!("Starting frame loop");
        self.loop_state = LoopState::Running;
        let result = self.run_until_cancelled();
        self.loop_state = LoopState::Stopped;
        info!("Frame loop stopped after {} frames", self.frame_count);
        result
    }

    #[allow(clippy::cast_precision_loss)] // Frame counts stay far below 2^52
    fn run_until_cancelled(&mut self) -> Result<()> {
        let mut last_report = Instant::now();
        let mut frames_at_report = self.frame_count;

        while !self.cancel.is_cancelled() {
            let outcome = self.step()?;
            debug!("Iteration outcome: {:?}", outcome);

            let elapsed = last_report.elapsed();
            if elapsed >= Duration::from_secs(5) {
                let fps = (self.frame_count - frames_at_report) as f64 / elapsed.as_secs_f64();
                debug!("Processing at {:.1} FPS", fps);
                last_report = Instant::now();
                frames_at_report = self.frame_count;
            }
        }
        Ok(())
    }

    /// Run one iteration
    ///
    /// # Errors
    ///
    /// Returns an error if detection, inference, solving or reapplying the
    /// configuration fails
    pub fn step(&mut self) -> Result<IterationOutcome> {
        match self.camera.read_frame(&mut self.frame) {
            Ok(true) => {}
            Ok(false) => {
                warn!("Failed to capture frame, retrying");
                return Ok(IterationOutcome::CaptureFailed);
            }
            Err(e) => {
                warn!("Failed to capture frame: {}", e);
                return Ok(IterationOutcome::CaptureFailed);
            }
        }
        self.frame_count += 1;

        self.image_ops.flip_horizontal(&self.frame, &mut self.mirrored)?;
        let size = self.mirrored.size()?;
        if size != self.frame_size {
            info!(
                "Frame size changed from {}x{} to {}x{}",
                self.frame_size.width, self.frame_size.height, size.width, size.height
            );
            self.resync_geometry(size)?;
        }

        self.image_ops
            .resize(&self.mirrored, &mut self.detection_input, self.detection_scale.detection_size)?;

        let outcome = match self.detector.detect(&self.detection_input)?.first() {
            Some(&bbox) => self.process_face(bbox)?,
            None => IterationOutcome::NoFace,
        };

        if let Some(streamer) = &self.streamer {
            if let Err(e) = streamer.send(&self.state) {
                warn!("Failed to send pose datagram: {}", e);
            }
        }

        if let Some(preview) = &mut self.preview {
            if preview.show(&self.mirrored, &self.state)? {
                info!("Exit requested from preview window");
                self.cancel.cancel();
            }
        }

        self.apply_pending_config()?;
        Ok(outcome)
    }

    fn process_face(&mut self, detection: Rect) -> Result<IterationOutcome> {
        let bbox = self.detection_scale.to_frame(detection);
        let crop = FaceCrop::from_detection(bbox, self.frame_size);
        if crop.is_degenerate() {
            debug!("Skipping face outside the frame: {:?}", bbox);
            return Ok(IterationOutcome::DegenerateCrop);
        }
        crop.store(&mut self.state);

        self.image_ops
            .crop_to_network_input(&self.mirrored, crop.rect(), &mut self.network_input)?;
        let input = normalize_and_transpose(&self.network_input)?;
        let heatmaps = self.landmark_model.infer(input)?;
        decode_landmarks(&HeatmapView::new(&heatmaps)?, &mut self.state);

        if self.config.landmark_detection.noise_filter {
            self.noise_filter.apply(&mut self.state.landmarks);
        }

        Ok(match self.solver.solve(&mut self.state)? {
            SolveOutcome::Solved => IterationOutcome::PoseSolved,
            SolveOutcome::Rejected => IterationOutcome::SolveRejected,
        })
    }

    /// Rebuild everything derived from the frame size
    fn resync_geometry(&mut self, frame_size: Size) -> Result<()> {
        self.frame_size = frame_size;
        self.detection_scale = DetectionScale::new(frame_size, self.config.face_detection.resize_to)?;
        self.detector.set_input_size(self.detection_scale.detection_size)?;
        self.solver.set_intrinsics(CameraIntrinsics::from_fov(
            frame_size.width,
            frame_size.height,
            self.config.camera.fov,
        ));
        info!(
            "Detection input {}x{}, intrinsics for {}x{}",
            self.detection_scale.detection_size.width,
            self.detection_scale.detection_size.height,
            frame_size.width,
            frame_size.height
        );
        Ok(())
    }

    /// Apply the configuration published since the last iteration, if any
    fn apply_pending_config(&mut self) -> Result<()> {
        let Some(update) = self.store.take_update() else {
            return Ok(());
        };
        let previous = std::mem::replace(&mut self.config, update.config);
        info!("Applying reloaded configuration");

        if self.config.preview != self.preview.is_some() {
            self.preview = if self.config.preview { Some(PreviewWindow::open()?) } else { None };
        }

        if self.config.open_track_udp_client != previous.open_track_udp_client {
            self.streamer = build_streamer(&self.config.open_track_udp_client);
        }

        if update.change.needs_camera_restart {
            info!("Reapplying camera settings");
            self.camera.apply_settings(&self.config.camera)?;
            let resolution = self.camera.resolution()?;
            self.resync_geometry(resolution)?;
        }

        Ok(())
    }
}

/// Streamer for `settings`, or `None` when disabled or unreachable
fn build_streamer(settings: &UdpClientConfig) -> Option<PoseStreamer> {
    if !settings.enabled {
        info!("UDP pose streaming disabled");
        return None;
    }
    match PoseStreamer::new(&settings.host_name, settings.port) {
        Ok(streamer) => Some(streamer),
        Err(e) => {
            warn!(
                "Cannot stream pose to {}:{}: {}",
                settings.host_name, settings.port, e
            );
            None
        }
    }
}
