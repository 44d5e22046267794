//! Real-time webcam head tracking.
//!
//! Every frame runs through the same pipeline:
//! 1. Face detection on a downsized, mirrored copy of the frame
//! 2. A padded crop around the first face, fed to a heatmap landmark network
//! 3. Decoding of 66 landmarks from the heatmaps, with optional smoothing
//! 4. Pose estimation with `PnP` against an 18-point face contour model,
//!    followed by perspective correction and clamping
//! 5. A 48-byte UDP datagram carrying translation and rotation
//!
//! The configuration is a YAML file watched for changes; reloads are
//! debounced and applied between frames.
//!
//! # Examples
//!
//! ## Decoding heatmaps
//!
//! ```no_run
//! use head_pose_tracker::{
//!     face_crop::FaceCrop,
//!     face_data::FaceFrameState,
//!     landmark_decoder::{decode_landmarks, HeatmapView},
//! };
//! use opencv::core::{Rect, Size};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let heatmaps = vec![0.0f32; head_pose_tracker::constants::HEATMAP_TENSOR_LEN];
//! let mut state = FaceFrameState::default();
//!
//! let crop = FaceCrop::from_detection(Rect::new(100, 100, 50, 50), Size::new(640, 480));
//! crop.store(&mut state);
//! decode_landmarks(&HeatmapView::new(&heatmaps)?, &mut state);
//!
//! println!("Nose tip: {:?}", state.landmark_point(30));
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the tracker
//!
//! ```no_run
//! use head_pose_tracker::{
//!     app::{CancellationToken, Collaborators, FrameLoop},
//!     camera::OpenCvCamera,
//!     config::ProcessingConfig,
//!     face_detection::YuNetDetector,
//!     filters::ExponentialFilter,
//!     hot_reload::ConfigStore,
//!     image_ops::create_image_ops,
//!     mark_detection::MarkDetector,
//!     pose_estimation::OpenCvPnp,
//! };
//! use opencv::core::Size;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProcessingConfig::default();
//! let parts = Collaborators {
//!     camera: Box::new(OpenCvCamera::open(config.camera.index, &config.camera)?),
//!     detector: Box::new(YuNetDetector::new(&config.face_detection.model_path, Size::new(124, 93), 0.8, 0.5)?),
//!     landmark_model: Box::new(MarkDetector::new(&config.landmark_detection.model_path)?),
//!     image_ops: create_image_ops(false)?,
//!     pnp: Box::new(OpenCvPnp),
//!     noise_filter: Box::new(ExponentialFilter::default()),
//! };
//!
//! let mut frame_loop = FrameLoop::new(parts, ConfigStore::new(config), CancellationToken::new())?;
//! frame_loop.run()?;
//! # Ok(())
//! # }
//! ```

/// Per-frame face state
pub mod face_data;

/// Crop geometry around the detected face
pub mod face_crop;

/// Heatmap to landmark decoding
pub mod landmark_decoder;

/// Landmark smoothing filters
pub mod filters;

/// 3D face contour model
pub mod face_model;

/// Capture device and camera intrinsics
pub mod camera;

/// Head pose estimation module using `PnP` algorithm
pub mod pose_estimation;

/// Configuration management
pub mod config;

/// Debounced configuration reloads
pub mod hot_reload;

/// Face detection on the downsized frame
pub mod face_detection;

/// Landmark network inference
pub mod mark_detection;

/// CPU and `OpenCL` image operations
pub mod image_ops;

/// Diagnostic preview window
pub mod preview;

/// Frame loop orchestrating the pipeline
pub mod app;

/// UDP pose datagrams
pub mod pose_streamer;

/// Utility functions for image processing and coordinate transformations
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

pub use error::{Error, Result};
