//! Configuration management for the head tracker
//!
//! The configuration is a YAML file whose keys mirror the settings surface
//! exposed to users (`Preview`, `FaceDetection.ResizeTo`, ...). Every load
//! produces an immutable [`ProcessingConfig`] snapshot; hot reloads replace
//! the snapshot wholesale (see [`crate::hot_reload`]).

use crate::constants::{LARGE_DETECTION_RESIZE, MIN_DETECTION_RESIZE};
use crate::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Process-wide processing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProcessingConfig {
    /// Show the preview window
    pub preview: bool,

    /// Face detection settings
    pub face_detection: FaceDetectionConfig,

    /// Landmark detection settings
    pub landmark_detection: LandmarkDetectionConfig,

    /// Pose datagram target
    pub open_track_udp_client: UdpClientConfig,

    /// Capture device settings
    pub camera: CameraConfig,

    /// Face model scale factors
    pub head_model: HeadModelConfig,

    /// Image operation backend
    pub image_processing: ImageProcessingConfig,
}

/// Face detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct FaceDetectionConfig {
    /// Width of the downsized detection image, at least 84
    pub resize_to: i32,

    /// Path to the face detection ONNX model (startup only)
    pub model_path: PathBuf,

    /// Minimum detection score (0.0-1.0)
    pub score_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub nms_threshold: f32,
}

/// Landmark detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LandmarkDetectionConfig {
    /// Smooth landmarks across frames
    pub noise_filter: bool,

    /// Path to the landmark ONNX model (startup only)
    pub model_path: PathBuf,
}

/// UDP pose streaming target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct UdpClientConfig {
    pub enabled: bool,
    pub host_name: String,
    pub port: u16,
}

/// Capture device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CameraConfig {
    /// Device index (startup only)
    pub index: i32,
    pub width: i32,
    pub height: i32,
    pub fps: i32,
    pub auto_focus: bool,
    /// Diagonal field of view in degrees, 0 to derive focal length from the image size
    pub fov: f64,
}

/// Per-axis scale of the 3D face model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HeadModelConfig {
    pub x_scale: f64,
    pub y_scale: f64,
    pub z_scale: f64,
}

/// Image operation backend selection (startup only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ImageProcessingConfig {
    /// Use the `OpenCL` backed implementation when available
    pub accelerated: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            preview: false,
            face_detection: FaceDetectionConfig::default(),
            landmark_detection: LandmarkDetectionConfig::default(),
            open_track_udp_client: UdpClientConfig::default(),
            camera: CameraConfig::default(),
            head_model: HeadModelConfig::default(),
            image_processing: ImageProcessingConfig::default(),
        }
    }
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            resize_to: 124,
            model_path: PathBuf::from("models/face_detection.onnx"),
            score_threshold: 0.8,
            nms_threshold: 0.5,
        }
    }
}

impl Default for LandmarkDetectionConfig {
    fn default() -> Self {
        Self {
            noise_filter: true,
            model_path: PathBuf::from("models/landmarks.onnx"),
        }
    }
}

impl Default for UdpClientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host_name: "localhost".to_string(),
            port: 4242,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
            auto_focus: true,
            fov: 56.0,
        }
    }
}

impl Default for HeadModelConfig {
    fn default() -> Self {
        Self {
            x_scale: 1.0,
            y_scale: 1.0,
            z_scale: 1.0,
        }
    }
}

impl Default for ImageProcessingConfig {
    fn default() -> Self {
        Self { accelerated: false }
    }
}

/// Flags derived by comparing a fresh snapshot with the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigChange {
    /// Camera parameters, intrinsics or detector input size must be reapplied
    pub needs_camera_restart: bool,
    /// A load happened
    pub was_reloaded: bool,
}

impl ConfigChange {
    /// Combine with a change that has not been consumed yet
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            needs_camera_restart: self.needs_camera_restart || other.needs_camera_restart,
            was_reloaded: self.was_reloaded || other.was_reloaded,
        }
    }
}

impl ProcessingConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and sanitize configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        Ok(config.sanitized())
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Clamp the detection resize target to its floor
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let resize_to = self.face_detection.resize_to;
        if resize_to < MIN_DETECTION_RESIZE {
            warn!("FaceDetection.ResizeTo {resize_to} is too small, using {MIN_DETECTION_RESIZE}");
            self.face_detection.resize_to = MIN_DETECTION_RESIZE;
        } else if resize_to > LARGE_DETECTION_RESIZE {
            warn!("FaceDetection.ResizeTo {resize_to} is large and may cause performance issues, consider lowering it");
        }
        self
    }

    /// Compare with the snapshot this one replaces
    #[must_use]
    pub fn diff(&self, previous: &Self) -> ConfigChange {
        let camera = &self.camera;
        let prev = &previous.camera;

        let needs_camera_restart = self.face_detection.resize_to != previous.face_detection.resize_to
            || camera.width != prev.width
            || camera.height != prev.height
            || camera.fps != prev.fps
            || camera.auto_focus != prev.auto_focus
            || camera.fov != prev.fov;

        ConfigChange {
            needs_camera_restart,
            was_reloaded: true,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let detection = &self.face_detection;
        if !(0.0..=1.0).contains(&detection.score_threshold) {
            return Err(Error::ConfigError(
                "Score threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&detection.nms_threshold) {
            return Err(Error::ConfigError(
                "NMS threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        let camera = &self.camera;
        if camera.width <= 0 || camera.height <= 0 {
            return Err(Error::ConfigError(format!(
                "Camera resolution must be positive, got {}x{}",
                camera.width, camera.height
            )));
        }
        if camera.fps <= 0 {
            return Err(Error::ConfigError("Camera FPS must be greater than 0".to_string()));
        }
        if !(0.0..180.0).contains(&camera.fov) {
            return Err(Error::ConfigError(
                "Camera FOV must be between 0 and 180 degrees".to_string(),
            ));
        }

        if self.open_track_udp_client.enabled && self.open_track_udp_client.host_name.trim().is_empty() {
            return Err(Error::ConfigError("UDP host name must not be empty".to_string()));
        }

        let model = &self.head_model;
        if [model.x_scale, model.y_scale, model.z_scale].iter().any(|s| *s <= 0.0 || !s.is_finite()) {
            return Err(Error::ConfigError("Head model scales must be positive".to_string()));
        }

        Ok(())
    }

    /// Check that the model files exist
    pub fn validate_model_paths(&self) -> Result<()> {
        for path in [&self.face_detection.model_path, &self.landmark_detection.model_path] {
            if !path.exists() {
                return Err(Error::ConfigError(format!("Model not found: {}", path.display())));
            }
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head tracker configuration. Changes are picked up while running.

# Show the camera preview with the face crop and landmarks
Preview: false

FaceDetection:
  # Width of the image handed to the face detector (minimum 84)
  ResizeTo: 124
  ModelPath: "models/face_detection.onnx"
  ScoreThreshold: 0.8
  NmsThreshold: 0.5

LandmarkDetection:
  NoiseFilter: true
  ModelPath: "models/landmarks.onnx"

OpenTrackUdpClient:
  Enabled: true
  HostName: "localhost"
  Port: 4242

Camera:
  Index: 0
  Width: 640
  Height: 480
  Fps: 30
  AutoFocus: true
  # Diagonal field of view in degrees
  Fov: 56.0

HeadModel:
  XScale: 1.0
  YScale: 1.0
  ZScale: 1.0

ImageProcessing:
  Accelerated: false
"#;
