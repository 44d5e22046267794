//! Error types for the head tracking library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File or socket I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File system watcher failed
    #[error("Config watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model loading error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model output has an unexpected shape
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
