// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner
//!
//! The taxonomy follows the scan flow: binding a camera, capturing a still,
//! decoding it. A frame without a barcode is not an error (the decoder
//! returns `Ok(None)`), so there is no variant for it here.

use crate::backends::camera::types::{BackendError, LensSelection};
use std::fmt;
use std::time::Duration;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera binding errors
    Bind(BindError),
    /// Still capture errors
    Capture(CaptureError),
    /// Barcode decoding errors
    Decode(DecodeError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Errors raised while binding a camera to the capture pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// No camera matches the requested lens
    NoMatchingCamera(LensSelection),
    /// The device exists but could not be opened (claimed elsewhere, hardware fault)
    DeviceUnavailable(String),
}

/// Errors raised by a one-shot still capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// `capture()` was called with no binding established
    NotBound,
    /// The backend reported a failure while producing the still
    Failed(String),
    /// The camera stream went away; the binding has to be rebuilt
    BindingLost,
    /// No frame arrived within the configured capture timeout
    TimedOut(Duration),
    /// The request was withdrawn before the frame arrived
    Cancelled,
}

/// Errors raised while decoding a frame
///
/// Only malformed image data ends up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame has zero width or height
    EmptyFrame,
    /// Buffer does not match the declared layout
    Malformed(String),
    /// The blocking decode task panicked or was cancelled
    TaskFailed(String),
}

/// Errors surfaced by the scan orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Lens switching is refused while a capture is in flight
    LensLocked,
    /// Capture requested while no camera is ready
    NotReady,
    Bind(BindError),
    Capture(CaptureError),
    Decode(DecodeError),
}

impl CaptureError {
    /// Whether the binding has to be rebuilt before the next capture
    pub fn loses_binding(&self) -> bool {
        matches!(self, CaptureError::BindingLost)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Bind(e) => write!(f, "Camera error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Decode(e) => write!(f, "Decode error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::NoMatchingCamera(lens) => write!(f, "No {} camera found", lens),
            BindError::DeviceUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NotBound => write!(f, "No camera is bound"),
            CaptureError::Failed(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::BindingLost => write!(f, "Camera stream was lost"),
            CaptureError::TimedOut(after) => {
                write!(f, "Capture timed out after {} ms", after.as_millis())
            }
            CaptureError::Cancelled => write!(f, "Capture cancelled"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::EmptyFrame => write!(f, "Frame is empty"),
            DecodeError::Malformed(msg) => write!(f, "Malformed frame: {}", msg),
            DecodeError::TaskFailed(msg) => write!(f, "Decoder task failed: {}", msg),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::LensLocked => write!(f, "Cannot switch camera while scanning"),
            ScanError::NotReady => write!(f, "Camera is not ready"),
            ScanError::Bind(e) => write!(f, "{}", e),
            ScanError::Capture(e) => write!(f, "{}", e),
            ScanError::Decode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ScanError {}
impl std::error::Error for BindError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for DecodeError {}

impl From<BindError> for AppError {
    fn from(err: BindError) -> Self {
        AppError::Bind(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Decode(err)
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Bind(e) => AppError::Bind(e),
            ScanError::Capture(e) => AppError::Capture(e),
            ScanError::Decode(e) => AppError::Decode(e),
            other => AppError::Other(other.to_string()),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<BackendError> for BindError {
    fn from(err: BackendError) -> Self {
        BindError::DeviceUnavailable(err.to_string())
    }
}

impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::StreamClosed => CaptureError::BindingLost,
            BackendError::Cancelled => CaptureError::Cancelled,
            other => CaptureError::Failed(other.to_string()),
        }
    }
}
