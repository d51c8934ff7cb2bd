// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use gstreamer::buffer::{MappedBuffer, Readable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, watch};

/// Frame data storage - either pre-copied bytes or zero-copy GStreamer buffer
///
/// Preview frames keep the GStreamer buffer mapped (`Mapped`); stills handed to
/// the decoder are always `Copied` so they can outlive the pipeline.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (stills, image files, tests)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped GStreamer buffer
    Mapped(Arc<MappedBuffer<Readable>>),
}

impl FrameData {
    /// Create FrameData from a mapped GStreamer buffer (zero-copy)
    pub fn from_mapped_buffer(buffer: MappedBuffer<Readable>) -> Self {
        FrameData::Mapped(Arc::new(buffer))
    }

    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        match self {
            FrameData::Copied(data) => data.len(),
            FrameData::Mapped(buf) => buf.len(),
        }
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            FrameData::Mapped(buf) => write!(f, "FrameData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData::Copied(Arc::from(data.into_boxed_slice()))
    }
}

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// PipeWire backend (modern Linux standard)
    #[default]
    PipeWire,
    /// Image files presented as cameras
    StillImage,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::PipeWire => write!(f, "PipeWire"),
            CameraBackendType::StillImage => write!(f, "still image"),
        }
    }
}

/// Which way the scanner camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensSelection {
    /// World-facing camera (also picks up external webcams)
    #[default]
    Back,
    /// User-facing camera
    Front,
}

impl LensSelection {
    /// The other lens
    pub fn toggled(self) -> Self {
        match self {
            LensSelection::Back => LensSelection::Front,
            LensSelection::Front => LensSelection::Back,
        }
    }

    /// Pick the device this lens binds to
    ///
    /// `Front` only accepts front-mounted cameras. `Back` prefers back-mounted
    /// cameras and falls back to external or unlabelled ones, which is what a
    /// desktop webcam reports.
    pub fn select<'a>(&self, devices: &'a [CameraDevice]) -> Option<&'a CameraDevice> {
        match self {
            LensSelection::Front => devices
                .iter()
                .find(|d| d.location == CameraLocation::Front),
            LensSelection::Back => devices
                .iter()
                .find(|d| d.location == CameraLocation::Back)
                .or_else(|| {
                    devices.iter().find(|d| {
                        matches!(
                            d.location,
                            CameraLocation::External | CameraLocation::Unknown
                        )
                    })
                }),
        }
    }
}

impl std::fmt::Display for LensSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensSelection::Back => write!(f, "back"),
            LensSelection::Front => write!(f, "front"),
        }
    }
}

impl std::str::FromStr for LensSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "back" | "rear" | "world" => Ok(LensSelection::Back),
            "front" | "user" | "selfie" => Ok(LensSelection::Front),
            other => Err(format!("unknown lens '{}', expected 'back' or 'front'", other)),
        }
    }
}

/// Physical mounting of a camera, as reported by libcamera/PipeWire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraLocation {
    Front,
    Back,
    External,
    #[default]
    Unknown,
}

impl CameraLocation {
    /// Parse `api.libcamera.location` / `camera_location` property values
    pub fn from_property(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "front" | "0" => CameraLocation::Front,
            "back" | "1" => CameraLocation::Back,
            "external" | "2" => CameraLocation::External,
            _ => CameraLocation::Unknown,
        }
    }
}

impl std::fmt::Display for CameraLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraLocation::Front => write!(f, "front"),
            CameraLocation::Back => write!(f, "back"),
            CameraLocation::External => write!(f, "external"),
            CameraLocation::Unknown => write!(f, "unknown"),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// The clockwise rotation that turns the delivered image upright. Mobile
/// sensors are commonly mounted at 90° or 270° relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Parse rotation from a string value (degrees)
    pub fn from_degrees(degrees: &str) -> Self {
        degrees
            .trim()
            .parse::<i32>()
            .map(Self::from_degrees_int)
            .unwrap_or_default()
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String,                  // PipeWire target-object, or image file path
    pub metadata_path: Option<String>, // PipeWire node ID for `pw-cli info`
    pub rotation: SensorRotation,
    pub location: CameraLocation,
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// NV12 - Semi-planar 4:2:0 (Y plane followed by interleaved UV plane)
    NV12,
}

impl PixelFormat {
    /// Bytes per pixel of the first (or only) plane
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA => 4,
            Self::RGB24 => 3,
            Self::Gray8 | Self::NV12 => 1,
        }
    }

    /// Parse format from GStreamer format string
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "RGBA" | "RGBx" => Some(Self::RGBA),
            "RGB" => Some(Self::RGB24),
            "GRAY8" | "GREY" | "Y8" => Some(Self::Gray8),
            "NV12" => Some(Self::NV12),
            _ => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Frame data: RGBA/RGB pixels, gray pixels, or an NV12 Y plane followed by UV
    pub data: FrameData,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride of the first plane (bytes per row, may include padding)
    pub stride: u32,
    /// Clockwise rotation needed to make the frame upright
    pub rotation: SensorRotation,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap a decoded RGBA image (image files, rendered labels)
    pub fn from_rgba_image(image: image::RgbaImage, rotation: SensorRotation) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            width,
            height,
            data: FrameData::from(image.into_raw()),
            format: PixelFormat::RGBA,
            stride: width * 4,
            rotation,
            captured_at: Instant::now(),
        }
    }

    /// Wrap an 8-bit grayscale image
    pub fn from_gray_image(image: image::GrayImage, rotation: SensorRotation) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            width,
            height,
            data: FrameData::from(image.into_raw()),
            format: PixelFormat::Gray8,
            stride: width,
            rotation,
            captured_at: Instant::now(),
        }
    }

    /// Convert to a frame with copied data (safe for background processing)
    ///
    /// Mapped GStreamer buffers become invalid when the pipeline is destroyed.
    /// Use this method before sending frames to tasks that may outlive
    /// the pipeline.
    pub fn to_copied(&self) -> Self {
        let data = match &self.data {
            FrameData::Copied(data) => FrameData::Copied(Arc::clone(data)),
            FrameData::Mapped(buffer) => {
                let slice: &[u8] = buffer.as_ref();
                FrameData::Copied(Arc::from(slice))
            }
        };

        Self {
            data,
            ..self.clone()
        }
    }
}

/// A preview surface became ready (first frame or a caps change)
///
/// The view layer attaches rendering to `frames`, which always holds the
/// most recent preview frame of this surface.
#[derive(Debug, Clone)]
pub struct PreviewSurface {
    /// Which binding produced this surface
    pub binding_id: u64,
    /// Increments on every surface reallocation within one binding
    pub generation: u64,
    pub width: u32,
    pub height: u32,
    pub rotation: SensorRotation,
    /// Latest preview frame
    pub frames: watch::Receiver<Option<CameraFrame>>,
}

/// Sender half used by backends to announce preview surfaces
pub type PreviewSender = futures::channel::mpsc::UnboundedSender<PreviewSurface>;

/// Receiver half of the preview surface channel
pub type PreviewReceiver = futures::channel::mpsc::UnboundedReceiver<PreviewSurface>;

/// Reply channel for a one-shot still request
pub type StillSender = oneshot::Sender<BackendResult<CameraFrame>>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Camera is claimed by another binding or process
    DeviceBusy(String),
    /// Still capture failed
    CaptureFailed(String),
    /// The stream stopped while a request was pending
    StreamClosed,
    /// The pending request was withdrawn
    Cancelled,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::DeviceBusy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            BackendError::StreamClosed => write!(f, "Camera stream closed"),
            BackendError::Cancelled => write!(f, "Request cancelled"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, location: CameraLocation) -> CameraDevice {
        CameraDevice {
            name: name.to_string(),
            path: name.to_string(),
            metadata_path: None,
            rotation: SensorRotation::None,
            location,
        }
    }

    #[test]
    fn test_lens_selection_prefers_back_then_external() {
        let devices = vec![
            device("webcam", CameraLocation::External),
            device("selfie", CameraLocation::Front),
            device("main", CameraLocation::Back),
        ];
        assert_eq!(LensSelection::Back.select(&devices).unwrap().name, "main");
        assert_eq!(LensSelection::Front.select(&devices).unwrap().name, "selfie");

        let desktop = vec![device("webcam", CameraLocation::Unknown)];
        assert_eq!(LensSelection::Back.select(&desktop).unwrap().name, "webcam");
        assert!(LensSelection::Front.select(&desktop).is_none());
    }

    #[test]
    fn test_rotation_parsing() {
        assert_eq!(SensorRotation::from_degrees("90"), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees("-90"), SensorRotation::Rotate270);
        assert_eq!(SensorRotation::from_degrees("abc"), SensorRotation::None);
        assert!(SensorRotation::Rotate270.swaps_dimensions());
    }

    #[test]
    fn test_lens_from_str() {
        assert_eq!("Front".parse::<LensSelection>(), Ok(LensSelection::Front));
        assert_eq!("rear".parse::<LensSelection>(), Ok(LensSelection::Back));
        assert!("side".parse::<LensSelection>().is_err());
        assert_eq!(LensSelection::Back.toggled(), LensSelection::Front);
    }

    #[test]
    fn test_to_copied_keeps_layout() {
        let frame = CameraFrame::from_gray_image(
            image::GrayImage::from_pixel(4, 2, image::Luma([7])),
            SensorRotation::Rotate180,
        );
        let copy = frame.to_copied();
        assert_eq!(copy.width, 4);
        assert_eq!(copy.stride, 4);
        assert_eq!(copy.rotation, SensorRotation::Rotate180);
        assert_eq!(copy.data.len(), 8);
    }
}
