// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │   CapturePipeline   │  ← binding lifecycle, one-shot stills
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← enumerate + open
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌────────┐ ┌──────────┐
//!  │PipeWire│ │StillImage│
//!  └────────┘ └──────────┘
//! ```

pub mod pipewire;
pub mod still_source;
pub mod types;

pub use types::*;

use std::path::PathBuf;
use std::sync::Arc;

/// Camera backend trait
///
/// A backend knows which cameras exist and how to open one. Opening hands out
/// an exclusive [`CameraStream`]; the device stays claimed until the stream
/// is stopped or dropped.
pub trait CameraBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Open a device and start its preview
    ///
    /// The stream announces every preview surface it allocates on `preview`.
    ///
    /// # Returns
    /// * `Ok(stream)` - Device claimed and streaming
    /// * `Err(BackendError::DeviceBusy)` - Device already claimed
    /// * `Err(BackendError)` - Device missing or failed to start
    fn open(
        &self,
        device: &CameraDevice,
        binding_id: u64,
        preview: PreviewSender,
    ) -> BackendResult<Box<dyn CameraStream>>;
}

/// An open, exclusively claimed camera
pub trait CameraStream: Send + Sync {
    /// The device this stream holds
    fn device(&self) -> &CameraDevice;

    /// Ask for the next still frame
    ///
    /// The reply arrives on `reply` once the frame is ready, or with an error
    /// if the capture fails. A new request replaces any pending one; the
    /// replaced request is answered with `BackendError::Cancelled`.
    fn request_still(&self, reply: StillSender);

    /// Withdraw a pending still request, if any
    fn cancel_still(&self);

    /// Stop streaming and release the device
    fn stop(self: Box<Self>) -> BackendResult<()>;
}

/// Create the backend selected in the configuration
///
/// `sources` feeds the still-image backend; it is ignored for PipeWire.
pub fn get_backend(
    backend_type: CameraBackendType,
    sources: Vec<PathBuf>,
) -> Arc<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::PipeWire => Arc::new(pipewire::PipeWireBackend::new()),
        CameraBackendType::StillImage => {
            Arc::new(still_source::StillImageBackend::from_paths(sources))
        }
    }
}
