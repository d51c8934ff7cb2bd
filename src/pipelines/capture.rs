// SPDX-License-Identifier: MPL-2.0

//! Camera binding and still capture
//!
//! A [`CapturePipeline`] holds at most one [`Binding`]: an open camera
//! stream plus the preview surfaces it announces. Binding always tears down
//! the previous binding first, so switching lenses never holds two devices.

use crate::backends::camera::types::*;
use crate::backends::camera::{CameraBackend, CameraStream};
use crate::errors::{BindError, CaptureError};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

/// A captured still frame
///
/// Produced once per [`CapturePipeline::capture`] call and consumed by the
/// decoder. Deliberately not `Clone`.
pub struct Frame {
    inner: CameraFrame,
}

impl Frame {
    /// Wrap a camera frame; mapped buffers are copied so the frame can
    /// outlive the stream that produced it
    pub fn new(frame: CameraFrame) -> Self {
        Self {
            inner: frame.to_copied(),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// Clockwise rotation that makes the frame upright
    pub fn rotation(&self) -> SensorRotation {
        self.inner.rotation
    }

    /// Raw pixel data and layout
    pub fn camera_frame(&self) -> &CameraFrame {
        &self.inner
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("format", &self.inner.format)
            .field("rotation", &self.inner.rotation)
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        trace!(
            width = self.inner.width,
            height = self.inner.height,
            age_ms = self.inner.captured_at.elapsed().as_millis() as u64,
            "Frame released"
        );
    }
}

/// Live association of a camera device with the pipeline
pub struct Binding {
    id: u64,
    lens: LensSelection,
    device: CameraDevice,
    stream: Box<dyn CameraStream>,
    preview: Option<PreviewReceiver>,
}

impl Binding {
    /// Monotonically increasing per pipeline
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lens(&self) -> LensSelection {
        self.lens
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("lens", &self.lens)
            .field("device", &self.device.name)
            .finish()
    }
}

/// Preview surfaces announced by one binding
///
/// Ends when the binding is torn down.
pub struct PreviewStream {
    binding_id: u64,
    surfaces: PreviewReceiver,
}

impl PreviewStream {
    pub fn binding_id(&self) -> u64 {
        self.binding_id
    }
}

impl Stream for PreviewStream {
    type Item = PreviewSurface;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.surfaces.poll_next_unpin(cx)
    }
}

/// Withdraws a pending still request if the capture future is dropped early
struct PendingStill<'a> {
    stream: &'a dyn CameraStream,
    armed: bool,
}

impl PendingStill<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingStill<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Capture abandoned, withdrawing still request");
            self.stream.cancel_still();
        }
    }
}

/// Owns the camera binding and serves one-shot still captures
pub struct CapturePipeline {
    backend: Arc<dyn CameraBackend>,
    capture_timeout: Option<Duration>,
    binding: Option<Binding>,
    last_binding_id: u64,
}

impl CapturePipeline {
    /// Create an unbound pipeline
    ///
    /// `capture_timeout` bounds each [`capture`](Self::capture) call; `None`
    /// waits for the backend indefinitely.
    pub fn new(backend: Arc<dyn CameraBackend>, capture_timeout: Option<Duration>) -> Self {
        Self {
            backend,
            capture_timeout,
            binding: None,
            last_binding_id: 0,
        }
    }

    /// Bind the camera matching `lens`, replacing any current binding
    pub fn bind(&mut self, lens: LensSelection) -> Result<&Binding, BindError> {
        self.unbind_all();

        let devices = self.backend.enumerate_cameras();
        let device = lens
            .select(&devices)
            .cloned()
            .ok_or(BindError::NoMatchingCamera(lens))?;

        self.last_binding_id += 1;
        let id = self.last_binding_id;
        let (announcer, surfaces) = futures::channel::mpsc::unbounded();

        let stream = self.backend.open(&device, id, announcer).map_err(|e| {
            warn!(device = %device.name, error = %e, "Failed to open camera");
            BindError::from(e)
        })?;

        info!(
            binding = id,
            lens = %lens,
            device = %device.name,
            backend = %self.backend.backend_type(),
            "Camera bound"
        );

        Ok(self.binding.insert(Binding {
            id,
            lens,
            device,
            stream,
            preview: Some(surfaces),
        }))
    }

    /// Tear down the current binding and release its device
    ///
    /// Safe to call repeatedly.
    pub fn unbind_all(&mut self) {
        if let Some(binding) = self.binding.take() {
            info!(binding = binding.id, device = %binding.device.name, "Unbinding camera");
            if let Err(e) = binding.stream.stop() {
                warn!(error = %e, "Camera did not stop cleanly");
            }
        }
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// The current binding's preview surfaces
    ///
    /// Handed out once per binding; later calls return `None` until the next
    /// successful [`bind`](Self::bind).
    pub fn preview_stream(&mut self) -> Option<PreviewStream> {
        let binding = self.binding.as_mut()?;
        let surfaces = binding.preview.take()?;
        Some(PreviewStream {
            binding_id: binding.id,
            surfaces,
        })
    }

    /// Capture one still frame from the bound camera
    ///
    /// Fails immediately with [`CaptureError::NotBound`] when nothing is
    /// bound. Dropping the returned future withdraws the request.
    pub async fn capture(&self) -> Result<Frame, CaptureError> {
        let binding = self.binding.as_ref().ok_or(CaptureError::NotBound)?;

        let (reply, response) = oneshot::channel();
        debug!(binding = binding.id, "Requesting still frame");
        binding.stream.request_still(reply);

        let pending = PendingStill {
            stream: binding.stream.as_ref(),
            armed: true,
        };

        let response = match self.capture_timeout {
            Some(limit) => match tokio::time::timeout(limit, response).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(binding = binding.id, timeout_ms = limit.as_millis() as u64, "Still capture timed out");
                    return Err(CaptureError::TimedOut(limit));
                }
            },
            None => response.await,
        };
        pending.disarm();

        match response {
            Ok(Ok(frame)) => {
                debug!(
                    binding = binding.id,
                    width = frame.width,
                    height = frame.height,
                    format = ?frame.format,
                    "Still frame received"
                );
                Ok(Frame::new(frame))
            }
            Ok(Err(e)) => {
                warn!(binding = binding.id, error = %e, "Still capture failed");
                Err(CaptureError::from(e))
            }
            // The stream dropped the reply without answering
            Err(_) => Err(CaptureError::BindingLost),
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.unbind_all();
    }
}
