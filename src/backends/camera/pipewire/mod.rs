// SPDX-License-Identifier: MPL-2.0

//! PipeWire camera backend
//!
//! This backend uses PipeWire for camera enumeration and capture, with
//! GStreamer doing format negotiation and conversion.

mod enumeration;
mod pipeline;

pub use enumeration::{enumerate_pipewire_cameras, is_pipewire_available};
pub use pipeline::PipeWirePipeline;

use super::types::*;
use super::{CameraBackend, CameraStream};
use tracing::info;

/// PipeWire backend implementation
#[derive(Debug, Default)]
pub struct PipeWireBackend;

impl PipeWireBackend {
    /// Create a new PipeWire backend
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for PipeWireBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::PipeWire
    }

    fn is_available(&self) -> bool {
        is_pipewire_available()
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        info!("Using PipeWire backend for camera enumeration");

        match enumerate_pipewire_cameras() {
            Some(cameras) => {
                info!(count = cameras.len(), "PipeWire cameras enumerated");
                cameras
            }
            None => {
                info!("PipeWire enumeration returned None");
                Vec::new()
            }
        }
    }

    fn open(
        &self,
        device: &CameraDevice,
        binding_id: u64,
        preview: PreviewSender,
    ) -> BackendResult<Box<dyn CameraStream>> {
        let pipeline = PipeWirePipeline::new(device, binding_id, preview)?;
        Ok(Box::new(PipeWireStream {
            device: device.clone(),
            pipeline,
        }))
    }
}

/// An open PipeWire camera
struct PipeWireStream {
    device: CameraDevice,
    pipeline: PipeWirePipeline,
}

impl CameraStream for PipeWireStream {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn request_still(&self, reply: StillSender) {
        self.pipeline.request_still(reply);
    }

    fn cancel_still(&self) {
        self.pipeline.cancel_still();
    }

    fn stop(self: Box<Self>) -> BackendResult<()> {
        info!(device = %self.device.name, "Releasing PipeWire camera");
        self.pipeline.stop()
    }
}
