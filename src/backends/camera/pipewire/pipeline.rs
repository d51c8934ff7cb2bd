// SPDX-License-Identifier: MPL-2.0

//! PipeWire GStreamer pipeline for camera capture
//!
//! One pipeline serves both outputs of a binding: every sample updates the
//! preview surface, and a pending still request (if any) is answered with a
//! copy of the next sample.

use super::super::types::*;
use crate::constants::{pipeline as pipeline_consts, timing};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

type PendingStill = Arc<Mutex<Option<StillSender>>>;

/// Preview surface bookkeeping shared with the appsink callback
struct SurfaceState {
    binding_id: u64,
    rotation: SensorRotation,
    generation: u64,
    layout: Option<(u32, u32, PixelFormat)>,
    frames: Option<watch::Sender<Option<CameraFrame>>>,
    announcer: PreviewSender,
}

impl SurfaceState {
    /// Publish a frame, announcing a new surface when the layout changed
    fn publish(&mut self, frame: &CameraFrame) {
        let layout = (frame.width, frame.height, frame.format);
        if self.layout != Some(layout) || self.frames.is_none() {
            self.generation += 1;
            self.layout = Some(layout);
            let (sender, receiver) = watch::channel(None);
            self.frames = Some(sender);

            info!(
                binding = self.binding_id,
                generation = self.generation,
                width = frame.width,
                height = frame.height,
                "Preview surface allocated"
            );

            let surface = PreviewSurface {
                binding_id: self.binding_id,
                generation: self.generation,
                width: frame.width,
                height: frame.height,
                rotation: self.rotation,
                frames: receiver,
            };
            if self.announcer.unbounded_send(surface).is_err() {
                trace!("Nobody is listening for preview surfaces");
            }
        }

        if let Some(frames) = &self.frames {
            frames.send_replace(Some(frame.clone()));
        }
    }
}

/// PipeWire camera pipeline
///
/// `pipewiresrc ! videoconvert ! RGBA ! appsink`, started on creation and
/// stopped (device released) on [`PipeWirePipeline::stop`] or drop.
pub struct PipeWirePipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    pending: PendingStill,
    closed: Arc<AtomicBool>,
}

impl PipeWirePipeline {
    /// Create and start a PipeWire pipeline for `device`
    pub fn new(
        device: &CameraDevice,
        binding_id: u64,
        announcer: PreviewSender,
    ) -> BackendResult<Self> {
        info!(device = %device.name, binding = binding_id, "Creating PipeWire pipeline");

        gstreamer::init().map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        gstreamer::ElementFactory::find("pipewiresrc").ok_or_else(|| {
            BackendError::NotAvailable("pipewiresrc not available: factory not found".into())
        })?;

        let description = build_pipeline_string(&device.path);
        debug!(pipeline = %description, "Launching pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| {
                BackendError::InitializationFailed("Launch did not produce a pipeline".into())
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::InitializationFailed("Failed to get appsink".into()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| BackendError::InitializationFailed("Failed to cast appsink".into()))?;

        appsink.set_property("sync", false); // Lowest latency, we never present in sync
        appsink.set_property("max-buffers", pipeline_consts::MAX_BUFFERS);
        appsink.set_property("drop", true); // Drop old frames if processing is slow
        appsink.set_property("enable-last-sample", false);

        let pending: PendingStill = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));
        let surface = Arc::new(Mutex::new(SurfaceState {
            binding_id,
            rotation: device.rotation,
            generation: 0,
            layout: None,
            frames: None,
            announcer,
        }));

        let sample_pending = Arc::clone(&pending);
        let eos_pending = Arc::clone(&pending);
        let eos_closed = Arc::clone(&closed);
        let rotation = device.rotation;

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);

                    let sample = appsink.pull_sample().map_err(|e| {
                        error!(frame = frame_num, error = ?e, "Failed to pull sample");
                        gstreamer::FlowError::Eos
                    })?;

                    let Some(buffer) = sample.buffer_owned() else {
                        fail_pending(&sample_pending, "No buffer in sample");
                        return Ok(gstreamer::FlowSuccess::Ok);
                    };

                    // Incomplete DMA transfers show up as corrupted buffers;
                    // keep the preview running and fail only the still request
                    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
                        warn!(frame = frame_num, "Buffer marked as corrupted, skipping frame");
                        fail_pending(&sample_pending, "Corrupted frame from sensor");
                        return Ok(gstreamer::FlowSuccess::Ok);
                    }

                    let video_info = sample
                        .caps()
                        .and_then(|caps| VideoInfo::from_caps(caps).ok())
                        .ok_or_else(|| {
                            error!(frame = frame_num, "No usable caps in sample");
                            gstreamer::FlowError::Error
                        })?;

                    let map = buffer.into_mapped_buffer_readable().map_err(|_| {
                        error!(frame = frame_num, "Failed to map buffer");
                        gstreamer::FlowError::Error
                    })?;

                    let frame = CameraFrame {
                        width: video_info.width(),
                        height: video_info.height(),
                        data: FrameData::from_mapped_buffer(map),
                        format: PixelFormat::from_gst_format(video_info.format().to_str())
                            .unwrap_or(PixelFormat::RGBA),
                        stride: video_info.stride()[0] as u32,
                        rotation,
                        captured_at: Instant::now(),
                    };

                    if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                        debug!(
                            frame = frame_num,
                            width = frame.width,
                            height = frame.height,
                            stride = frame.stride,
                            "Preview frame"
                        );
                    }

                    surface
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .publish(&frame);

                    if let Some(reply) = take_pending(&sample_pending) {
                        debug!(frame = frame_num, "Answering still request");
                        // Receiver gone means the capture was cancelled
                        let _ = reply.send(Ok(frame.to_copied()));
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .eos(move |_| {
                    info!("Camera stream reached end of stream");
                    eos_closed.store(true, Ordering::SeqCst);
                    if let Some(reply) = take_pending(&eos_pending) {
                        let _ = reply.send(Err(BackendError::StreamClosed));
                    }
                })
                .build(),
        );

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to start pipeline: {}", e))
        })?;

        let (result, state, pending_state) = pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, pending = ?pending_state, "Pipeline state");

        if state != gstreamer::State::Playing {
            if let Some(message) = pop_bus_error(&pipeline) {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(BackendError::DeviceBusy(message));
            }
            warn!("Pipeline is not in PLAYING state yet");
        }

        info!("PipeWire camera initialization complete");

        Ok(Self {
            pipeline,
            appsink,
            pending,
            closed,
        })
    }

    /// Queue a one-shot still request, answered by the next sample
    pub fn request_still(&self, reply: StillSender) {
        if let Some(message) = pop_bus_error(&self.pipeline) {
            warn!(error = %message, "Camera pipeline reported an error");
            self.closed.store(true, Ordering::SeqCst);
        }

        if self.closed.load(Ordering::SeqCst) {
            let _ = reply.send(Err(BackendError::StreamClosed));
            return;
        }

        let replaced = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(reply);
        if let Some(previous) = replaced {
            let _ = previous.send(Err(BackendError::Cancelled));
        }
    }

    /// Drop a pending still request without answering it
    pub fn cancel_still(&self) {
        if take_pending(&self.pending).is_some() {
            debug!("Pending still request withdrawn");
        }
    }

    /// Stop the pipeline and release the camera
    pub fn stop(self) -> BackendResult<()> {
        info!("Stopping PipeWire pipeline");
        self.shutdown()
    }

    fn shutdown(&self) -> BackendResult<()> {
        // Clear appsink callbacks to release all references
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Some(reply) = take_pending(&self.pending) {
            let _ = reply.send(Err(BackendError::StreamClosed));
        }
        self.closed.store(true, Ordering::SeqCst);

        // Set pipeline to NULL state to release camera
        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| BackendError::Other(format!("Failed to stop pipeline: {}", e)))?;

        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        match result {
            Ok(_) => info!(state = ?state, "PipeWire pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline state change had issues"),
        }
        Ok(())
    }
}

impl Drop for PipeWirePipeline {
    fn drop(&mut self) {
        if self.pipeline.current_state() != gstreamer::State::Null {
            debug!("Dropping PipeWire pipeline - explicitly stopping");
            let _ = self.shutdown();
        }
    }
}

fn take_pending(pending: &Mutex<Option<StillSender>>) -> Option<StillSender> {
    pending.lock().unwrap_or_else(PoisonError::into_inner).take()
}

fn fail_pending(pending: &Mutex<Option<StillSender>>, reason: &str) {
    if let Some(reply) = take_pending(pending) {
        let _ = reply.send(Err(BackendError::CaptureFailed(reason.to_string())));
    }
}

/// Pop the first error message queued on the pipeline bus
fn pop_bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let message = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
    match message.view() {
        gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
        _ => None,
    }
}

/// Map a device path to the `pipewiresrc` property selecting it
fn target_property(device_path: &str) -> String {
    if device_path.is_empty() {
        // Empty path = PipeWire auto-select default camera
        String::new()
    } else if let Some(serial) = device_path.strip_prefix("pipewire-serial-") {
        format!("target-object={} ", serial)
    } else if let Some(node_id) = device_path.strip_prefix("pipewire-") {
        format!("target-object={} ", node_id)
    } else if device_path.starts_with("/dev/video") {
        format!("path=v4l2:{} ", device_path)
    } else {
        format!("target-object={} ", device_path)
    }
}

/// Build the launch string for a device
pub(crate) fn build_pipeline_string(device_path: &str) -> String {
    format!(
        "pipewiresrc {}do-timestamp=true ! \
         queue max-size-buffers={} leaky=downstream ! \
         videoconvert ! video/x-raw,format=RGBA ! \
         appsink name=sink",
        target_property(device_path),
        pipeline_consts::MAX_BUFFERS
    )
}
