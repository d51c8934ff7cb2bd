// SPDX-License-Identifier: GPL-3.0-only

//! Scripted camera backend and synthetic frames shared by the integration tests

#![allow(dead_code)]

use bookscan::backends::camera::types::*;
use bookscan::backends::camera::{CameraBackend, CameraStream};
use bookscan::barcode::ean13;
use image::imageops;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub const ISBN_KR: &str = "9780131103627";
pub const ISBN_GOF: &str = "9780201633610";

/// How a fake camera answers one still request
#[derive(Clone)]
pub enum StillReply {
    Frame(CameraFrame),
    Fail(String),
    /// Answer as if the stream stopped underneath the request
    Close,
    /// Keep the request pending until cancelled
    Hang,
}

#[derive(Default)]
pub struct FakeState {
    claimed: Mutex<HashSet<String>>,
    max_claims: AtomicUsize,
    opens: AtomicUsize,
    stops: AtomicUsize,
    cancels: AtomicUsize,
    requests: AtomicUsize,
    fail_open: AtomicBool,
    pending: Mutex<Option<StillSender>>,
    script: Mutex<VecDeque<StillReply>>,
    default_reply: Mutex<Option<StillReply>>,
}

/// Camera backend whose devices behave as scripted
pub struct FakeBackend {
    devices: Vec<CameraDevice>,
    state: Arc<FakeState>,
}

pub fn device(name: &str, location: CameraLocation) -> CameraDevice {
    CameraDevice {
        name: name.to_string(),
        path: format!("fake:{}", name),
        metadata_path: None,
        rotation: SensorRotation::None,
        location,
    }
}

impl FakeBackend {
    /// A phone-like backend: one back and one front camera
    pub fn phone(default_reply: StillReply) -> Arc<Self> {
        Self::with_devices(
            vec![
                device("main", CameraLocation::Back),
                device("selfie", CameraLocation::Front),
            ],
            default_reply,
        )
    }

    pub fn with_devices(devices: Vec<CameraDevice>, default_reply: StillReply) -> Arc<Self> {
        let state = FakeState::default();
        *state.default_reply.lock().unwrap() = Some(default_reply);
        Arc::new(Self {
            devices,
            state: Arc::new(state),
        })
    }

    /// Queue replies used before the default one
    pub fn script(&self, replies: impl IntoIterator<Item = StillReply>) {
        self.state.script.lock().unwrap().extend(replies);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Devices currently claimed
    pub fn claims(&self) -> usize {
        self.state.claimed.lock().unwrap().len()
    }

    /// Highest number of simultaneous claims seen
    pub fn max_claims(&self) -> usize {
        self.state.max_claims.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.state.cancels.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn has_pending(&self) -> bool {
        self.state.pending.lock().unwrap().is_some()
    }
}

impl CameraBackend for FakeBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::StillImage
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.devices.clone()
    }

    fn open(
        &self,
        device: &CameraDevice,
        binding_id: u64,
        preview: PreviewSender,
    ) -> BackendResult<Box<dyn CameraStream>> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(BackendError::InitializationFailed("scripted failure".into()));
        }

        {
            let mut claimed = self.state.claimed.lock().unwrap();
            if !claimed.insert(device.path.clone()) {
                return Err(BackendError::DeviceBusy(device.name.clone()));
            }
            self.state.max_claims.fetch_max(claimed.len(), Ordering::SeqCst);
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        let frame = blank_frame();
        let (frames, receiver) = watch::channel(Some(frame.clone()));
        let _ = preview.unbounded_send(PreviewSurface {
            binding_id,
            generation: 1,
            width: frame.width,
            height: frame.height,
            rotation: frame.rotation,
            frames: receiver,
        });

        Ok(Box::new(FakeStream {
            device: device.clone(),
            state: Arc::clone(&self.state),
            _frames: frames,
            _preview: preview,
            released: false,
        }))
    }
}

struct FakeStream {
    device: CameraDevice,
    state: Arc<FakeState>,
    _frames: watch::Sender<Option<CameraFrame>>,
    _preview: PreviewSender,
    released: bool,
}

impl FakeStream {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state.claimed.lock().unwrap().remove(&self.device.path);
            if let Some(pending) = self.state.pending.lock().unwrap().take() {
                let _ = pending.send(Err(BackendError::StreamClosed));
            }
        }
    }
}

impl CameraStream for FakeStream {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn request_still(&self, reply: StillSender) {
        self.state.requests.fetch_add(1, Ordering::SeqCst);
        let next = self.state.script.lock().unwrap().pop_front();
        let next = next.or_else(|| self.state.default_reply.lock().unwrap().clone());

        if let Some(previous) = self.state.pending.lock().unwrap().take() {
            let _ = previous.send(Err(BackendError::Cancelled));
        }

        match next {
            Some(StillReply::Frame(frame)) => {
                let _ = reply.send(Ok(frame));
            }
            Some(StillReply::Fail(msg)) => {
                let _ = reply.send(Err(BackendError::CaptureFailed(msg)));
            }
            Some(StillReply::Close) => {
                let _ = reply.send(Err(BackendError::StreamClosed));
            }
            Some(StillReply::Hang) | None => {
                *self.state.pending.lock().unwrap() = Some(reply);
            }
        }
    }

    fn cancel_still(&self) {
        if let Some(pending) = self.state.pending.lock().unwrap().take() {
            self.state.cancels.fetch_add(1, Ordering::SeqCst);
            let _ = pending.send(Err(BackendError::Cancelled));
        }
    }

    fn stop(mut self: Box<Self>) -> BackendResult<()> {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        self.release();
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Uniform mid-gray frame without any code
pub fn blank_frame() -> CameraFrame {
    CameraFrame::from_gray_image(
        image::GrayImage::from_pixel(320, 240, image::Luma([128])),
        SensorRotation::None,
    )
}

/// Sensor frame showing an EAN-13 label that needs `rotation` to be upright
pub fn label_frame(code: &str, rotation: SensorRotation) -> CameraFrame {
    let upright = ean13::render_label(code).expect("valid test code");
    let sensor = match rotation {
        SensorRotation::None => upright,
        SensorRotation::Rotate90 => imageops::rotate270(&upright),
        SensorRotation::Rotate180 => imageops::rotate180(&upright),
        SensorRotation::Rotate270 => imageops::rotate90(&upright),
    };
    CameraFrame::from_gray_image(sensor, rotation)
}

/// Sensor frame showing a QR code with `payload`
pub fn qr_frame(payload: &str) -> CameraFrame {
    let code = qrcode::QrCode::new(payload.as_bytes()).expect("payload fits a QR code");
    let image = code
        .render::<image::Luma<u8>>()
        .module_dimensions(6, 6)
        .build();
    CameraFrame::from_gray_image(image, SensorRotation::None)
}

/// RGBA variant of [`label_frame`], as a camera pipeline would deliver it
pub fn label_frame_rgba(code: &str) -> CameraFrame {
    let gray = ean13::render_label(code).expect("valid test code");
    let rgba = image::DynamicImage::ImageLuma8(gray).to_rgba8();
    CameraFrame::from_rgba_image(rgba, SensorRotation::None)
}
