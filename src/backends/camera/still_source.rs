// SPDX-License-Identifier: GPL-3.0-only

//! Still-image camera source
//!
//! Presents image files (or prepared frames) as cameras. The first source is
//! reported as the back camera, the second as the front camera, any further
//! ones as external. Each source can be opened by one binding at a time, the
//! same as a physical device.

use super::types::*;
use super::{CameraBackend, CameraStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

enum Source {
    File(PathBuf),
    Frame(CameraFrame),
}

struct Entry {
    device: CameraDevice,
    source: Source,
    claimed: AtomicBool,
}

/// Camera backend backed by still images
pub struct StillImageBackend {
    entries: Arc<Vec<Entry>>,
}

fn location_for(index: usize) -> CameraLocation {
    match index {
        0 => CameraLocation::Back,
        1 => CameraLocation::Front,
        _ => CameraLocation::External,
    }
}

impl StillImageBackend {
    /// One camera per image file
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        let entries = paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Entry {
                    device: CameraDevice {
                        name,
                        path: path.display().to_string(),
                        metadata_path: None,
                        rotation: SensorRotation::None,
                        location: location_for(index),
                    },
                    source: Source::File(path),
                    claimed: AtomicBool::new(false),
                }
            })
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    /// One camera per prepared frame, with the given device descriptions
    pub fn from_frames(frames: Vec<(CameraDevice, CameraFrame)>) -> Self {
        let entries = frames
            .into_iter()
            .map(|(device, frame)| Entry {
                device,
                source: Source::Frame(frame.to_copied()),
                claimed: AtomicBool::new(false),
            })
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Number of devices currently opened
    pub fn active_claims(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.claimed.load(Ordering::SeqCst))
            .count()
    }
}

impl Entry {
    fn load_frame(&self) -> BackendResult<CameraFrame> {
        match &self.source {
            Source::Frame(frame) => Ok(frame.to_copied()),
            Source::File(path) => {
                let image = image::open(path)
                    .map_err(|e| BackendError::IoError(format!("{}: {}", path.display(), e)))?;
                debug!(
                    path = %path.display(),
                    width = image.width(),
                    height = image.height(),
                    "Loaded still image"
                );
                Ok(CameraFrame::from_rgba_image(
                    image.to_rgba8(),
                    self.device.rotation,
                ))
            }
        }
    }
}

impl CameraBackend for StillImageBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::StillImage
    }

    fn is_available(&self) -> bool {
        !self.entries.is_empty()
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.entries.iter().map(|e| e.device.clone()).collect()
    }

    fn open(
        &self,
        device: &CameraDevice,
        binding_id: u64,
        preview: PreviewSender,
    ) -> BackendResult<Box<dyn CameraStream>> {
        let index = self
            .entries
            .iter()
            .position(|e| e.device.path == device.path)
            .ok_or_else(|| BackendError::DeviceNotFound(device.path.clone()))?;
        let entry = &self.entries[index];

        if entry
            .claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BackendError::DeviceBusy(entry.device.name.clone()));
        }

        let frame = match entry.load_frame() {
            Ok(frame) => frame,
            Err(e) => {
                entry.claimed.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        info!(device = %entry.device.name, binding = binding_id, "Opened still-image camera");

        let (frames, receiver) = watch::channel(Some(frame.clone()));
        let surface = PreviewSurface {
            binding_id,
            generation: 1,
            width: frame.width,
            height: frame.height,
            rotation: frame.rotation,
            frames: receiver,
        };
        if preview.unbounded_send(surface).is_err() {
            debug!("Preview receiver already gone");
        }

        Ok(Box::new(StillImageStream {
            entries: Arc::clone(&self.entries),
            index,
            frame,
            _frames: frames,
            released: false,
        }))
    }
}

/// An opened still-image camera; answers every still request immediately
struct StillImageStream {
    entries: Arc<Vec<Entry>>,
    index: usize,
    frame: CameraFrame,
    _frames: watch::Sender<Option<CameraFrame>>,
    released: bool,
}

impl StillImageStream {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.entries[self.index]
                .claimed
                .store(false, Ordering::SeqCst);
        }
    }
}

impl CameraStream for StillImageStream {
    fn device(&self) -> &CameraDevice {
        &self.entries[self.index].device
    }

    fn request_still(&self, reply: StillSender) {
        if reply.send(Ok(self.frame.to_copied())).is_err() {
            warn!("Still request dropped before the frame was delivered");
        }
    }

    fn cancel_still(&self) {}

    fn stop(mut self: Box<Self>) -> BackendResult<()> {
        info!(device = %self.entries[self.index].device.name, "Releasing still-image camera");
        self.release();
        Ok(())
    }
}

impl Drop for StillImageStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::oneshot;

    fn backend() -> StillImageBackend {
        let frame = CameraFrame::from_gray_image(
            image::GrayImage::from_pixel(8, 4, image::Luma([200])),
            SensorRotation::None,
        );
        let device = CameraDevice {
            name: "page".into(),
            path: "page".into(),
            metadata_path: None,
            rotation: SensorRotation::None,
            location: CameraLocation::Back,
        };
        StillImageBackend::from_frames(vec![(device, frame)])
    }

    #[tokio::test]
    async fn test_open_claims_device_once() {
        let backend = backend();
        let device = backend.enumerate_cameras().remove(0);
        let (tx, mut rx) = futures::channel::mpsc::unbounded();

        let stream = backend.open(&device, 1, tx.clone()).unwrap();
        assert_eq!(backend.active_claims(), 1);
        assert!(matches!(
            backend.open(&device, 2, tx),
            Err(BackendError::DeviceBusy(_))
        ));

        let surface = rx.next().await.unwrap();
        assert_eq!((surface.width, surface.height), (8, 4));

        stream.stop().unwrap();
        assert_eq!(backend.active_claims(), 0);
    }

    #[tokio::test]
    async fn test_still_request_is_answered() {
        let backend = backend();
        let device = backend.enumerate_cameras().remove(0);
        let (tx, _rx) = futures::channel::mpsc::unbounded();
        let stream = backend.open(&device, 1, tx).unwrap();

        let (reply, frame) = oneshot::channel();
        stream.request_still(reply);
        let frame = frame.await.unwrap().unwrap();
        assert_eq!(frame.width, 8);

        drop(stream);
        assert_eq!(backend.active_claims(), 0);
    }

    #[test]
    fn test_paths_get_locations_in_order() {
        let backend = StillImageBackend::from_paths(vec!["a.png".into(), "b.png".into()]);
        let devices = backend.enumerate_cameras();
        assert_eq!(devices[0].location, CameraLocation::Back);
        assert_eq!(devices[1].location, CameraLocation::Front);
        assert_eq!(devices[1].name, "b.png");
    }
}
