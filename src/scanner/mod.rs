// SPDX-License-Identifier: GPL-3.0-only

//! Scan orchestration
//!
//! ```text
//!  Idle ──show()──▶ Binding ──bound──▶ Ready ──capture()──▶ Capturing ──▶ Decoding
//!   ▲                  ▲                 ▲                                   │
//!   │                  └── binding lost ─┼───────────────────────────────────┤
//!   │                                    └── no code / error ────────────────┤
//!   └──────────────────────────── code found ────────────────────────────────┘
//! ```
//!
//! [`ScanOrchestrator`] composes a [`CapturePipeline`] and a
//! [`BarcodeDecoder`] into the scan action behind the scanner screen. UI state
//! is published through a `watch` channel as [`ScanView`].

pub mod screen;

pub use screen::{ScanCommand, ScanExit, ScanScreenHandle, spawn_scan_screen};

use crate::backends::camera::{CameraBackend, LensSelection};
use crate::barcode::{BarcodeDecoder, DecodedCode, SymbologySet};
use crate::config::Config;
use crate::errors::ScanError;
use crate::pipelines::{CapturePipeline, PreviewStream};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Scanner lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Binding,
    Ready,
    Capturing,
    Decoding,
}

impl ScanState {
    /// A capture is in flight
    pub fn is_capturing(&self) -> bool {
        matches!(self, ScanState::Capturing | ScanState::Decoding)
    }
}

/// Transient message shown on the scanner screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Scanned(String),
    NoBarcode,
    Error(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Scanned(code) => write!(f, "ISBN: {}", code),
            Notice::NoBarcode => write!(f, "No barcode found"),
            Notice::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Snapshot of everything the scanner screen renders
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanView {
    pub state: ScanState,
    pub busy: bool,
    pub lens: LensSelection,
    pub lens_controls_enabled: bool,
    pub notice: Option<Notice>,
    /// Incremented with every notice, so repeated notices are distinguishable
    pub notice_seq: u64,
}

impl ScanView {
    fn refresh(&mut self) {
        self.lens_controls_enabled = !self.busy && !self.state.is_capturing();
    }
}

/// Result of one capture action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Success(DecodedCode),
    NoMatch,
    Failed(ScanError),
    Dismissed,
}

/// Holds the busy flag for the span of a capture
///
/// Dropping it (normal exit, error, cancellation or panic) clears busy and
/// puts a stranded Capturing/Decoding state back to Ready.
struct BusyGuard<'a> {
    view: &'a watch::Sender<ScanView>,
}

impl<'a> BusyGuard<'a> {
    fn engage(view: &'a watch::Sender<ScanView>) -> Self {
        view.send_modify(|v| {
            v.busy = true;
            v.state = ScanState::Capturing;
            v.refresh();
        });
        Self { view }
    }

    fn advance(&self, state: ScanState) {
        self.view.send_modify(|v| {
            v.state = state;
            v.refresh();
        });
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.view.send_modify(|v| {
            v.busy = false;
            if v.state.is_capturing() {
                v.state = ScanState::Ready;
            }
            v.refresh();
        });
    }
}

/// State machine behind the scanner screen
pub struct ScanOrchestrator {
    pipeline: CapturePipeline,
    decoder: BarcodeDecoder,
    symbologies: SymbologySet,
    lens: LensSelection,
    view: watch::Sender<ScanView>,
}

impl ScanOrchestrator {
    pub fn new(
        pipeline: CapturePipeline,
        decoder: BarcodeDecoder,
        symbologies: SymbologySet,
        lens: LensSelection,
    ) -> Self {
        let mut initial = ScanView {
            lens,
            ..ScanView::default()
        };
        initial.refresh();
        let (view, _) = watch::channel(initial);
        Self {
            pipeline,
            decoder,
            symbologies,
            lens,
            view,
        }
    }

    /// Build an orchestrator from the user configuration
    pub fn from_config(
        backend: Arc<dyn CameraBackend>,
        config: &Config,
        symbologies: SymbologySet,
    ) -> Self {
        Self::new(
            CapturePipeline::new(backend, config.capture_timeout()),
            BarcodeDecoder::with_max_dimension(config.decoder_max_dimension),
            symbologies,
            config.default_lens,
        )
    }

    /// Observe UI state changes
    pub fn subscribe(&self) -> watch::Receiver<ScanView> {
        self.view.subscribe()
    }

    /// Current UI state
    pub fn view(&self) -> ScanView {
        self.view.borrow().clone()
    }

    pub fn state(&self) -> ScanState {
        self.view.borrow().state
    }

    pub fn lens(&self) -> LensSelection {
        self.lens
    }

    pub fn is_bound(&self) -> bool {
        self.pipeline.is_bound()
    }

    /// Preview surfaces of the current binding (once per binding)
    pub fn preview_stream(&mut self) -> Option<PreviewStream> {
        self.pipeline.preview_stream()
    }

    fn set_state(&self, state: ScanState) {
        self.view.send_modify(|v| {
            v.state = state;
            v.refresh();
        });
    }

    fn notify(&self, notice: Notice) {
        debug!(notice = %notice, "Scanner notice");
        self.view.send_modify(|v| {
            v.notice = Some(notice);
            v.notice_seq += 1;
        });
    }

    /// Screen became visible: bind the camera for the current lens
    pub fn show(&mut self) -> Result<(), ScanError> {
        self.set_state(ScanState::Binding);
        self.bind()
    }

    fn bind(&mut self) -> Result<(), ScanError> {
        match self.pipeline.bind(self.lens) {
            Ok(binding) => {
                info!(binding = binding.id(), lens = %self.lens, "Scanner ready");
                self.set_state(ScanState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!(lens = %self.lens, error = %e, "Scanner could not bind a camera");
                self.notify(Notice::Error(e.to_string()));
                self.set_state(ScanState::Binding);
                Err(ScanError::Bind(e))
            }
        }
    }

    /// Bind the current lens again after a failed bind
    ///
    /// Only acts in Binding; a ready scanner keeps its binding.
    pub fn retry(&mut self) -> Result<(), ScanError> {
        let state = self.state();
        if state != ScanState::Binding {
            debug!(state = ?state, "Retry ignored, scanner not waiting for a camera");
            return if state == ScanState::Ready {
                Ok(())
            } else {
                Err(ScanError::NotReady)
            };
        }
        info!(lens = %self.lens, "Retrying camera bind");
        self.bind()
    }

    /// Toggle between back and front camera
    ///
    /// Refused while a capture is in flight. When the screen is shown the
    /// new lens is bound right away.
    pub fn switch_lens(&mut self) -> Result<LensSelection, ScanError> {
        let view = self.view();
        if view.busy || view.state.is_capturing() {
            debug!("Lens switch refused during capture");
            return Err(ScanError::LensLocked);
        }

        self.lens = self.lens.toggled();
        let lens = self.lens;
        self.view.send_modify(|v| v.lens = lens);
        info!(lens = %lens, "Switching lens");

        if view.state != ScanState::Idle {
            self.set_state(ScanState::Binding);
            self.bind()?;
        }
        Ok(lens)
    }

    /// Capture a frame and decode it
    ///
    /// A found code ends the scan: the camera is released and the state
    /// returns to Idle. Anything else leaves the scanner ready for another
    /// attempt.
    pub async fn capture(&mut self) -> ScanOutcome {
        {
            let view = self.view.borrow();
            if view.state != ScanState::Ready || view.busy {
                debug!(state = ?view.state, busy = view.busy, "Capture ignored, scanner not ready");
                return ScanOutcome::Failed(ScanError::NotReady);
            }
        }

        let result = {
            let guard = BusyGuard::engage(&self.view);
            match self.pipeline.capture().await {
                Ok(frame) => {
                    guard.advance(ScanState::Decoding);
                    self.decoder
                        .decode(frame, &self.symbologies)
                        .await
                        .map_err(ScanError::Decode)
                }
                Err(e) => Err(ScanError::Capture(e)),
            }
        };

        match result {
            Ok(Some(code)) => {
                info!(code = %code.value, symbology = %code.symbology, "Scan succeeded");
                self.notify(Notice::Scanned(code.value.clone()));
                self.pipeline.unbind_all();
                self.set_state(ScanState::Idle);
                ScanOutcome::Success(code)
            }
            Ok(None) => {
                self.notify(Notice::NoBarcode);
                ScanOutcome::NoMatch
            }
            Err(e) => {
                warn!(error = %e, "Scan failed");
                self.notify(Notice::Error(e.to_string()));
                if let ScanError::Capture(capture) = &e
                    && capture.loses_binding()
                {
                    self.pipeline.unbind_all();
                    self.set_state(ScanState::Binding);
                    // Rebind failure is reported through its own notice
                    let _ = self.bind();
                }
                ScanOutcome::Failed(e)
            }
        }
    }

    /// Screen closed: release the camera
    pub fn dismiss(&mut self) {
        self.pipeline.unbind_all();
        self.set_state(ScanState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::still_source::StillImageBackend;
    use crate::backends::camera::types::*;
    use crate::barcode::ean13;

    fn orchestrator(frames: Vec<(CameraDevice, CameraFrame)>) -> ScanOrchestrator {
        let backend = Arc::new(StillImageBackend::from_frames(frames));
        let pipeline = CapturePipeline::new(backend, None);
        ScanOrchestrator::new(
            pipeline,
            BarcodeDecoder::new(),
            SymbologySet::product_code(),
            LensSelection::Back,
        )
    }

    fn device(name: &str, location: CameraLocation) -> CameraDevice {
        CameraDevice {
            name: name.into(),
            path: name.into(),
            metadata_path: None,
            rotation: SensorRotation::None,
            location,
        }
    }

    fn label(code: &str) -> CameraFrame {
        CameraFrame::from_gray_image(ean13::render_label(code).unwrap(), SensorRotation::None)
    }

    fn blank() -> CameraFrame {
        CameraFrame::from_gray_image(
            image::GrayImage::from_pixel(320, 240, image::Luma([250])),
            SensorRotation::None,
        )
    }

    #[tokio::test]
    async fn test_success_releases_camera() {
        let mut scanner = orchestrator(vec![(
            device("main", CameraLocation::Back),
            label("9780131103627"),
        )]);
        scanner.show().unwrap();
        assert_eq!(scanner.state(), ScanState::Ready);

        let outcome = scanner.capture().await;
        assert!(matches!(outcome, ScanOutcome::Success(ref code) if code.value == "9780131103627"));
        assert_eq!(scanner.state(), ScanState::Idle);
        assert!(!scanner.is_bound());

        let view = scanner.view();
        assert!(!view.busy);
        assert_eq!(view.notice, Some(Notice::Scanned("9780131103627".into())));
    }

    #[tokio::test]
    async fn test_no_code_stays_ready() {
        let mut scanner = orchestrator(vec![(device("main", CameraLocation::Back), blank())]);
        scanner.show().unwrap();

        assert_eq!(scanner.capture().await, ScanOutcome::NoMatch);
        let view = scanner.view();
        assert_eq!(view.state, ScanState::Ready);
        assert!(!view.busy);
        assert!(view.lens_controls_enabled);
        assert_eq!(view.notice, Some(Notice::NoBarcode));
        assert_eq!(view.notice_seq, 1);
    }

    #[tokio::test]
    async fn test_capture_before_show_is_not_ready() {
        let mut scanner = orchestrator(vec![(device("main", CameraLocation::Back), blank())]);
        assert_eq!(
            scanner.capture().await,
            ScanOutcome::Failed(ScanError::NotReady)
        );
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[test]
    fn test_bind_failure_stays_in_binding() {
        let mut scanner = orchestrator(vec![(device("selfie", CameraLocation::Front), blank())]);
        assert!(matches!(scanner.show(), Err(ScanError::Bind(_))));
        assert_eq!(scanner.state(), ScanState::Binding);
        assert!(matches!(scanner.view().notice, Some(Notice::Error(_))));

        assert_eq!(scanner.switch_lens(), Ok(LensSelection::Front));
        assert_eq!(scanner.state(), ScanState::Ready);
    }

    #[test]
    fn test_retry_rebinds_same_lens() {
        let backend = Arc::new(StillImageBackend::from_frames(vec![(
            device("main", CameraLocation::Back),
            blank(),
        )]));
        let mut scanner = ScanOrchestrator::new(
            CapturePipeline::new(backend.clone(), None),
            BarcodeDecoder::new(),
            SymbologySet::product_code(),
            LensSelection::Back,
        );

        // Another holder has the camera
        let device = backend.enumerate_cameras().remove(0);
        let (preview, _surfaces) = futures::channel::mpsc::unbounded();
        let held = backend.open(&device, 99, preview).unwrap();
        assert!(matches!(scanner.show(), Err(ScanError::Bind(_))));
        assert_eq!(scanner.state(), ScanState::Binding);
        assert!(matches!(scanner.retry(), Err(ScanError::Bind(_))));
        assert_eq!(scanner.state(), ScanState::Binding);

        held.stop().unwrap();
        assert_eq!(scanner.retry(), Ok(()));
        assert_eq!(scanner.state(), ScanState::Ready);
        assert_eq!(scanner.lens(), LensSelection::Back);

        // Ready: nothing to retry
        assert_eq!(scanner.retry(), Ok(()));
        assert_eq!(backend.active_claims(), 1);
    }

    #[test]
    fn test_retry_before_show_is_not_ready() {
        let mut scanner = orchestrator(vec![(device("main", CameraLocation::Back), blank())]);
        assert_eq!(scanner.retry(), Err(ScanError::NotReady));
        assert!(!scanner.is_bound());
    }

    #[test]
    fn test_switch_lens_refused_while_capturing() {
        let mut scanner = orchestrator(vec![(device("main", CameraLocation::Back), blank())]);
        scanner.show().unwrap();

        for (busy, state) in [
            (true, ScanState::Capturing),
            (true, ScanState::Decoding),
            (true, ScanState::Ready),
        ] {
            scanner.view.send_modify(|v| {
                v.busy = busy;
                v.state = state;
                v.refresh();
            });
            assert_eq!(scanner.switch_lens(), Err(ScanError::LensLocked));
            assert_eq!(scanner.lens(), LensSelection::Back);
            assert_eq!(scanner.view().lens, LensSelection::Back);
        }
    }

    #[test]
    fn test_switch_lens_while_idle_does_not_bind() {
        let mut scanner = orchestrator(vec![(device("main", CameraLocation::Back), blank())]);
        assert_eq!(scanner.switch_lens(), Ok(LensSelection::Front));
        assert_eq!(scanner.view().lens, LensSelection::Front);
        assert!(!scanner.is_bound());
    }

    #[test]
    fn test_busy_guard_resets_stranded_state() {
        let (view, _) = watch::channel(ScanView::default());
        {
            let guard = BusyGuard::engage(&view);
            assert!(view.borrow().busy);
            assert!(!view.borrow().lens_controls_enabled);
            guard.advance(ScanState::Decoding);
        }
        let state = view.borrow().clone();
        assert!(!state.busy);
        assert_eq!(state.state, ScanState::Ready);
        assert!(state.lens_controls_enabled);
    }
}
