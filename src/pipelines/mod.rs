// SPDX-License-Identifier: MPL-2.0

//! Capture pipelines
//!
//! ```text
//! ┌──────────────┐  bind(lens)  ┌──────────────────┐  capture()  ┌───────┐
//! │ CameraBackend│ ───────────▶ │ CapturePipeline  │ ──────────▶ │ Frame │
//! │  (PipeWire)  │              │  - one binding   │             └───────┘
//! │              │              │  - preview stream│
//! └──────────────┘              └──────────────────┘
//! ```
//!
//! The preview keeps running while a still is requested; a still is simply
//! the next frame the stream produces after the request.
//!
//! - [`capture`]: Camera binding lifecycle and one-shot still capture

pub mod capture;

pub use capture::{Binding, CapturePipeline, Frame, PreviewStream};
