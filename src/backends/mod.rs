// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! - [`camera`]: Camera backends with device enumeration, preview and stills
//!   (PipeWire for real hardware, image files for demos and tests)

pub mod camera;
