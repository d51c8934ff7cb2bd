// SPDX-License-Identifier: MPL-2.0

//! bookscan - register books by ISBN and identify them by scanning
//!
//! The library holds everything behind the `bookscan` binary: camera access,
//! barcode decoding, the scan state machine and the screen models.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction (PipeWire, still images)
//! - [`pipelines`]: Capture pipeline (camera binding, one-shot stills)
//! - [`barcode`]: EAN-13 and QR decoding, ISBN label rendering
//! - [`scanner`]: Scan orchestration and the scanner screen task
//! - [`navigation`]: Screen stack with per-screen scan result slots
//! - [`registry`]: In-memory book registry
//! - [`app`]: Screen models (home, registration, identify)
//! - [`terminal`]: Interactive terminal interface
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! // Run the terminal interface with image files as cameras:
//! // bookscan --source back.png front.png
//! ```

pub mod app;
pub mod backends;
pub mod barcode;
pub mod config;
pub mod constants;
pub mod errors;
pub mod navigation;
pub mod pipelines;
pub mod registry;
pub mod scanner;
pub mod terminal;

// Re-export commonly used types
pub use app::App;
pub use barcode::{BarcodeDecoder, DecodedCode, Symbology, SymbologySet};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use registry::{BookRecord, BookRegistry};
pub use scanner::{ScanOrchestrator, ScanOutcome, ScanState};
