// SPDX-License-Identifier: GPL-3.0-only

//! Barcode decoding
//!
//! [`BarcodeDecoder`] takes a captured [`Frame`], turns it into an upright
//! luma image and runs the recognizers enabled in the [`SymbologySet`].
//! The EAN-13 pass runs first; the first code found wins.

pub mod ean13;
pub mod luma;
pub mod qr;

use crate::constants::decoder;
use crate::errors::DecodeError;
use crate::pipelines::Frame;
use std::fmt;
use tracing::{debug, warn};

/// Supported barcode symbologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    /// 13-digit product code (ISBN-13 on books)
    Ean13,
    QrCode,
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbology::Ean13 => write!(f, "EAN-13"),
            Symbology::QrCode => write!(f, "QR Code"),
        }
    }
}

/// Non-empty set of symbologies to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbologySet {
    ean13: bool,
    qr_code: bool,
}

impl SymbologySet {
    /// Product codes only (book registration and lookup)
    pub fn product_code() -> Self {
        Self {
            ean13: true,
            qr_code: false,
        }
    }

    /// Every supported symbology
    pub fn all() -> Self {
        Self {
            ean13: true,
            qr_code: true,
        }
    }

    /// Build a set from a list; `None` if the list is empty
    pub fn from_symbologies(symbologies: &[Symbology]) -> Option<Self> {
        let set = Self {
            ean13: symbologies.contains(&Symbology::Ean13),
            qr_code: symbologies.contains(&Symbology::QrCode),
        };
        (set.ean13 || set.qr_code).then_some(set)
    }

    pub fn contains(&self, symbology: Symbology) -> bool {
        match symbology {
            Symbology::Ean13 => self.ean13,
            Symbology::QrCode => self.qr_code,
        }
    }
}

/// A decoded barcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    pub value: String,
    pub symbology: Symbology,
}

impl fmt::Display for DecodedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Frame-in, code-out barcode decoder
#[derive(Debug, Clone, Copy)]
pub struct BarcodeDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for BarcodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BarcodeDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: decoder::DEFAULT_MAX_DIMENSION,
        }
    }

    /// Create a decoder with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Decode a frame without blocking the async runtime
    ///
    /// Returns `Ok(None)` when the frame holds no code of the requested
    /// symbologies.
    pub async fn decode(
        &self,
        frame: Frame,
        symbologies: &SymbologySet,
    ) -> Result<Option<DecodedCode>, DecodeError> {
        let decoder = *self;
        let symbologies = *symbologies;

        // Run detection in a blocking task to avoid blocking the async runtime
        tokio::task::spawn_blocking(move || decoder.decode_sync(frame, &symbologies))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Barcode decode task failed");
                Err(DecodeError::TaskFailed(e.to_string()))
            })
    }

    /// Decode a frame on the calling thread
    pub fn decode_sync(
        &self,
        frame: Frame,
        symbologies: &SymbologySet,
    ) -> Result<Option<DecodedCode>, DecodeError> {
        let start = std::time::Instant::now();
        let luma = luma::upright_luma(frame.camera_frame(), self.max_dimension)?;
        drop(frame);

        let found = if symbologies.contains(Symbology::Ean13)
            && let Some(value) = ean13::decode(&luma)
        {
            Some(DecodedCode {
                value,
                symbology: Symbology::Ean13,
            })
        } else if symbologies.contains(Symbology::QrCode) {
            qr::decode(&luma).map(|value| DecodedCode {
                value,
                symbology: Symbology::QrCode,
            })
        } else {
            None
        };

        match &found {
            Some(code) => debug!(
                symbology = %code.symbology,
                value = %code.value,
                total_ms = start.elapsed().as_millis() as u64,
                "Barcode decoded"
            ),
            None => debug!(
                total_ms = start.elapsed().as_millis() as u64,
                "No barcode in frame"
            ),
        }
        Ok(found)
    }
}
