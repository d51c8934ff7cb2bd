// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraBackendType, LensSelection};
use crate::constants::{decoder, paths, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// User configuration, stored as JSON under the XDG config directory
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (PipeWire or still images)
    pub backend: CameraBackendType,
    /// Lens the scanner opens with
    pub default_lens: LensSelection,
    /// Upper bound for one still capture; `None` waits indefinitely
    pub capture_timeout_ms: Option<u64>,
    /// Longest side of the image handed to the barcode recognizers
    pub decoder_max_dimension: u32,
    /// Mirror camera preview horizontally (selfie mode)
    pub mirror_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            default_lens: LensSelection::Back,
            capture_timeout_ms: Some(timing::DEFAULT_CAPTURE_TIMEOUT_MS),
            decoder_max_dimension: decoder::DEFAULT_MAX_DIMENSION,
            mirror_preview: false, // Barcodes read backwards when mirrored
        }
    }
}

impl Config {
    /// Default config file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(paths::APP_DIR).join(paths::CONFIG_FILE))
    }

    /// Load the user configuration, falling back to defaults
    ///
    /// A missing file is normal on first start; an unreadable or invalid file
    /// is reported and ignored.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validated()
    }

    /// Write configuration to an explicit file, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Capture timeout as a `Duration`
    pub fn capture_timeout(&self) -> Option<Duration> {
        self.capture_timeout_ms.map(Duration::from_millis)
    }

    fn validated(self) -> AppResult<Self> {
        if self.decoder_max_dimension < decoder::MIN_MAX_DIMENSION {
            return Err(AppError::Config(format!(
                "decoder_max_dimension must be at least {}, got {}",
                decoder::MIN_MAX_DIMENSION,
                self.decoder_max_dimension
            )));
        }
        if self.capture_timeout_ms == Some(0) {
            return Err(AppError::Config(
                "capture_timeout_ms must be positive (use null to disable)".to_string(),
            ));
        }
        Ok(self)
    }
}
