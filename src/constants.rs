// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// GStreamer pipeline constants
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Default upper bound for a single still capture
    pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 5_000;

    /// Terminal event poll interval (~60 fps)
    pub const TUI_POLL_INTERVAL: Duration = Duration::from_millis(16);

    /// How long a scanner notice stays on screen
    pub const NOTICE_DURATION: Duration = Duration::from_secs(3);

    /// Camera warm-up before the first CLI capture
    pub const CLI_WARMUP: Duration = Duration::from_millis(500);

    /// Captures attempted by the CLI `scan` command
    pub const CLI_SCAN_ATTEMPTS: usize = 3;
}

/// Barcode decoder tuning
pub mod decoder {
    /// Longest side of the luma image handed to the recognizers
    pub const DEFAULT_MAX_DIMENSION: u32 = 1280;

    /// Smallest accepted `decoder_max_dimension`
    pub const MIN_MAX_DIMENSION: u32 = 160;

    /// Number of horizontal scan lines tried per frame
    pub const EAN13_SCAN_LINES: u32 = 24;

    /// Maximum average per-module deviation for a digit match
    pub const EAN13_MAX_DIGIT_ERROR: f32 = 0.35;

    /// Rendered label: pixels per module
    pub const LABEL_MODULE_WIDTH: u32 = 3;

    /// Rendered label: quiet zone on each side, in modules
    pub const LABEL_QUIET_MODULES: u32 = 11;

    /// Rendered label: bar height in pixels
    pub const LABEL_BAR_HEIGHT: u32 = 120;
}

/// File system locations
pub mod paths {
    /// Directory name under the XDG config dir
    pub const APP_DIR: &str = "bookscan";

    /// Configuration file name
    pub const CONFIG_FILE: &str = "config.json";

    /// File name prefix of labels written by the `label` command
    pub const LABEL_FILE_PREFIX: &str = "label";
}

/// Supported image file formats for the still-image camera source
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
