// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning one barcode with a camera
//! - Decoding a barcode from an image file
//! - Rendering an ISBN label image

use bookscan::backends::camera::CameraBackend;
use bookscan::backends::camera::types::{CameraFrame, LensSelection, SensorRotation};
use bookscan::barcode::{BarcodeDecoder, SymbologySet, ean13};
use bookscan::config::Config;
use bookscan::constants::{paths, timing};
use bookscan::pipelines::Frame;
use bookscan::scanner::{ScanOrchestrator, ScanOutcome};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// List all available cameras
pub fn list_cameras(backend: Arc<dyn CameraBackend>) -> Result<(), Box<dyn std::error::Error>> {
    if !backend.is_available() {
        return Err(format!("{} backend is not available", backend.backend_type()).into());
    }

    let cameras = backend.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", backend.backend_type());
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!(
            "      Location: {}, rotation: {}",
            camera.location, camera.rotation
        );
        if !camera.path.is_empty() {
            println!("      Target: {}", camera.path);
        }
        println!();
    }

    // Which device each lens would bind to
    for lens in [LensSelection::Back, LensSelection::Front] {
        match lens.select(&cameras) {
            Some(camera) => println!("  {} lens -> {}", lens, camera.name),
            None => println!("  {} lens -> (none)", lens),
        }
    }

    Ok(())
}

/// Open a camera, capture until a barcode is found and print it
pub fn scan(
    backend: Arc<dyn CameraBackend>,
    config: &Config,
    lens: Option<LensSelection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    if let Some(lens) = lens {
        config.default_lens = lens;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(scan_until_found(backend, &config))
}

async fn scan_until_found(
    backend: Arc<dyn CameraBackend>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut orchestrator = ScanOrchestrator::from_config(backend, config, SymbologySet::all());
    orchestrator.show()?;
    println!("Using {} camera", orchestrator.lens());

    // Wait for exposure to settle (camera warm-up)
    tokio::time::sleep(timing::CLI_WARMUP).await;

    for attempt in 1..=timing::CLI_SCAN_ATTEMPTS {
        println!("Capturing ({}/{})...", attempt, timing::CLI_SCAN_ATTEMPTS);
        match orchestrator.capture().await {
            ScanOutcome::Success(code) => {
                println!("{}: {}", code.symbology, code.value);
                return Ok(());
            }
            ScanOutcome::NoMatch => println!("No barcode found"),
            ScanOutcome::Failed(e) => {
                println!("Error: {}", e);
                if !orchestrator.is_bound() {
                    return Err(e.into());
                }
            }
            ScanOutcome::Dismissed => break,
        }
    }

    orchestrator.dismiss();
    Err("No barcode found".into())
}

/// Decode a barcode from an image file
pub fn decode_image(
    path: &Path,
    config: &Config,
    all: bool,
    rotation: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?
        .to_rgba8();
    let frame = Frame::new(CameraFrame::from_rgba_image(
        image,
        SensorRotation::from_degrees_int(rotation),
    ));

    let symbologies = if all {
        SymbologySet::all()
    } else {
        SymbologySet::product_code()
    };
    let decoder = BarcodeDecoder::with_max_dimension(config.decoder_max_dimension);

    match decoder.decode_sync(frame, &symbologies)? {
        Some(code) => {
            println!("{}: {}", code.symbology, code.value);
            if ean13::is_valid(&code.value) && code.value.starts_with("97") {
                println!("Looks like an ISBN-13");
            }
            Ok(())
        }
        None => Err("No barcode found".into()),
    }
}

/// Render an EAN-13 label for an ISBN and save it as an image
pub fn write_label(isbn: &str, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let digits: String = isbn.chars().filter(|c| c.is_ascii_digit()).collect();

    // 12 digits: complete with the check digit
    let code = if digits.len() == 12 {
        let values: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();
        format!("{}{}", digits, ean13::check_digit(&values))
    } else {
        digits
    };

    let label = ean13::render_label(&code)
        .ok_or_else(|| format!("'{}' is not a valid ISBN-13/EAN-13 code", isbn))?;

    let output_path = match output {
        Some(path) if path.is_dir() => path.join(default_label_name(&code)),
        Some(path) => path,
        None => PathBuf::from(default_label_name(&code)),
    };

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    label
        .save(&output_path)
        .map_err(|e| format!("Failed to save {}: {}", output_path.display(), e))?;
    println!("Label for {} saved: {}", code, output_path.display());
    Ok(())
}

fn default_label_name(code: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}_{}.png", paths::LABEL_FILE_PREFIX, code, timestamp)
}
